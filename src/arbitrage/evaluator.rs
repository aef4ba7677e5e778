//! Opportunity evaluation
//!
//! The read-only half of the caller surface: given a pair and size,
//! probe the venue's fee tiers, gate on liquidity, and produce the quote
//! and slippage floor an execution would run against. Evaluation mutates
//! nothing, so repeated calls against unchanged pool state answer
//! identically.

use crate::config::ExecutorConfig;
use crate::errors::{CoreError, CoreResult};
use crate::pool::{LiquidityValidator, PoolInfoResolver};
use crate::quote::QuoteEngine;
use crate::slippage::SlippageGuard;
use crate::types::Quote;
use crate::venue::PoolRegistry;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info};

/// Answer to "is this trade worth attempting right now?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpportunityEvaluation {
    pub feasible: bool,
    pub quote: Option<Quote>,
    /// Slippage floor the executor would enforce, from the configured tolerance
    pub min_acceptable: Option<U256>,
    /// Why the trade is infeasible; set exactly when `feasible` is false
    pub reason: Option<CoreError>,
}

impl OpportunityEvaluation {
    fn feasible(quote: Quote, min_acceptable: U256) -> Self {
        Self {
            feasible: true,
            quote: Some(quote),
            min_acceptable: Some(min_acceptable),
            reason: None,
        }
    }

    fn infeasible(reason: CoreError) -> Self {
        Self {
            feasible: false,
            quote: None,
            min_acceptable: None,
            reason: Some(reason),
        }
    }
}

pub struct OpportunityEvaluator<R: PoolRegistry> {
    config: ExecutorConfig,
    resolver: PoolInfoResolver<R>,
    validator: LiquidityValidator,
}

impl<R: PoolRegistry> OpportunityEvaluator<R> {
    pub fn new(config: ExecutorConfig, registry: Arc<R>) -> Self {
        let validator = LiquidityValidator::new(&config);
        Self {
            resolver: PoolInfoResolver::new(registry),
            validator,
            config,
        }
    }

    /// Evaluate a single-pair trade across the configured fee tiers,
    /// first feasible tier wins.
    ///
    /// Read-only: pool state is fetched fresh and discarded. The reason
    /// distinguishes "no pool at any tier" from "pools exist but cannot
    /// take the size".
    pub async fn evaluate_opportunity(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> CoreResult<OpportunityEvaluation> {
        if amount_in.is_zero() {
            return Ok(OpportunityEvaluation::infeasible(CoreError::MalformedRoute(
                "amount_in must be positive".to_string(),
            )));
        }

        let mut rejection: Option<CoreError> = None;

        for tier in &self.config.fee_tiers {
            let handle = match self.resolver.resolve(token_in, token_out, *tier).await? {
                Some(handle) => handle,
                None => continue,
            };

            let state = self.resolver.fresh_state(&handle).await?;
            let check = self.validator.check(&handle, &state, amount_in)?;
            if !check.has_liquidity {
                let reason = check
                    .reason
                    .unwrap_or_else(|| "insufficient liquidity".to_string());
                debug!(pool = %handle, %reason, "tier rejected");
                rejection = Some(CoreError::InsufficientLiquidity(reason));
                continue;
            }

            let quote = QuoteEngine::quote(&handle, &state, amount_in)?;
            let floor =
                SlippageGuard::minimum_acceptable(&quote, self.config.slippage_tolerance_bps)?;

            info!(
                pool = %handle,
                %amount_in,
                expected_out = %quote.amount_out_expected,
                impact_bps = quote.price_impact_bps,
                %floor,
                "opportunity feasible"
            );
            return Ok(OpportunityEvaluation::feasible(quote, floor));
        }

        // Pools that exist but rejected the size are more informative
        // than a blanket NotFound
        Ok(OpportunityEvaluation::infeasible(
            rejection.unwrap_or(CoreError::NotFound),
        ))
    }
}
