//! Liquidity validation
//!
//! Decides whether a pool can absorb a requested size without excessive
//! price impact. Rejections carry a reason specific enough to tell
//! "empty pool", "depth below minimum", and "impact too high" apart;
//! "no pool at all" never reaches this module (the resolver reports it).

use crate::config::ExecutorConfig;
use crate::errors::CoreResult;
use crate::quote::QuoteEngine;
use crate::types::{PoolHandle, PoolState};
use ethers::types::U256;
use tracing::debug;

/// Outcome of a liquidity check. `reason` is set exactly when
/// `has_liquidity` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityCheck {
    pub has_liquidity: bool,
    pub reason: Option<String>,
}

impl LiquidityCheck {
    fn ok() -> Self {
        Self {
            has_liquidity: true,
            reason: None,
        }
    }

    fn rejected(reason: String) -> Self {
        Self {
            has_liquidity: false,
            reason: Some(reason),
        }
    }
}

pub struct LiquidityValidator {
    max_price_impact_bps: u32,
    min_pool_liquidity: U256,
}

impl LiquidityValidator {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            max_price_impact_bps: config.max_price_impact_bps,
            min_pool_liquidity: config.min_pool_liquidity,
        }
    }

    /// Check a fresh snapshot against the configured depth floor and
    /// impact ceiling. Read-only; errors only on fatal arithmetic.
    pub fn check(
        &self,
        handle: &PoolHandle,
        state: &PoolState,
        amount_in: U256,
    ) -> CoreResult<LiquidityCheck> {
        if state.is_empty() {
            return Ok(LiquidityCheck::rejected(
                "pool exists but holds no liquidity".to_string(),
            ));
        }

        let depth = state.depth(handle.zero_for_one());
        if depth < self.min_pool_liquidity {
            return Ok(LiquidityCheck::rejected(format!(
                "pool depth {} below minimum {}",
                depth, self.min_pool_liquidity
            )));
        }

        let quote = QuoteEngine::quote(handle, state, amount_in)?;
        if quote.amount_out_expected.is_zero() {
            return Ok(LiquidityCheck::rejected(format!(
                "size {} cannot be filled by pool {:?}",
                amount_in, handle.address
            )));
        }
        if quote.price_impact_bps > self.max_price_impact_bps {
            return Ok(LiquidityCheck::rejected(format!(
                "projected price impact {} bps exceeds ceiling {} bps",
                quote.price_impact_bps, self.max_price_impact_bps
            )));
        }

        debug!(
            pool = %handle,
            %amount_in,
            impact_bps = quote.price_impact_bps,
            "liquidity check passed"
        );
        Ok(LiquidityCheck::ok())
    }
}
