//! Arbitrage executor
//!
//! The top-level state machine for one atomic borrow-swap-repay unit:
//!
//! ```text
//! Idle -> LoanReceived -> Swapping -> Settling -> Committed
//!                  \____________\___________\--> RolledBack
//! ```
//!
//! Pre-flight failures (bad parameters, facility short on liquidity,
//! gas price above ceiling, reentrancy) reject before any loan exists.
//! Once principal is received the unit runs to Committed or RolledBack;
//! there is no external abort and no partial effect. Rollback relies on
//! the lending facility's atomicity: a unit that ends without accepted
//! repayment never happened, so the core's job is to stop at the first
//! failure and surface the typed cause.

use crate::allowance::AllowanceManager;
use crate::config::ExecutorConfig;
use crate::errors::{CoreError, CoreResult};
use crate::pool::{LiquidityValidator, PoolInfoResolver};
use crate::quote::QuoteEngine;
use crate::slippage::SlippageGuard;
use crate::types::{ExecutionOutcome, ExecutionParameters, LoanObligation, TokenAmount};
use crate::venue::{LendingFacility, PoolRegistry, RepayReceipt, SwapVenue, TokenLedger};
use ethers::types::{Address, U256};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Phases of one execution unit, logged at every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    LoanReceived,
    Swapping,
    Settling,
    Committed,
    RolledBack,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ExecutionState::Idle => "Idle",
            ExecutionState::LoanReceived => "LoanReceived",
            ExecutionState::Swapping => "Swapping",
            ExecutionState::Settling => "Settling",
            ExecutionState::Committed => "Committed",
            ExecutionState::RolledBack => "RolledBack",
        };
        write!(f, "{}", name)
    }
}

/// Which side of the outcome a failure lands on: before the loan exists
/// it is a rejection, after it is a rollback.
enum Failure {
    Rejected(CoreError),
    Reverted(CoreError),
}

/// Releases the non-reentrancy flag when the unit ends, on every path
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ArbitrageExecutor<R, V, L, T>
where
    R: PoolRegistry,
    V: SwapVenue,
    L: LendingFacility,
    T: TokenLedger,
{
    config: ExecutorConfig,
    resolver: PoolInfoResolver<R>,
    validator: LiquidityValidator,
    allowances: AllowanceManager<T>,
    venue: Arc<V>,
    lender: Arc<L>,
    ledger: Arc<T>,
    /// One loan obligation at a time; see `FlightGuard`
    in_flight: AtomicBool,
}

impl<R, V, L, T> ArbitrageExecutor<R, V, L, T>
where
    R: PoolRegistry,
    V: SwapVenue,
    L: LendingFacility,
    T: TokenLedger,
{
    pub fn new(
        config: ExecutorConfig,
        registry: Arc<R>,
        venue: Arc<V>,
        lender: Arc<L>,
        ledger: Arc<T>,
    ) -> Self {
        let validator = LiquidityValidator::new(&config);
        Self {
            resolver: PoolInfoResolver::new(registry),
            validator,
            allowances: AllowanceManager::new(ledger.clone()),
            venue,
            lender,
            ledger,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Current venue allowances for both legs of a pair, freshly read
    pub async fn check_allowances(
        &self,
        owner: Address,
        token_in: Address,
        token_out: Address,
    ) -> CoreResult<(TokenAmount, TokenAmount)> {
        let spender = self.config.swap_venue;
        let leg_in = self
            .allowances
            .current_allowance(owner, token_in, spender)
            .await?;
        let leg_out = self
            .allowances
            .current_allowance(owner, token_out, spender)
            .await?;
        Ok((leg_in, leg_out))
    }

    /// Run one execution attempt to a terminal outcome.
    ///
    /// Never returns Err: every failure is folded into the outcome so
    /// the caller always learns the precise reason.
    pub async fn execute(&self, params: ExecutionParameters) -> ExecutionOutcome {
        if let Err(reason) = params.validate() {
            warn!(%reason, "execution rejected: malformed parameters");
            return ExecutionOutcome::Rejected { reason };
        }

        if params.gas_price_wei > self.config.gas_price_ceiling_wei {
            let reason = CoreError::GasPriceAboveCeiling {
                gas_price: params.gas_price_wei,
                ceiling: self.config.gas_price_ceiling_wei,
            };
            warn!(%reason, "execution rejected");
            return ExecutionOutcome::Rejected { reason };
        }

        let _guard = match FlightGuard::acquire(&self.in_flight) {
            Some(guard) => guard,
            None => {
                warn!("execution rejected: unit already in flight");
                return ExecutionOutcome::Rejected {
                    reason: CoreError::ExecutionInFlight,
                };
            }
        };

        info!(
            token_in = ?params.token_in,
            token_out = ?params.token_out,
            amount_in = %params.amount_in,
            hops = params.route.len(),
            "starting execution unit"
        );

        match self.run(&params).await {
            Ok(profit) => {
                self.enter(ExecutionState::Committed);
                info!(%profit, "execution committed");
                ExecutionOutcome::Success { profit }
            }
            Err(Failure::Rejected(reason)) => {
                warn!(%reason, "execution rejected pre-flight");
                ExecutionOutcome::Rejected { reason }
            }
            Err(Failure::Reverted(cause)) => {
                self.enter(ExecutionState::RolledBack);
                if cause.is_fatal() {
                    error!(%cause, "unit rolled back on fatal error");
                } else {
                    warn!(%cause, "unit rolled back");
                }
                ExecutionOutcome::Reverted { cause }
            }
        }
    }

    /// The unit body. Failures before `borrow` are rejections; from the
    /// moment the obligation exists they are rollbacks.
    async fn run(&self, params: &ExecutionParameters) -> Result<TokenAmount, Failure> {
        self.enter(ExecutionState::Idle);

        // Never attempt a partial loan
        let available = self
            .lender
            .available_liquidity(params.token_in)
            .await
            .map_err(Failure::Rejected)?;
        if available < params.amount_in {
            return Err(Failure::Rejected(CoreError::LoanFacilityUnavailable(
                format!(
                    "requested {} exceeds facility liquidity {}",
                    params.amount_in, available
                ),
            )));
        }

        let obligation = self
            .lender
            .borrow(params.token_in, params.amount_in)
            .await
            .map_err(Failure::Rejected)?;
        self.enter(ExecutionState::LoanReceived);
        info!(
            principal = %obligation.principal,
            fee = %obligation.fee,
            "principal received"
        );

        // Independent reads, issued concurrently; either failure abandons
        // the obligation before anything is drawn down
        let (allowances, liquidity) = tokio::join!(
            self.recheck_route_allowances(params),
            self.recheck_route_liquidity(params),
        );
        allowances.map_err(Failure::Reverted)?;
        liquidity.map_err(Failure::Reverted)?;

        self.enter(ExecutionState::Swapping);
        let proceeds = self.swap_route(params).await.map_err(Failure::Reverted)?;

        // Caller's overall floor, on top of per-hop enforcement
        if proceeds < params.min_amount_out {
            return Err(Failure::Reverted(CoreError::SlippageExceeded {
                actual: proceeds,
                floor: params.min_amount_out,
            }));
        }

        let owed = obligation.total_owed().map_err(Failure::Reverted)?;
        if proceeds < owed {
            return Err(Failure::Reverted(CoreError::Unprofitable {
                proceeds,
                owed,
            }));
        }

        self.enter(ExecutionState::Settling);
        self.settle(params, &obligation, owed)
            .await
            .map_err(Failure::Reverted)?;

        let residual = proceeds
            .checked_sub(owed)
            .ok_or(Failure::Reverted(CoreError::ArithmeticOverflow("residual")))?;
        let profit = TokenAmount::new(params.token_out, residual);
        if !profit.amount.is_zero() {
            self.ledger
                .transfer(params.token_out, params.owner, profit.amount)
                .await
                .map_err(Failure::Reverted)?;
        }

        Ok(profit)
    }

    /// Allowances can change between planning and execution; re-read all
    /// of them inside the unit. The first hop's requirement is exact;
    /// later hops' exact need is only known once the previous hop fills,
    /// but a zero approval there is certain failure.
    async fn recheck_route_allowances(&self, params: &ExecutionParameters) -> CoreResult<()> {
        let spender = self.config.swap_venue;
        self.allowances
            .ensure_allowance(params.owner, params.token_in, spender, params.amount_in)
            .await?;
        for hop in &params.route[1..] {
            self.allowances
                .ensure_allowance(params.owner, hop.token_in, spender, U256::one())
                .await?;
        }
        Ok(())
    }

    /// Walk the route against fresh snapshots, chaining each hop's
    /// expected output into the next hop's size.
    async fn recheck_route_liquidity(&self, params: &ExecutionParameters) -> CoreResult<()> {
        let mut amount = params.amount_in;
        for hop in &params.route {
            let state = self.resolver.fresh_state(hop).await?;
            let check = self.validator.check(hop, &state, amount)?;
            if !check.has_liquidity {
                return Err(CoreError::InsufficientLiquidity(
                    check
                        .reason
                        .unwrap_or_else(|| "liquidity check failed".to_string()),
                ));
            }
            amount = QuoteEngine::quote(hop, &state, amount)?.amount_out_expected;
        }
        Ok(())
    }

    /// Execute the hops strictly in order: each hop's floor comes from a
    /// fresh quote at its actual input size, and its actual fill feeds
    /// the next hop.
    async fn swap_route(&self, params: &ExecutionParameters) -> CoreResult<U256> {
        let mut amount = params.amount_in;
        for (index, hop) in params.route.iter().enumerate() {
            let state = self.resolver.fresh_state(hop).await?;
            let quote = QuoteEngine::quote(hop, &state, amount)?;
            let floor =
                SlippageGuard::minimum_acceptable(&quote, params.slippage_tolerance_bps)?;
            debug!(
                hop = index,
                pool = %hop,
                amount_in = %amount,
                expected_out = %quote.amount_out_expected,
                %floor,
                "executing hop"
            );

            let actual = self.venue.swap_exact_in(hop, amount, floor).await?;
            SlippageGuard::enforce(actual, floor)?;
            info!(hop = index, amount_in = %amount, amount_out = %actual, "hop filled");
            amount = actual;
        }
        Ok(amount)
    }

    /// Repay principal plus fee; only the facility's own acceptance
    /// counts as settled.
    async fn settle(
        &self,
        params: &ExecutionParameters,
        obligation: &LoanObligation,
        owed: U256,
    ) -> CoreResult<()> {
        match self.lender.repay(params.token_in, owed).await? {
            RepayReceipt::Accepted => {
                info!(
                    principal = %obligation.principal.amount,
                    fee = %obligation.fee.amount,
                    "loan repaid"
                );
                Ok(())
            }
            RepayReceipt::Rejected => Err(CoreError::RepayRejected(
                "facility declined repayment".to_string(),
            )),
        }
    }

    fn enter(&self, state: ExecutionState) {
        debug!(%state, "state transition");
    }
}
