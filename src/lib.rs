//! Flash-Loan Arbitrage Execution Core
//!
//! Quote and liquidity evaluation, slippage-bounded swap planning,
//! allowance checks, and the atomic borrow-swap-repay-profit sequence.
//! Chain access (registry, router, lender, ERC20s) sits behind the
//! traits in [`venue`]; this crate owns the decision and settlement
//! logic only.

pub mod allowance;
pub mod arbitrage;
pub mod config;
pub mod errors;
pub mod pool;
pub mod quote;
pub mod slippage;
pub mod types;
pub mod venue;

// Re-export commonly used types
pub use allowance::AllowanceManager;
pub use arbitrage::{ArbitrageExecutor, ExecutionState, OpportunityEvaluation, OpportunityEvaluator};
pub use config::{load_config, ExecutorConfig};
pub use errors::{CoreError, CoreResult};
pub use pool::{LiquidityCheck, LiquidityValidator, PoolInfoResolver};
pub use quote::QuoteEngine;
pub use slippage::SlippageGuard;
pub use types::{
    ExecutionOutcome, ExecutionParameters, FeeTier, LoanObligation, PoolHandle, PoolState, Quote,
    TokenAmount,
};
pub use venue::{LendingFacility, PoolRegistry, RepayReceipt, SwapVenue, TokenLedger};
