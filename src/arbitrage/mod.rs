//! Arbitrage module
//!
//! Opportunity evaluation and the atomic execution state machine.

pub mod evaluator;
pub mod executor;

pub use evaluator::{OpportunityEvaluation, OpportunityEvaluator};
pub use executor::{ArbitrageExecutor, ExecutionState};
