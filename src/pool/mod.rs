//! Pool module
//!
//! Pool resolution, liquidity gating, and the exact swap math shared by
//! quoting and validation. Supports both V2 (constant product) and V3
//! (concentrated liquidity) pools.

pub mod liquidity;
pub mod math;
pub mod resolver;

pub use liquidity::{LiquidityCheck, LiquidityValidator};
pub use resolver::PoolInfoResolver;
