//! Slippage guard
//!
//! Derives the minimum acceptable output from a quote and a tolerance in
//! basis points, and enforces it against actual fills. The floor uses
//! floor division on purpose: rounding up would tighten the floor beyond
//! the configured tolerance and fail otherwise-safe trades.

use crate::errors::{CoreError, CoreResult};
use crate::pool::math;
use crate::types::Quote;
use ethers::types::U256;

pub struct SlippageGuard;

impl SlippageGuard {
    /// `expected * (10000 - tolerance_bps) / 10000`, floored
    pub fn minimum_acceptable(quote: &Quote, tolerance_bps: u32) -> CoreResult<U256> {
        if tolerance_bps >= math::BPS {
            return Err(CoreError::MalformedRoute(format!(
                "slippage tolerance {} bps out of range [0, 10000)",
                tolerance_bps
            )));
        }
        math::mul_div(
            quote.amount_out_expected,
            U256::from(math::BPS - tolerance_bps),
            U256::from(math::BPS),
        )
    }

    /// Reject any fill below the floor
    pub fn enforce(actual: U256, minimum_acceptable: U256) -> CoreResult<()> {
        if actual < minimum_acceptable {
            return Err(CoreError::SlippageExceeded {
                actual,
                floor: minimum_acceptable,
            });
        }
        Ok(())
    }
}
