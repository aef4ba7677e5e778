//! Quote engine
//!
//! Read-only swap simulation: expected output and projected price impact
//! for a given pool snapshot. Pure function of its inputs; the same
//! snapshot and size always produce the same quote.

use crate::errors::CoreResult;
use crate::pool::math;
use crate::types::{PoolHandle, PoolState, Quote};
use ethers::types::U256;

pub struct QuoteEngine;

impl QuoteEngine {
    /// Quote `amount_in` against one pool snapshot.
    ///
    /// Uses the pool kind's on-chain formula with integer arithmetic
    /// throughout, so slippage floors derived from this quote agree
    /// exactly with the venue's execution.
    pub fn quote(handle: &PoolHandle, state: &PoolState, amount_in: U256) -> CoreResult<Quote> {
        let fee_ppm = handle.fee_tier.fee_ppm();
        let zero_for_one = handle.zero_for_one();

        let (amount_out, spot_out) = match state {
            PoolState::V2 { reserve0, reserve1 } => {
                let (reserve_in, reserve_out) = if zero_for_one {
                    (*reserve0, *reserve1)
                } else {
                    (*reserve1, *reserve0)
                };
                let out = math::v2_amount_out(amount_in, reserve_in, reserve_out, fee_ppm)?;
                let spot = math::v2_spot_out(amount_in, reserve_in, reserve_out, fee_ppm)?;
                (out, spot)
            }
            PoolState::V3 {
                sqrt_price_x96,
                liquidity,
                ..
            } => {
                let (out, _sqrt_after) = math::v3_swap_within_tick(
                    *sqrt_price_x96,
                    *liquidity,
                    amount_in,
                    fee_ppm,
                    zero_for_one,
                )?;
                let spot = math::v3_spot_out(*sqrt_price_x96, amount_in, fee_ppm, zero_for_one)?;
                (out, spot)
            }
        };

        Ok(Quote {
            handle: *handle,
            amount_in,
            amount_out_expected: amount_out,
            price_impact_bps: math::price_impact_bps(spot_out, amount_out)?,
        })
    }
}
