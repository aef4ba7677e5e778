//! Pool swap math
//!
//! Exact integer arithmetic for both pool kinds, matching the venue's
//! on-chain math bit for bit: constant product (x * y = k) for V2 pools
//! and the Q64.96 sqrt-price swap step for V3 concentrated liquidity.
//! Floating point never appears here; slippage floors derived from these
//! quotes must agree exactly with what the venue executes.
//!
//! All overflow is surfaced as `CoreError::ArithmeticOverflow`, never
//! wrapped or truncated.

use crate::errors::{CoreError, CoreResult};
use ethers::types::{U256, U512};

/// Fee denominator: fees are quoted in parts-per-million
pub const PPM: u32 = 1_000_000;

/// Basis-point denominator
pub const BPS: u32 = 10_000;

fn q96() -> U256 {
    U256::one() << 96
}

fn widen(x: U256) -> U512 {
    let mut buf = [0u8; 32];
    x.to_big_endian(&mut buf);
    let mut wide = [0u8; 64];
    wide[32..].copy_from_slice(&buf);
    U512::from_big_endian(&wide)
}

fn narrow(x: U512, ctx: &'static str) -> CoreResult<U256> {
    if (x >> 256) != U512::zero() {
        return Err(CoreError::ArithmeticOverflow(ctx));
    }
    let mut buf = [0u8; 64];
    x.to_big_endian(&mut buf);
    Ok(U256::from_big_endian(&buf[32..]))
}

/// floor(a * b / denominator) with a 512-bit intermediate
pub fn mul_div(a: U256, b: U256, denominator: U256) -> CoreResult<U256> {
    if denominator.is_zero() {
        return Err(CoreError::ArithmeticOverflow("mul_div denominator"));
    }
    narrow(a.full_mul(b) / widen(denominator), "mul_div")
}

/// Input net of the pool fee, floor division
pub fn apply_fee(amount_in: U256, fee_ppm: u32) -> CoreResult<U256> {
    mul_div(
        amount_in,
        U256::from(PPM - fee_ppm),
        U256::from(PPM),
    )
}

/// Constant-product output for a V2 pool.
///
/// amount_out = (in * (1e6 - fee) * reserve_out)
///            / (reserve_in * 1e6 + in * (1e6 - fee))
pub fn v2_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_ppm: u32,
) -> CoreResult<U256> {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return Ok(U256::zero());
    }

    let amount_in_with_fee = amount_in
        .checked_mul(U256::from(PPM - fee_ppm))
        .ok_or(CoreError::ArithmeticOverflow("v2 amount_in_with_fee"))?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(CoreError::ArithmeticOverflow("v2 numerator"))?;
    let denominator = reserve_in
        .checked_mul(U256::from(PPM))
        .and_then(|d| d.checked_add(amount_in_with_fee))
        .ok_or(CoreError::ArithmeticOverflow("v2 denominator"))?;

    Ok(numerator / denominator)
}

/// Fee-adjusted output at the undisturbed spot price of a V2 pool.
/// Reference point for price impact, not an executable amount.
pub fn v2_spot_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_ppm: u32,
) -> CoreResult<U256> {
    if reserve_in.is_zero() {
        return Ok(U256::zero());
    }
    let net_in = apply_fee(amount_in, fee_ppm)?;
    mul_div(net_in, reserve_out, reserve_in)
}

/// One V3 swap step confined to the current tick's liquidity.
///
/// Returns `(amount_out, sqrt_price_after_x96)`. Rounding matches the
/// venue: the post-swap sqrt price rounds against the trader (up for
/// zeroForOne, the quotient floor for oneForZero) and output deltas are
/// floored. The liquidity validator screens out sizes large enough to
/// cross a tick boundary, so confinement to the current tick holds.
pub fn v3_swap_within_tick(
    sqrt_price_x96: U256,
    liquidity: u128,
    amount_in: U256,
    fee_ppm: u32,
    zero_for_one: bool,
) -> CoreResult<(U256, U256)> {
    if liquidity == 0 || sqrt_price_x96.is_zero() || amount_in.is_zero() {
        return Ok((U256::zero(), sqrt_price_x96));
    }

    let net_in = apply_fee(amount_in, fee_ppm)?;
    let liq = U256::from(liquidity);

    if zero_for_one {
        // token0 in, price moves down:
        // sqrtP' = ceil(L * Q96 * sqrtP / (L * Q96 + in * sqrtP))
        let numerator1 = widen(liq) << 96;
        let product = net_in.full_mul(sqrt_price_x96);
        let denominator = numerator1
            .checked_add(product)
            .ok_or(CoreError::ArithmeticOverflow("v3 denominator"))?;
        let numerator = numerator1
            .checked_mul(widen(sqrt_price_x96))
            .ok_or(CoreError::ArithmeticOverflow("v3 numerator"))?;

        let mut next = numerator / denominator;
        if numerator % denominator != U512::zero() {
            next = next + U512::one();
        }
        let sqrt_after = narrow(next, "v3 sqrt_after")?;

        // amount1 out = floor(L * (sqrtP - sqrtP') / Q96)
        let delta = sqrt_price_x96
            .checked_sub(sqrt_after)
            .ok_or(CoreError::ArithmeticOverflow("v3 price delta"))?;
        let amount_out = mul_div(liq, delta, q96())?;
        Ok((amount_out, sqrt_after))
    } else {
        // token1 in, price moves up:
        // sqrtP' = sqrtP + floor(in * Q96 / L)
        let quotient = narrow((widen(net_in) << 96) / widen(liq), "v3 quotient")?;
        let sqrt_after = sqrt_price_x96
            .checked_add(quotient)
            .ok_or(CoreError::ArithmeticOverflow("v3 sqrt_after"))?;

        // amount0 out = floor(L * Q96 * (sqrtP' - sqrtP) / (sqrtP' * sqrtP))
        let delta = sqrt_after - sqrt_price_x96;
        let numerator = (widen(liq) << 96)
            .checked_mul(widen(delta))
            .ok_or(CoreError::ArithmeticOverflow("v3 amount0 numerator"))?;
        let denominator = sqrt_after.full_mul(sqrt_price_x96);
        let amount_out = narrow(numerator / denominator, "v3 amount0 out")?;
        Ok((amount_out, sqrt_after))
    }
}

/// Fee-adjusted output at the undisturbed spot price of a V3 pool.
///
/// zeroForOne: out = in * sqrtP^2 / 2^192; oneForZero: the inverse.
pub fn v3_spot_out(
    sqrt_price_x96: U256,
    amount_in: U256,
    fee_ppm: u32,
    zero_for_one: bool,
) -> CoreResult<U256> {
    if sqrt_price_x96.is_zero() {
        return Ok(U256::zero());
    }
    let net_in = apply_fee(amount_in, fee_ppm)?;

    if zero_for_one {
        let step = net_in.full_mul(sqrt_price_x96) >> 96;
        let out = step
            .checked_mul(widen(sqrt_price_x96))
            .ok_or(CoreError::ArithmeticOverflow("v3 spot out"))?
            >> 96;
        narrow(out, "v3 spot out")
    } else {
        let step = (widen(net_in) << 96) / widen(sqrt_price_x96);
        let out = (step << 96) / widen(sqrt_price_x96);
        narrow(out, "v3 spot out")
    }
}

/// Price impact in basis points: the quoted output's shortfall against
/// the fee-adjusted spot output.
pub fn price_impact_bps(spot_out: U256, quoted_out: U256) -> CoreResult<u32> {
    if spot_out.is_zero() {
        return Ok(BPS);
    }
    if quoted_out >= spot_out {
        return Ok(0);
    }
    let shortfall = spot_out - quoted_out;
    let impact = mul_div(shortfall, U256::from(BPS), spot_out)?;
    Ok(impact.as_u32())
}
