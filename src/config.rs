//! Configuration management
//! Load settings from .env file
//!
//! The configuration surface is set once at construction and immutable
//! thereafter; changing any of it means reconfiguring and rebuilding the
//! executor, not mutating a live one.

use crate::types::FeeTier;
use anyhow::{bail, Context, Result};
use ethers::types::{Address, U256};
use serde::Deserialize;
use std::str::FromStr;

/// Immutable executor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Recipient of realized profit
    pub owner: Address,

    /// Venue addresses
    pub swap_venue: Address,
    pub quoter: Address,
    pub pool_registry: Address,
    pub lending_facility: Address,

    /// Default slippage tolerance in basis points, [0, 10000)
    pub slippage_tolerance_bps: u32,
    /// Reject trades whose projected price impact exceeds this
    pub max_price_impact_bps: u32,
    /// Reject pools whose input-side depth is below this
    pub min_pool_liquidity: U256,

    /// Gas envelope; enforced pre-flight, submission itself is external
    pub gas_limit: u64,
    pub gas_price_ceiling_wei: U256,

    /// Fee tiers probed by opportunity evaluation, in order
    pub fee_tiers: Vec<FeeTier>,
}

pub fn load_config() -> Result<ExecutorConfig> {
    dotenv::dotenv().ok();

    let fee_tiers_str =
        std::env::var("FEE_TIERS").unwrap_or_else(|_| "500,3000,10000".to_string());

    let mut fee_tiers = Vec::new();
    for tier_str in fee_tiers_str.split(',') {
        let tier = FeeTier::from_str(tier_str)
            .map_err(|e| anyhow::anyhow!(e))
            .context("FEE_TIERS")?;
        fee_tiers.push(tier);
    }
    if fee_tiers.is_empty() {
        bail!("FEE_TIERS must name at least one tier");
    }

    let slippage_tolerance_bps = parse_bps(
        "SLIPPAGE_TOLERANCE_BPS",
        &std::env::var("SLIPPAGE_TOLERANCE_BPS").context("SLIPPAGE_TOLERANCE_BPS not set")?,
        9_999,
    )?;
    let max_price_impact_bps = parse_bps(
        "MAX_PRICE_IMPACT_BPS",
        &std::env::var("MAX_PRICE_IMPACT_BPS").context("MAX_PRICE_IMPACT_BPS not set")?,
        10_000,
    )?;

    let gas_price_ceiling_gwei: u64 = std::env::var("GAS_PRICE_CEILING_GWEI")
        .context("GAS_PRICE_CEILING_GWEI not set")?
        .parse()?;

    Ok(ExecutorConfig {
        owner: parse_address("OWNER_ADDRESS")?,
        swap_venue: parse_address("SWAP_VENUE_ADDRESS")?,
        quoter: parse_address("QUOTER_ADDRESS")?,
        pool_registry: parse_address("POOL_REGISTRY_ADDRESS")?,
        lending_facility: parse_address("LENDING_FACILITY_ADDRESS")?,

        slippage_tolerance_bps,
        max_price_impact_bps,
        min_pool_liquidity: U256::from_dec_str(
            &std::env::var("MIN_POOL_LIQUIDITY").context("MIN_POOL_LIQUIDITY not set")?,
        )?,

        gas_limit: std::env::var("GAS_LIMIT").context("GAS_LIMIT not set")?.parse()?,
        gas_price_ceiling_wei: U256::from(gas_price_ceiling_gwei)
            .checked_mul(U256::from(1_000_000_000u64))
            .context("GAS_PRICE_CEILING_GWEI too large")?,

        fee_tiers,
    })
}

/// Basis-point setting with an inclusive upper bound. A ceiling above
/// the bound would silently disable the check it feeds.
fn parse_bps(var: &str, raw: &str, max: u32) -> Result<u32> {
    let value: u32 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} is not a number", var))?;
    if value > max {
        bail!("{} {} out of range [0, {}]", var, value, max);
    }
    Ok(value)
}

fn parse_address(var: &str) -> Result<Address> {
    let raw = std::env::var(var).with_context(|| format!("{} not set", var))?;
    Address::from_str(raw.trim()).with_context(|| format!("{} is not a valid address", var))
}
