//! Core data structures for the arbitrage execution core
//!
//! Everything here is a value object: pool handles are immutable once
//! resolved, pool snapshots are never cached across executions, and all
//! amount arithmetic is checked.

use crate::errors::{CoreError, CoreResult};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ERC20 amount in the token's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: Address,
    pub amount: U256,
}

impl TokenAmount {
    pub fn new(token: Address, amount: U256) -> Self {
        Self { token, amount }
    }

    pub fn zero(token: Address) -> Self {
        Self {
            token,
            amount: U256::zero(),
        }
    }

    /// Checked addition. Overflow is fatal, never truncated.
    pub fn checked_add(&self, rhs: U256) -> CoreResult<TokenAmount> {
        let amount = self
            .amount
            .checked_add(rhs)
            .ok_or(CoreError::ArithmeticOverflow("TokenAmount::checked_add"))?;
        Ok(Self::new(self.token, amount))
    }

    /// Checked subtraction. Underflow is fatal, never truncated.
    pub fn checked_sub(&self, rhs: U256) -> CoreResult<TokenAmount> {
        let amount = self
            .amount
            .checked_sub(rhs)
            .ok_or(CoreError::ArithmeticOverflow("TokenAmount::checked_sub"))?;
        Ok(Self::new(self.token, amount))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} of {:?}", self.amount, self.token)
    }
}

/// Fee tiers the venue supports.
///
/// `V2` is the flat 0.30% constant-product pool; the V3 variants are the
/// concentrated-liquidity fee tiers (0.05%, 0.30%, 1.00%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeTier {
    V2,
    V3_005,
    V3_030,
    V3_100,
}

impl FeeTier {
    /// Returns true if this is a concentrated-liquidity tier
    pub fn is_v3(&self) -> bool {
        matches!(self, FeeTier::V3_005 | FeeTier::V3_030 | FeeTier::V3_100)
    }

    /// Swap fee in parts-per-million (the venue's on-chain fee unit)
    pub fn fee_ppm(&self) -> u32 {
        match self {
            FeeTier::V2 => 3_000,
            FeeTier::V3_005 => 500,
            FeeTier::V3_030 => 3_000,
            FeeTier::V3_100 => 10_000,
        }
    }

    /// V3 fee tier value used for registry queries (500, 3000, 10000)
    pub fn v3_fee_tier(&self) -> Option<u32> {
        match self {
            FeeTier::V3_005 => Some(500),
            FeeTier::V3_030 => Some(3_000),
            FeeTier::V3_100 => Some(10_000),
            FeeTier::V2 => None,
        }
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeeTier::V2 => write!(f, "V2_0.30%"),
            FeeTier::V3_005 => write!(f, "V3_0.05%"),
            FeeTier::V3_030 => write!(f, "V3_0.30%"),
            FeeTier::V3_100 => write!(f, "V3_1.00%"),
        }
    }
}

impl FromStr for FeeTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "v2" => Ok(FeeTier::V2),
            "500" => Ok(FeeTier::V3_005),
            "3000" => Ok(FeeTier::V3_030),
            "10000" => Ok(FeeTier::V3_100),
            other => Err(format!("unsupported fee tier: {}", other)),
        }
    }
}

/// A resolved liquidity pool for one swap direction.
///
/// Immutable once produced by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHandle {
    pub token_in: Address,
    pub token_out: Address,
    pub fee_tier: FeeTier,
    pub address: Address,
}

impl PoolHandle {
    /// Swap direction in the pool's canonical token ordering.
    ///
    /// Pools order token0 < token1 by address; a swap is "zero for one"
    /// when the input token is token0.
    pub fn zero_for_one(&self) -> bool {
        self.token_in < self.token_out
    }
}

impl fmt::Display for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:?} -> {:?} @ {} ({:?})",
            self.token_in, self.token_out, self.fee_tier, self.address
        )
    }
}

/// Point-in-time pool snapshot.
///
/// Tied to a `PoolHandle` at query time and never reused across
/// executions; stale state is a direct fund-loss vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Constant-product pool reserves
    V2 { reserve0: U256, reserve1: U256 },
    /// Concentrated-liquidity slot0 snapshot
    V3 {
        /// sqrt(price) as a Q64.96 fixed point number
        sqrt_price_x96: U256,
        tick: i32,
        /// Current in-range liquidity
        liquidity: u128,
    },
}

impl PoolState {
    /// A pool can exist in the registry yet hold nothing tradeable.
    pub fn is_empty(&self) -> bool {
        match self {
            PoolState::V2 { reserve0, reserve1 } => reserve0.is_zero() || reserve1.is_zero(),
            PoolState::V3 {
                sqrt_price_x96,
                liquidity,
                ..
            } => *liquidity == 0 || sqrt_price_x96.is_zero(),
        }
    }

    /// Depth of the pool on the input side, used for minimum-depth gating
    pub fn depth(&self, zero_for_one: bool) -> U256 {
        match self {
            PoolState::V2 { reserve0, reserve1 } => {
                if zero_for_one {
                    *reserve0
                } else {
                    *reserve1
                }
            }
            PoolState::V3 { liquidity, .. } => U256::from(*liquidity),
        }
    }
}

/// Expected proceeds of a hypothetical swap against one pool snapshot.
///
/// Purely derived; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub handle: PoolHandle,
    pub amount_in: U256,
    pub amount_out_expected: U256,
    pub price_impact_bps: u32,
}

/// Caller-supplied parameters for one execution attempt.
///
/// Exclusively owned by a single in-flight execution. The route must
/// return to the borrowed token: repayment is owed in `token_in`, so a
/// route ending anywhere else could never settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionParameters {
    pub owner: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    /// Caller's floor on the final proceeds, on top of per-hop slippage floors
    pub min_amount_out: U256,
    pub slippage_tolerance_bps: u32,
    pub gas_limit: u64,
    /// Gas price the caller intends to submit with; rejected pre-flight
    /// when above the configured ceiling
    pub gas_price_wei: U256,
    /// Pre-selected route, ordered; route discovery is the caller's job
    pub route: Vec<PoolHandle>,
}

impl ExecutionParameters {
    /// Validate before any state is touched. A malformed request is a
    /// pre-flight rejection, never a rollback.
    pub fn validate(&self) -> CoreResult<()> {
        if self.amount_in.is_zero() {
            return Err(CoreError::MalformedRoute(
                "amount_in must be positive".to_string(),
            ));
        }
        if self.slippage_tolerance_bps >= 10_000 {
            return Err(CoreError::MalformedRoute(format!(
                "slippage tolerance {} bps out of range [0, 10000)",
                self.slippage_tolerance_bps
            )));
        }
        if self.route.is_empty() {
            return Err(CoreError::MalformedRoute("route has zero hops".to_string()));
        }
        if self.token_out != self.token_in {
            return Err(CoreError::MalformedRoute(
                "route must settle in the borrowed token".to_string(),
            ));
        }
        let first = &self.route[0];
        if first.token_in != self.token_in {
            return Err(CoreError::MalformedRoute(
                "first hop does not start at token_in".to_string(),
            ));
        }
        let last = &self.route[self.route.len() - 1];
        if last.token_out != self.token_out {
            return Err(CoreError::MalformedRoute(
                "last hop does not end at token_out".to_string(),
            ));
        }
        for pair in self.route.windows(2) {
            if pair[0].token_out != pair[1].token_in {
                return Err(CoreError::MalformedRoute(format!(
                    "route is not contiguous at hop {:?} -> {:?}",
                    pair[0].token_out, pair[1].token_in
                )));
            }
        }
        Ok(())
    }
}

/// The obligation created when borrowed principal is received.
///
/// Settled within the same atomic unit or the whole unit is void.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanObligation {
    pub principal: TokenAmount,
    pub fee: TokenAmount,
}

impl LoanObligation {
    /// Principal plus fee, checked
    pub fn total_owed(&self) -> CoreResult<U256> {
        self.principal
            .amount
            .checked_add(self.fee.amount)
            .ok_or(CoreError::ArithmeticOverflow("LoanObligation::total_owed"))
    }
}

/// Terminal result of one execution attempt. Produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Unit committed; loan repaid and residual profit forwarded
    Success { profit: TokenAmount },
    /// Rejected pre-flight; no loan obligation was ever created
    Rejected { reason: CoreError },
    /// Rolled back in-unit; every effect of the unit is void
    Reverted { cause: CoreError },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}
