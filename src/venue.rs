//! External collaborator interfaces
//!
//! The core never talks to the chain directly; everything it consumes is
//! behind one of these traits. Adapters over real contracts (registry,
//! router, flash-loan pool, ERC20s) live with the embedding application,
//! and tests script them in memory.

use crate::errors::CoreResult;
use crate::types::{FeeTier, LoanObligation, PoolHandle, PoolState};
use async_trait::async_trait;
use ethers::types::{Address, U256};

/// The venue's pool registry (factory).
///
/// "No pool" (`Ok(None)`) is distinct from "pool exists but is empty";
/// the latter comes back as a `PoolState` with zero depth.
#[async_trait]
pub trait PoolRegistry: Send + Sync {
    async fn get_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee_tier: FeeTier,
    ) -> CoreResult<Option<Address>>;

    /// Fresh price/tick/liquidity snapshot for a pool
    async fn pool_state(&self, pool: Address) -> CoreResult<PoolState>;
}

/// The swap venue (router).
///
/// The venue itself enforces the floor: a conforming implementation never
/// returns less than `min_amount_out`, it reverts instead.
#[async_trait]
pub trait SwapVenue: Send + Sync {
    async fn swap_exact_in(
        &self,
        handle: &PoolHandle,
        amount_in: U256,
        min_amount_out: U256,
    ) -> CoreResult<U256>;
}

/// Whether the lending facility accepted a repayment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepayReceipt {
    Accepted,
    Rejected,
}

/// The flash-loan lender.
///
/// Borrow and repay happen within one atomic unit or not at all; the
/// facility voids every effect of a unit that ends without accepted
/// repayment.
#[async_trait]
pub trait LendingFacility: Send + Sync {
    async fn available_liquidity(&self, token: Address) -> CoreResult<U256>;

    /// Deliver principal and create the repay obligation
    async fn borrow(&self, token: Address, amount: U256) -> CoreResult<LoanObligation>;

    async fn repay(&self, token: Address, amount: U256) -> CoreResult<RepayReceipt>;
}

/// ERC20 reads and transfers the core needs: allowance checks before
/// swaps, and forwarding realized profit to the owner.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn allowance(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
    ) -> CoreResult<U256>;

    async fn transfer(&self, token: Address, to: Address, amount: U256) -> CoreResult<()>;
}
