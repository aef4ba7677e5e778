//! Pool resolution
//!
//! Looks a token pair and fee tier up in the venue's registry and hands
//! back an immutable `PoolHandle`, plus fresh state snapshots for it.
//! "No pool registered" is surfaced as `None`, never as an error and
//! never conflated with a pool that exists but holds nothing.

use crate::errors::CoreResult;
use crate::types::{FeeTier, PoolHandle, PoolState};
use crate::venue::PoolRegistry;
use ethers::types::Address;
use std::sync::Arc;
use tracing::debug;

pub struct PoolInfoResolver<R: PoolRegistry> {
    registry: Arc<R>,
}

impl<R: PoolRegistry> PoolInfoResolver<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    /// Resolve `(token_in, token_out, fee_tier)` to a pool, if one exists.
    ///
    /// Registries commonly answer "no pool" with the zero address; both
    /// that and an explicit miss come back as `Ok(None)`.
    pub async fn resolve(
        &self,
        token_in: Address,
        token_out: Address,
        fee_tier: FeeTier,
    ) -> CoreResult<Option<PoolHandle>> {
        let pool = self
            .registry
            .get_pool(token_in, token_out, fee_tier)
            .await?;

        match pool {
            None => {
                debug!(?token_in, ?token_out, %fee_tier, "no pool registered");
                Ok(None)
            }
            Some(address) if address == Address::zero() => {
                debug!(?token_in, ?token_out, %fee_tier, "registry returned zero address");
                Ok(None)
            }
            Some(address) => Ok(Some(PoolHandle {
                token_in,
                token_out,
                fee_tier,
                address,
            })),
        }
    }

    /// Fetch a fresh snapshot for a resolved pool.
    ///
    /// Called immediately before every use; snapshots are never carried
    /// across executions.
    pub async fn fresh_state(&self, handle: &PoolHandle) -> CoreResult<PoolState> {
        let state = self.registry.pool_state(handle.address).await?;
        debug!(pool = %handle, ?state, "fetched pool state");
        Ok(state)
    }
}
