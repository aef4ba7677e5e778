//! Allowance management
//!
//! Spending approvals are read fresh through the ledger every time they
//! matter; an allowance observed during planning is never trusted at
//! execution time. Observations are kept in a DashMap purely for
//! diagnostics.

use crate::errors::{CoreError, CoreResult};
use crate::types::TokenAmount;
use crate::venue::TokenLedger;
use dashmap::DashMap;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::debug;

pub struct AllowanceManager<L: TokenLedger> {
    ledger: Arc<L>,
    /// Last observed allowance per (owner, token, spender); diagnostic only
    observed: DashMap<(Address, Address, Address), U256>,
}

impl<L: TokenLedger> AllowanceManager<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self {
            ledger,
            observed: DashMap::new(),
        }
    }

    /// Fresh allowance read; records the observation as it goes.
    pub async fn current_allowance(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
    ) -> CoreResult<TokenAmount> {
        let amount = self.ledger.allowance(owner, token, spender).await?;
        self.observed.insert((owner, token, spender), amount);
        debug!(?owner, ?token, ?spender, %amount, "observed allowance");
        Ok(TokenAmount::new(token, amount))
    }

    /// Re-query and require at least `required`. Called immediately
    /// before use; the planning-time observation does not count.
    pub async fn ensure_allowance(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
        required: U256,
    ) -> CoreResult<()> {
        let current = self.current_allowance(owner, token, spender).await?;
        if current.amount < required {
            return Err(CoreError::InsufficientAllowance {
                have: current.amount,
                need: required,
            });
        }
        Ok(())
    }

    /// Last value seen for this triple, if any
    pub fn last_observed(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
    ) -> Option<U256> {
        self.observed
            .get(&(owner, token, spender))
            .map(|entry| *entry.value())
    }
}
