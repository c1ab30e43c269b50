//! Per-contract mutual exclusion.
//!
//! Executions against one contract must not interleave between reading the chain tip
//! and appending the next block. Each contract id maps to its own async mutex, created
//! on first use and kept for the life of the process; distinct contracts never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::error::GatewayError;

type Slot = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
pub struct ContractLocker {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Exclusive hold on one contract. Released on drop.
#[derive(Debug)]
pub struct ContractGuard {
    contract_id: String,
    _held: OwnedMutexGuard<()>,
}

impl ContractGuard {
    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn release(self) {}
}

impl ContractLocker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, contract_id: &str) -> Slot {
        // The registry lock is held only for a map lookup, so a poisoned map is still
        // consistent.
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(contract_id.to_string()).or_default().clone()
    }

    /// Wait until no other holder of `contract_id` remains.
    pub async fn acquire(&self, contract_id: &str) -> ContractGuard {
        let held = self.slot(contract_id).lock_owned().await;
        ContractGuard {
            contract_id: contract_id.to_string(),
            _held: held,
        }
    }

    /// Like [`acquire`](Self::acquire), giving up after `timeout`.
    pub async fn acquire_timeout(
        &self,
        contract_id: &str,
        timeout: Duration,
    ) -> Result<ContractGuard, GatewayError> {
        tokio::time::timeout(timeout, self.acquire(contract_id))
            .await
            .map_err(|_| GatewayError::LockTimeout {
                contract_id: contract_id.to_string(),
                after: timeout,
            })
    }

    /// Number of contracts that have been locked at least once.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
