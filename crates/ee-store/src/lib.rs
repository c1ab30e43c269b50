//! Persistence for deployed contracts, their artifacts and per-contract ledgers, with
//! in-memory and SQLite backends.

mod mem_store;
mod sqlite_store;

pub use mem_store::MemRepository;
pub use sqlite_store::SqliteRepository;

use std::sync::Arc;

use ee_ledger::Block;
use ee_wire::{AgentMeta, ArtifactMetadata};
use serde::{Deserialize, Serialize};

pub type StoreResult<T> = Result<T, StoreError>;
pub type DynRepository = Arc<dyn Repository>;

/// Deployed contract record. `id` is the deploy fingerprint, which also keys the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub name: String,
    pub version: String,
    pub owner: String,
    pub artifact_hash: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Everything a successful deploy persists, written as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub agent: AgentMeta,
    pub artifact_hash: String,
    pub artifact: ArtifactMetadata,
    pub contract: Contract,
}

/// Storage operations the gateway depends on. Lookups return `Ok(None)` for absent
/// records; `Err` is reserved for backend failures and rejected writes.
pub trait Repository: Send + Sync {
    /// Persist agent, artifact and contract atomically. Agents are shared between
    /// deployments and stored once.
    fn save_deployment(&self, deployment: &Deployment) -> StoreResult<()>;
    fn contract(&self, id: &str) -> StoreResult<Option<Contract>>;
    fn contract_by_artifact(&self, artifact_hash: &str) -> StoreResult<Option<Contract>>;
    fn artifact(&self, hash: &str) -> StoreResult<Option<ArtifactMetadata>>;
    fn agent(&self, hash: &str) -> StoreResult<Option<AgentMeta>>;

    /// Append `block` to its contract's chain. The block must sit directly after the
    /// current tip (or be index 1 on an empty chain).
    fn append_block(&self, block: &Block) -> StoreResult<()>;
    fn latest_block(&self, contract_id: &str) -> StoreResult<Option<Block>>;
    /// Whole chain in index order.
    fn blocks(&self, contract_id: &str) -> StoreResult<Vec<Block>>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{what} encoding error: {source}")]
    Encoding {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind} '{key}' already exists")]
    Duplicate { kind: &'static str, key: String },
    #[error("block {actual} does not extend tip {tip} of contract {contract_id}")]
    OutOfOrder {
        contract_id: String,
        tip: u64,
        actual: u64,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

pub(crate) fn expected_next_index(tip: Option<u64>) -> u64 {
    tip.map_or(1, |index| index + 1)
}
