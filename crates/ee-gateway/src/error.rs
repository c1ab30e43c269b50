use std::time::Duration;

use ee_crypto::CryptoError;
use ee_ledger::{LedgerError, VerifyError};
use ee_store::StoreError;
use ee_wire::WireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("engine unreachable: {0}")]
    Transport(#[source] WireError),
    #[error("engine protocol error: {0}")]
    Protocol(#[source] WireError),
    #[error("{0}")]
    Engine(#[source] WireError),
    #[error("ledger verification failed: {0}")]
    Verification(#[from] VerifyError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
    #[error("storage task failed: {0}")]
    StorageTask(#[from] tokio::task::JoinError),
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),
    #[error("journal encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("contract {0} not found")]
    ContractNotFound(String),
    #[error("artifact {0} not found")]
    ArtifactNotFound(String),
    #[error("timed out after {after:?} waiting for the lock on contract {contract_id}")]
    LockTimeout { contract_id: String, after: Duration },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Protocol,
    Engine,
    Verification,
    Persistence,
    Crypto,
    NotFound,
    LockTimeout,
    InvalidRequest,
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Transport(_) => ErrorKind::Transport,
            GatewayError::Protocol(_) => ErrorKind::Protocol,
            GatewayError::Engine(_) => ErrorKind::Engine,
            GatewayError::Verification(_) => ErrorKind::Verification,
            GatewayError::Persistence(_) | GatewayError::StorageTask(_) => {
                ErrorKind::Persistence
            }
            GatewayError::Crypto(_) | GatewayError::Encoding(_) => ErrorKind::Crypto,
            GatewayError::ContractNotFound(_) | GatewayError::ArtifactNotFound(_) => {
                ErrorKind::NotFound
            }
            GatewayError::LockTimeout { .. } => ErrorKind::LockTimeout,
            GatewayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

impl From<WireError> for GatewayError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Engine { .. } => GatewayError::Engine(err),
            WireError::Protocol(_) => GatewayError::Protocol(err),
            _ => GatewayError::Transport(err),
        }
    }
}

impl From<LedgerError> for GatewayError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Encode(e) => GatewayError::Encoding(e),
            LedgerError::Crypto(e) => GatewayError::Crypto(e),
        }
    }
}
