pub mod config;
pub mod error;
pub mod http;
pub mod keys;
pub mod locker;
pub mod service;

pub use config::GatewayConfig;
pub use error::{ErrorKind, GatewayError};
pub use locker::{ContractGuard, ContractLocker};
pub use service::{
    AuditReport, ContractService, DeployRequest, Deployed, ExecRequest, Executed, LedgerEntry,
    deploy_fingerprint,
};

/// Wall-clock time as Unix milliseconds.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
