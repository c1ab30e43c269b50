use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use ee_wire::EngineConfig;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP listen address.
    pub bind: SocketAddr,
    /// Execution engine `host:port`.
    pub engine_addr: String,
    pub engine: EngineConfig,
    /// SQLite database file; `None` keeps everything in memory.
    pub database: Option<PathBuf>,
    /// Ledger keypair file, created on first start.
    pub key_path: PathBuf,
    /// Static bearer token required on contract routes when set.
    pub auth_token: Option<String>,
    /// Longest an execution waits for its contract's lock. Defaults to
    /// [`lock_timeout_for`] of `engine`.
    pub lock_timeout: Duration,
}

/// Lock wait that outlasts the holder's own engine call plus one queued caller ahead.
pub fn lock_timeout_for(engine: &EngineConfig) -> Duration {
    engine.exchange_budget() * 2
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            engine_addr: "127.0.0.1:8332".into(),
            lock_timeout: lock_timeout_for(&engine),
            engine,
            database: Some(PathBuf::from("eegw.db")),
            key_path: PathBuf::from("keys/ledger.key"),
            auth_token: None,
        }
    }
}
