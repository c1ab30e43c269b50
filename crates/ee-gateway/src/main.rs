use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ee_gateway::config::lock_timeout_for;
use ee_gateway::http::{self, HttpState};
use ee_gateway::{ContractService, GatewayConfig, keys};
use ee_store::{DynRepository, MemRepository, SqliteRepository};
use ee_wire::{EngineConfig, SwpClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "eegw", version, about = "Execution engine gateway")]
struct Cli {
    /// HTTP listen address (env: EEGW_BIND)
    #[arg(long, env = "EEGW_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Execution engine host:port (env: EEGW_ENGINE)
    #[arg(long, env = "EEGW_ENGINE", default_value = "127.0.0.1:8332")]
    engine: String,

    /// SQLite database path (env: EEGW_DB)
    #[arg(long, env = "EEGW_DB", default_value = "eegw.db")]
    db: PathBuf,

    /// Keep all state in memory; overrides --db / EEGW_DB
    #[arg(long)]
    in_memory: bool,

    /// Ledger keypair file, created if missing (env: EEGW_KEY)
    #[arg(long, env = "EEGW_KEY", default_value = "keys/ledger.key")]
    key: PathBuf,

    /// Bearer token required on contract routes (env: EEGW_AUTH_TOKEN)
    #[arg(long, env = "EEGW_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Engine connect timeout in milliseconds (env: EEGW_CONNECT_TIMEOUT_MS)
    #[arg(long, env = "EEGW_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    connect_timeout_ms: u64,

    /// Per-attempt engine request timeout in milliseconds (env: EEGW_REQUEST_TIMEOUT_MS)
    #[arg(long, env = "EEGW_REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    request_timeout_ms: u64,

    /// Contract lock wait in milliseconds; defaults to twice the worst-case engine
    /// exchange (env: EEGW_LOCK_TIMEOUT_MS)
    #[arg(long, env = "EEGW_LOCK_TIMEOUT_MS")]
    lock_timeout_ms: Option<u64>,
}

impl Cli {
    fn into_config(self) -> GatewayConfig {
        let defaults = GatewayConfig::default();
        let engine = EngineConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            ..defaults.engine
        };
        let lock_timeout = self
            .lock_timeout_ms
            .map_or_else(|| lock_timeout_for(&engine), Duration::from_millis);
        GatewayConfig {
            bind: self.bind,
            engine_addr: self.engine,
            engine,
            database: (!self.in_memory).then_some(self.db),
            key_path: self.key,
            auth_token: self.auth_token,
            lock_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    run(Cli::parse().into_config()).await
}

async fn run(config: GatewayConfig) -> Result<()> {
    let signer = keys::load_or_create(&config.key_path)?;
    let repo: DynRepository = match &config.database {
        Some(path) => Arc::new(
            SqliteRepository::open(path)
                .with_context(|| format!("open database {}", path.display()))?,
        ),
        None => {
            tracing::warn!("using in-memory storage; ledger is lost on exit");
            Arc::new(MemRepository::new())
        }
    };
    let client = SwpClient::connect(config.engine_addr.clone(), config.engine.clone())
        .await
        .with_context(|| format!("connect to engine at {}", config.engine_addr))?;

    let service = Arc::new(ContractService::new(
        Arc::new(client),
        repo,
        signer,
        config.lock_timeout,
    ));
    let app = http::app(HttpState::new(service, config.auth_token));
    http::serve(config.bind, app, shutdown_signal()).await?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
