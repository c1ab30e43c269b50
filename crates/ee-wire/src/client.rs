use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::codec::{DEFAULT_MAX_FRAME_LEN, read_frame, write_frame};
use crate::error::WireError;
use crate::message::{WireMessage, WireResponse};

/// One original attempt plus one replay after reconnecting.
const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub connect_timeout: Duration,
    /// Deadline for one write+read exchange.
    pub request_timeout: Duration,
    pub max_frame_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl EngineConfig {
    /// Longest a single `send` can take while every attempt stays within its deadlines:
    /// each attempt may dial and then run a full exchange.
    pub fn exchange_budget(&self) -> Duration {
        (self.connect_timeout + self.request_timeout) * MAX_ATTEMPTS
    }
}

/// Request/response exchange with the execution engine.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &WireMessage) -> Result<WireResponse, WireError>;
}

/// Single-connection engine client.
///
/// The connection lock is held for the whole encode/decode exchange, so at most one
/// request is in flight and responses pair with requests by arrival order. The response
/// `id` and `type` are still checked against the request.
pub struct SwpClient {
    addr: String,
    config: EngineConfig,
    conn: Mutex<Option<TcpStream>>,
}

impl std::fmt::Debug for SwpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwpClient")
            .field("addr", &self.addr)
            .field("config", &self.config)
            .finish()
    }
}

impl SwpClient {
    /// Open the persistent connection; fails if the engine is unreachable.
    pub async fn connect(addr: impl Into<String>, config: EngineConfig) -> Result<Self, WireError> {
        let addr = addr.into();
        let stream = dial(&addr, config.connect_timeout).await?;
        tracing::info!(addr = %addr, "connected to engine");
        Ok(Self {
            addr,
            config,
            conn: Mutex::new(Some(stream)),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send `message` and wait for its response.
    ///
    /// A transport failure (connect, write, read or deadline) drops the connection, dials
    /// the same address again and replays the same message once. A second failure is
    /// returned as-is. Protocol errors are never retried. The engine may have executed the
    /// first attempt even though the client saw it fail, so a replayed request can run twice
    /// on the engine side.
    pub async fn send(&self, message: &WireMessage) -> Result<WireResponse, WireError> {
        let mut conn = self.conn.lock().await;
        let mut attempt = 1;
        loop {
            tracing::debug!(kind = %message.kind(), id = %message.id, attempt, "sending engine request");
            match self.attempt(&mut conn, message).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transport() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        kind = %message.kind(),
                        id = %message.id,
                        error = %err,
                        "engine exchange failed; reconnecting and retrying once"
                    );
                    *conn = None;
                    attempt += 1;
                }
                Err(err) => {
                    // Stream position is unknown after any failure; start clean next call.
                    *conn = None;
                    tracing::error!(kind = %message.kind(), id = %message.id, attempt, error = %err, "engine request failed");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        conn: &mut Option<TcpStream>,
        message: &WireMessage,
    ) -> Result<WireResponse, WireError> {
        let stream = match conn.take() {
            Some(stream) => stream,
            None => {
                let stream = dial(&self.addr, self.config.connect_timeout).await?;
                tracing::info!(addr = %self.addr, "reconnected to engine");
                stream
            }
        };
        let stream = conn.insert(stream);
        let max = self.config.max_frame_len;
        let response: WireResponse = deadline("engine exchange", self.config.request_timeout, async {
            write_frame(stream, message, max).await?;
            read_frame(stream, max).await
        })
        .await?;
        response.ensure_answers(message)?;
        Ok(response)
    }
}

#[async_trait]
impl Transport for SwpClient {
    async fn send(&self, message: &WireMessage) -> Result<WireResponse, WireError> {
        SwpClient::send(self, message).await
    }
}

async fn dial(addr: &str, timeout: Duration) -> Result<TcpStream, WireError> {
    let stream = deadline("engine connect", timeout, async {
        TcpStream::connect(addr)
            .await
            .map_err(|source| WireError::Connect {
                addr: addr.to_string(),
                source,
            })
    })
    .await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

async fn deadline<T, F>(op: &'static str, after: Duration, fut: F) -> Result<T, WireError>
where
    F: Future<Output = Result<T, WireError>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| WireError::Timeout { op, after })?
}
