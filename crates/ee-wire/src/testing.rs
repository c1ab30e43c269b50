//! Loopback engine peer for tests. Speaks the framed protocol over TCP and lets a
//! handler decide, per request, how to answer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::codec::{DEFAULT_MAX_FRAME_LEN, read_frame, write_frame};
use crate::message::{DeployResponse, ExecResponse, Payload, WireMessage, WireResponse};

pub enum Reply {
    Respond(WireResponse),
    /// Close the connection without answering.
    Hangup,
    /// Keep the connection open and never answer.
    Stall,
    /// Write an arbitrary payload inside a valid length prefix.
    RawFrame(Vec<u8>),
}

type Handler = dyn Fn(usize, &WireMessage) -> Reply + Send + Sync;

pub struct MockEngine {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockEngine {
    /// Bind on an ephemeral loopback port. `handler` receives the 1-based request count
    /// (across all connections) and the decoded request.
    pub async fn spawn<F>(handler: F) -> std::io::Result<Self>
    where
        F: Fn(usize, &WireMessage) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));
        let handler: Arc<Handler> = Arc::new(handler);

        let task = {
            let connections = connections.clone();
            let requests = requests.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve_conn(stream, handler.clone(), requests.clone()));
                }
            })
        };

        Ok(Self {
            addr,
            connections,
            requests,
            task,
        })
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_conn(mut stream: TcpStream, handler: Arc<Handler>, requests: Arc<AtomicUsize>) {
    loop {
        let Ok(msg) = read_frame::<_, WireMessage>(&mut stream, DEFAULT_MAX_FRAME_LEN).await else {
            return;
        };
        let n = requests.fetch_add(1, Ordering::SeqCst) + 1;
        match handler(n, &msg) {
            Reply::Respond(resp) => {
                if write_frame(&mut stream, &resp, DEFAULT_MAX_FRAME_LEN).await.is_err() {
                    return;
                }
            }
            Reply::Hangup => return,
            Reply::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return;
            }
            Reply::RawFrame(bytes) => {
                use tokio::io::AsyncWriteExt;
                let mut frame = (bytes.len() as u32).to_be_bytes().to_vec();
                frame.extend_from_slice(&bytes);
                if stream.write_all(&frame).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Well-behaved engine: compiles every deploy into a small artifact and answers every
/// exec with a one-entry journal echoing the call.
pub fn contract_engine(_n: usize, msg: &WireMessage) -> Reply {
    let data = match &msg.payload {
        Payload::Deploy(p) => {
            let response = DeployResponse {
                agent: crate::AgentMeta {
                    hash: "0xagent".into(),
                    name: "mock-compiler".into(),
                    version: "0.1.0".into(),
                },
                contract_hash: p.hash.clone(),
                contract_name: p.contract_name.clone(),
                contract_owner: p.owner.clone(),
                contract_version: p.version.clone(),
                functions: vec!["mint".into()],
                contract_artifact: crate::ArtifactMetadata {
                    bytecode: p.source.clone(),
                    const_pool: vec![crate::SchemaValue::Int(0)],
                    function_name: [(0, "mint".to_string())].into(),
                    ..Default::default()
                },
            };
            serde_json::to_value(response)
        }
        Payload::Exec(p) => serde_json::to_value(ExecResponse {
            artifact_hash: p.artifact_hash.clone(),
            function: p.function.clone(),
            journal: vec![json!({
                "event": "called",
                "function": p.function,
                "args": p.args,
            })],
            exec_price: 21,
            timestamp: 0,
        }),
        Payload::Ping(p) => Ok(json!({ "timestamp": p.timestamp })),
    };
    match data {
        Ok(data) => Reply::Respond(WireResponse::ok(msg, data)),
        Err(e) => Reply::Respond(WireResponse::failure(msg, e.to_string())),
    }
}
