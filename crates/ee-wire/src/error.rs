use std::time::Duration;

use thiserror::Error;

use crate::message::MessageType;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("connect to engine at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transport i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("engine rejected {kind} request {id}: {message}")]
    Engine {
        kind: MessageType,
        id: String,
        message: String,
    },
}

impl WireError {
    /// Connection-level failures; the only class the client retries.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WireError::Connect { .. } | WireError::Io(_) | WireError::Timeout { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
    #[error("frame declares {declared} payload bytes, found {actual}")]
    FrameLength { declared: usize, actual: usize },
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response id {actual} does not answer request {expected}")]
    IdMismatch { expected: String, actual: String },
    #[error("response type {actual} does not match request type {expected}")]
    TypeMismatch {
        expected: MessageType,
        actual: MessageType,
    },
    #[error("{0} response carries no data")]
    MissingData(MessageType),
}
