//! Client side of the engine wire protocol: typed envelopes, length-prefixed JSON
//! framing and a single-connection transport with one reconnect-and-retry.

pub mod artifact;
pub mod client;
pub mod codec;
pub mod error;
pub mod message;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use artifact::{AgentMeta, ArtifactMetadata, SchemaValue};
pub use client::{EngineConfig, SwpClient, Transport};
pub use codec::{DEFAULT_MAX_FRAME_LEN, LENGTH_PREFIX_LEN, decode_frame, encode_frame, read_frame, write_frame};
pub use error::{ProtocolError, WireError};
pub use message::{
    DeployPayload, DeployResponse, ExecPayload, ExecResponse, MessageType, Payload, PingPayload,
    WireMessage, WireResponse,
};
