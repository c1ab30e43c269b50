//! Request and response envelopes.
//!
//! On the wire a request is `{"type": "DEPLOY" | "EXEC" | "PING", "id": <token>, "data": <payload>}`
//! and a response is `{"type", "id", "success", "data"?, "error"?}`. Requests are decoded by
//! reading `type` first and then decoding `data` as that variant's payload.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::artifact::{AgentMeta, ArtifactMetadata};
use crate::error::{ProtocolError, WireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Deploy,
    Exec,
    Ping,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageType::Deploy => "DEPLOY",
            MessageType::Exec => "EXEC",
            MessageType::Ping => "PING",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployPayload {
    /// Content fingerprint; always computed by the gateway, never taken from callers.
    pub hash: String,
    pub contract_name: String,
    pub version: String,
    pub owner: String,
    #[serde(default, with = "crate::artifact::base64_bytes")]
    pub source: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecPayload {
    #[serde(rename = "contract_id")]
    pub artifact_hash: String,
    /// Engines are stateless; every call carries the full artifact.
    pub contract_artifact: ArtifactMetadata,
    pub function: String,
    #[serde(default)]
    pub args: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingPayload {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Deploy(DeployPayload),
    Exec(ExecPayload),
    Ping(PingPayload),
}

impl Payload {
    pub fn kind(&self) -> MessageType {
        match self {
            Payload::Deploy(_) => MessageType::Deploy,
            Payload::Exec(_) => MessageType::Exec,
            Payload::Ping(_) => MessageType::Ping,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct WireMessage {
    pub id: String,
    pub payload: Payload,
}

impl WireMessage {
    pub fn new(id: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    pub fn kind(&self) -> MessageType {
        self.payload.kind()
    }
}

impl Serialize for WireMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("WireMessage", 3)?;
        state.serialize_field("type", &self.kind())?;
        state.serialize_field("id", &self.id)?;
        match &self.payload {
            Payload::Deploy(p) => state.serialize_field("data", p)?,
            Payload::Exec(p) => state.serialize_field("data", p)?,
            Payload::Ping(p) => state.serialize_field("data", p)?,
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: MessageType,
    id: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl TryFrom<RawMessage> for WireMessage {
    type Error = serde_json::Error;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let payload = match raw.kind {
            MessageType::Deploy => Payload::Deploy(serde_json::from_value(raw.data)?),
            MessageType::Exec => Payload::Exec(serde_json::from_value(raw.data)?),
            MessageType::Ping => Payload::Ping(serde_json::from_value(raw.data)?),
        };
        Ok(WireMessage {
            id: raw.id,
            payload,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub id: String,
    pub success: bool,
    /// Left undecoded until the caller knows which response shape to expect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireResponse {
    pub fn ok(request: &WireMessage, data: serde_json::Value) -> Self {
        Self {
            kind: request.kind(),
            id: request.id.clone(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(request: &WireMessage, message: impl Into<String>) -> Self {
        Self {
            kind: request.kind(),
            id: request.id.clone(),
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Check that this response answers `request`.
    pub fn ensure_answers(&self, request: &WireMessage) -> Result<(), ProtocolError> {
        if self.id != request.id {
            return Err(ProtocolError::IdMismatch {
                expected: request.id.clone(),
                actual: self.id.clone(),
            });
        }
        if self.kind != request.kind() {
            return Err(ProtocolError::TypeMismatch {
                expected: request.kind(),
                actual: self.kind,
            });
        }
        Ok(())
    }

    /// Decode `data` as the expected response shape; engine-side failures surface as errors.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, WireError> {
        if !self.success {
            return Err(WireError::Engine {
                kind: self.kind,
                id: self.id.clone(),
                message: self.error.clone().unwrap_or_default(),
            });
        }
        let data = self
            .data
            .clone()
            .ok_or(ProtocolError::MissingData(self.kind))?;
        serde_json::from_value(data).map_err(|e| ProtocolError::Json(e).into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub agent: AgentMeta,
    pub contract_hash: String,
    pub contract_name: String,
    pub contract_owner: String,
    pub contract_version: String,
    #[serde(default)]
    pub functions: Vec<String>,
    pub contract_artifact: ArtifactMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecResponse {
    pub artifact_hash: String,
    pub function: String,
    #[serde(default)]
    pub journal: Vec<serde_json::Value>,
    pub exec_price: i64,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exec_message() -> WireMessage {
        WireMessage::new(
            "req-1",
            Payload::Exec(ExecPayload {
                artifact_hash: "0xabc".into(),
                contract_artifact: ArtifactMetadata::default(),
                function: "mint".into(),
                args: BTreeMap::from([("amount".to_string(), json!(10))]),
            }),
        )
    }

    #[test]
    fn request_uses_engine_field_names() {
        let value = serde_json::to_value(exec_message()).unwrap();
        assert_eq!(value["type"], "EXEC");
        assert_eq!(value["id"], "req-1");
        assert_eq!(value["data"]["contract_id"], "0xabc");
        assert_eq!(value["data"]["args"]["amount"], 10);
    }

    #[test]
    fn decode_dispatches_on_type() {
        let raw = json!({
            "type": "DEPLOY",
            "id": "d-1",
            "data": {"hash": "0x01", "contract_name": "token", "version": "1", "owner": "alice", "source": "aGk="}
        });
        let msg: WireMessage = serde_json::from_value(raw).unwrap();
        match msg.payload {
            Payload::Deploy(p) => assert_eq!(p.source, b"hi"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn payload_must_match_declared_type() {
        let raw = json!({"type": "PING", "id": "p", "data": {"hash": "0x01"}});
        assert!(serde_json::from_value::<WireMessage>(raw).is_err());
        let unknown = json!({"type": "QUERY", "id": "q", "data": {}});
        assert!(serde_json::from_value::<WireMessage>(unknown).is_err());
    }

    #[test]
    fn response_correlation_checks() {
        let req = exec_message();
        let resp = WireResponse::ok(&req, json!({}));
        resp.ensure_answers(&req).unwrap();

        let mut wrong_id = resp.clone();
        wrong_id.id = "req-2".into();
        assert!(matches!(
            wrong_id.ensure_answers(&req),
            Err(ProtocolError::IdMismatch { .. })
        ));

        let mut wrong_kind = resp;
        wrong_kind.kind = MessageType::Ping;
        assert!(matches!(
            wrong_kind.ensure_answers(&req),
            Err(ProtocolError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn failed_response_surfaces_engine_error() {
        let req = exec_message();
        let resp = WireResponse::failure(&req, "function not found");
        let err = resp.decode_data::<ExecResponse>().unwrap_err();
        assert!(matches!(err, WireError::Engine { ref message, .. } if message == "function not found"));
        assert!(!err.is_transport());

        let empty = WireResponse {
            data: None,
            ..WireResponse::ok(&req, json!(null))
        };
        assert!(matches!(
            empty.decode_data::<ExecResponse>(),
            Err(WireError::Protocol(ProtocolError::MissingData(MessageType::Exec)))
        ));
    }

    #[test]
    fn success_response_omits_error_field() {
        let resp = WireResponse::ok(&exec_message(), json!({"x": 1}));
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["success"], true);
    }
}
