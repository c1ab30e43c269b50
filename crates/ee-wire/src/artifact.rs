//! Compiled-artifact descriptors as the engine emits them after a deploy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Closed value model for constant pools, function/type descriptors and storage layout.
///
/// Integers are tried before floats so whole numbers keep their exact representation;
/// values above `i64::MAX` land in `UInt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    List(Vec<SchemaValue>),
    Map(BTreeMap<String, SchemaValue>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(default, with = "crate::artifact::base64_bytes")]
    pub bytecode: Vec<u8>,
    #[serde(default)]
    pub const_pool: Vec<SchemaValue>,
    #[serde(default)]
    pub functions: BTreeMap<String, SchemaValue>,
    #[serde(default)]
    pub function_name: BTreeMap<u32, String>,
    #[serde(default)]
    pub types: BTreeMap<String, SchemaValue>,
    #[serde(default)]
    pub init_storage: BTreeMap<String, SchemaValue>,
}

/// Identity of the compiler/runtime agent that produced an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMeta {
    pub hash: String,
    pub name: String,
    pub version: String,
}

/// Byte fields travel as standard base64 strings.
pub(crate) mod base64_bytes {
    use base64::prelude::*;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        BASE64_STANDARD
            .decode(encoded)
            .map_err(|e| D::Error::custom(format!("invalid base64: {e}")))
    }
}
