use ee_crypto::{CryptoError, Digest, JournalKey, LedgerSigner, encrypt_journal, sha256_hex};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::block::Block;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("journal encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Canonical journal encoding: compact JSON, object keys in sorted order.
///
/// Keys are sorted explicitly: `serde_json::Map` keeps insertion order whenever
/// `preserve_order` is enabled anywhere in the build.
pub fn journal_bytes(entries: &[serde_json::Value]) -> Result<Vec<u8>, serde_json::Error> {
    let entries: Vec<Canonical<'_>> = entries.iter().map(Canonical).collect();
    serde_json::to_vec(&entries)
}

struct Canonical<'a>(&'a serde_json::Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            serde_json::Value::Array(items) => serializer.collect_seq(items.iter().map(Canonical)),
            serde_json::Value::Object(map) => {
                let mut fields: Vec<_> = map.iter().collect();
                fields.sort_unstable_by(|a, b| a.0.cmp(b.0));
                serializer.collect_map(fields.into_iter().map(|(k, v)| (k, Canonical(v))))
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

/// `0x`-prefixed SHA-256 of the plaintext journal bytes. Used on both the append and the
/// verify side; the block timestamp is not part of it.
pub fn journal_hash(journal: &[u8]) -> String {
    sha256_hex(journal)
}

/// Digest over `timestamp|previous_hash|journal_hash|contract_id|function_name|artifact_hash`.
pub fn block_fingerprint(
    timestamp: i64,
    previous_hash: &str,
    journal_hash: &str,
    contract_id: &str,
    function_name: &str,
    artifact_hash: &str,
) -> Digest {
    let material = format!(
        "{timestamp}|{previous_hash}|{journal_hash}|{contract_id}|{function_name}|{artifact_hash}"
    );
    Digest::of_bytes(material.as_bytes())
}

/// Everything an execution contributes to its block.
#[derive(Debug, Clone)]
pub struct BlockDraft {
    pub contract_id: String,
    pub function_name: String,
    pub artifact_hash: String,
    /// Plaintext journal, already in canonical encoding.
    pub journal: Vec<u8>,
}

/// Build the block that extends `tip`.
///
/// The timestamp is `now_ms` unless that would not be strictly after the tip, in which
/// case it is bumped to `tip.timestamp + 1`.
pub fn next_block(
    tip: &Block,
    draft: BlockDraft,
    now_ms: i64,
    signer: &LedgerSigner,
    journal_key: &JournalKey,
) -> Result<Block, LedgerError> {
    let timestamp = now_ms.max(tip.timestamp + 1);
    let journal_hash = journal_hash(&draft.journal);
    let digest = block_fingerprint(
        timestamp,
        &tip.hash,
        &journal_hash,
        &draft.contract_id,
        &draft.function_name,
        &draft.artifact_hash,
    );
    let signature = signer.sign_digest(&digest);
    let journal = encrypt_journal(&draft.journal, journal_key)?;
    Ok(Block {
        block_index: tip.block_index + 1,
        hash: digest.to_hex(),
        timestamp,
        previous_hash: tip.hash.clone(),
        journal_hash,
        signature: signature.to_vec(),
        contract_id: draft.contract_id,
        function_name: draft.function_name,
        artifact_hash: draft.artifact_hash,
        journal,
    })
}
