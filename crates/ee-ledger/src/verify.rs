use ee_crypto::{CryptoError, JournalKey, VerifyingKey, decrypt_journal, verify_digest};
use thiserror::Error;

use crate::block::Block;
use crate::chain::{block_fingerprint, journal_hash};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("previous hash mismatch: expected {expected}, got {actual}")]
    PreviousHash { expected: String, actual: String },
    #[error("timestamp {candidate} is not after predecessor timestamp {previous}")]
    Timestamp { previous: i64, candidate: i64 },
    #[error("block index {actual} does not follow {previous}")]
    BlockIndex { previous: u64, actual: u64 },
    #[error("block belongs to contract {actual}, chain is {expected}")]
    Contract { expected: String, actual: String },
    #[error("journal hash mismatch: block records {expected}, journal hashes to {actual}")]
    JournalHash { expected: String, actual: String },
    #[error("block hash mismatch: block records {expected}, fields hash to {actual}")]
    BlockHash { expected: String, actual: String },
    #[error("bad block signature: {0}")]
    Signature(#[source] CryptoError),
    #[error("block {index}: journal cannot be decrypted: {source}")]
    Journal {
        index: u64,
        #[source]
        source: CryptoError,
    },
    #[error("chain does not start with a genesis block")]
    MissingGenesis,
}

/// Check `candidate` as the successor of `prev`. Pure; `journal` is the plaintext journal.
pub fn verify_block(
    prev: &Block,
    candidate: &Block,
    journal: &[u8],
    public: &VerifyingKey,
) -> Result<(), VerifyError> {
    if candidate.previous_hash != prev.hash {
        return Err(VerifyError::PreviousHash {
            expected: prev.hash.clone(),
            actual: candidate.previous_hash.clone(),
        });
    }
    if candidate.timestamp <= prev.timestamp {
        return Err(VerifyError::Timestamp {
            previous: prev.timestamp,
            candidate: candidate.timestamp,
        });
    }
    if candidate.block_index != prev.block_index + 1 {
        return Err(VerifyError::BlockIndex {
            previous: prev.block_index,
            actual: candidate.block_index,
        });
    }
    if candidate.contract_id != prev.contract_id {
        return Err(VerifyError::Contract {
            expected: prev.contract_id.clone(),
            actual: candidate.contract_id.clone(),
        });
    }

    let recomputed = journal_hash(journal);
    if recomputed != candidate.journal_hash {
        return Err(VerifyError::JournalHash {
            expected: candidate.journal_hash.clone(),
            actual: recomputed,
        });
    }

    let digest = block_fingerprint(
        candidate.timestamp,
        &candidate.previous_hash,
        &candidate.journal_hash,
        &candidate.contract_id,
        &candidate.function_name,
        &candidate.artifact_hash,
    );
    if digest.to_hex() != candidate.hash {
        return Err(VerifyError::BlockHash {
            expected: candidate.hash.clone(),
            actual: digest.to_hex(),
        });
    }

    verify_digest(public, &digest, &candidate.signature).map_err(VerifyError::Signature)
}

/// Re-validate a persisted chain from its genesis block. Returns the number of
/// execution blocks checked.
pub fn verify_chain(
    blocks: &[Block],
    journal_key: &JournalKey,
    public: &VerifyingKey,
) -> Result<usize, VerifyError> {
    let Some((first, rest)) = blocks.split_first() else {
        return Err(VerifyError::MissingGenesis);
    };
    if !first.is_genesis() {
        return Err(VerifyError::MissingGenesis);
    }
    let mut prev = first;
    for block in rest {
        let journal = decrypt_journal(&block.journal, journal_key).map_err(|source| {
            VerifyError::Journal {
                index: block.block_index,
                source,
            }
        })?;
        verify_block(prev, block, &journal, public)?;
        prev = block;
    }
    Ok(rest.len())
}
