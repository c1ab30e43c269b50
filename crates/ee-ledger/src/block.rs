use serde::{Deserialize, Serialize};

pub const GENESIS_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_JOURNAL_HASH: &str = "0";
pub const GENESIS_SIGNATURE: &[u8] = b"GENESIS_SIGNATURE";
pub const GENESIS_FUNCTION: &str = "genesis";

/// One ledger entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// 1-based position in the contract's chain; genesis is 1.
    pub block_index: u64,
    pub hash: String,
    /// Unix milliseconds, strictly increasing along the chain.
    pub timestamp: i64,
    pub previous_hash: String,
    pub journal_hash: String,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    pub contract_id: String,
    pub function_name: String,
    pub artifact_hash: String,
    /// Encrypted journal (`nonce || ciphertext`).
    #[serde(with = "hex::serde")]
    pub journal: Vec<u8>,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.block_index == 1
            && self.hash == GENESIS_HASH
            && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

/// Sentinel first entry for a contract with no history.
pub fn genesis(contract_id: &str, timestamp: i64) -> Block {
    Block {
        block_index: 1,
        hash: GENESIS_HASH.to_string(),
        timestamp,
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
        journal_hash: GENESIS_JOURNAL_HASH.to_string(),
        signature: GENESIS_SIGNATURE.to_vec(),
        contract_id: contract_id.to_string(),
        function_name: GENESIS_FUNCTION.to_string(),
        artifact_hash: String::new(),
        journal: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_shape() {
        let g = genesis("0xc1", 1_000);
        assert!(g.is_genesis());
        assert_eq!(g.contract_id, "0xc1");
        assert_eq!(g.signature, b"GENESIS_SIGNATURE");
        assert!(g.journal.is_empty());
    }

    #[test]
    fn bytes_render_as_hex() {
        let g = genesis("0xc1", 1_000);
        let value = serde_json::to_value(&g).unwrap();
        assert_eq!(value["signature"], hex::encode(GENESIS_SIGNATURE));
        let back: Block = serde_json::from_value(value).unwrap();
        assert_eq!(back, g);
    }
}
