//! Per-contract, append-only, signed execution ledger.
//!
//! Every contract owns one chain. The first entry is a synthesized genesis block
//! (index 1); each execution appends a block that commits to its predecessor's hash,
//! a fingerprint of the plaintext journal, and the call that produced it. Journals are
//! stored encrypted; the hash chain and signatures are computed over plaintext digests.

mod block;
mod chain;
mod verify;

pub use block::{
    Block, GENESIS_FUNCTION, GENESIS_HASH, GENESIS_JOURNAL_HASH, GENESIS_PREVIOUS_HASH,
    GENESIS_SIGNATURE, genesis,
};
pub use chain::{BlockDraft, LedgerError, block_fingerprint, journal_bytes, journal_hash, next_block};
pub use verify::{VerifyError, verify_block, verify_chain};
