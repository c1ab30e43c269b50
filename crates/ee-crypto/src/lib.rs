//! SHA-256 fingerprints, ed25519 block signatures and journal encryption used across the gateway.

mod journal;
mod sign;

pub use journal::{JournalKey, NONCE_LEN, decrypt_journal, encrypt_journal};
pub use sign::{LedgerSigner, SIGNATURE_LEN, verify_digest};

pub use ed25519_dalek::{SigningKey, VerifyingKey};

use sha2::{Digest as _, Sha256};
use std::fmt;

/// Prefix for rendered fingerprints (e.g. `0xdeadbeef...`).
pub const DIGEST_PREFIX: &str = "0x";

/// Wrapper around a 32-byte SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Compute the digest of the provided byte slice.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Digest(hasher.finalize().into())
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a `0x...` hex string.
    pub fn to_hex(&self) -> String {
        format!("{DIGEST_PREFIX}{}", hex::encode(self.0))
    }

    /// Parse a digest from its `0x`-prefixed hex string representation.
    pub fn from_hex_str(s: &str) -> Result<Self, DigestParseError> {
        let rest = s
            .strip_prefix(DIGEST_PREFIX)
            .ok_or(DigestParseError::MissingPrefix)?;
        if rest.len() != 64 {
            return Err(DigestParseError::InvalidLength(rest.len()));
        }
        let mut buf = [0u8; 32];
        hex::decode_to_slice(rest, &mut buf).map_err(DigestParseError::InvalidHex)?;
        Ok(Digest(buf))
    }
}

/// Hex fingerprint of arbitrary bytes, `0x`-prefixed.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Digest::of_bytes(bytes).to_hex()
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Digest").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; 32]> for Digest {
    fn from(value: [u8; 32]) -> Self {
        Digest(value)
    }
}

impl AsRef<[u8; 32]> for Digest {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<&str> for Digest {
    type Error = DigestParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Digest::from_hex_str(value)
    }
}

/// Error returned when a `0x` digest string is malformed.
#[derive(Debug, thiserror::Error)]
pub enum DigestParseError {
    #[error("digest string missing '{DIGEST_PREFIX}' prefix")]
    MissingPrefix,
    #[error("digest hex length must be 64, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid digest: {0}")]
    Digest(#[from] DigestParseError),
    #[error("signature must be {SIGNATURE_LEN} bytes, got {0}")]
    SignatureLength(usize),
    #[error("signature does not verify")]
    BadSignature,
    #[error("journal encryption failed")]
    Encrypt,
    #[error("journal ciphertext too short: {0} bytes")]
    CiphertextTooShort(usize),
    #[error("journal decryption failed (wrong key or corrupted ciphertext)")]
    Decrypt,
    #[error("invalid key material: {0}")]
    KeyMaterial(String),
}
