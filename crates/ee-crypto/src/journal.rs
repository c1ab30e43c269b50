//! Journal encryption at rest.
//!
//! Layout: `[ nonce (12) ][ ciphertext + tag (N + 16) ]`, no associated data.
//! The AEAD key is always a [`JournalKey`]; both directions take the derived key,
//! so derivation happens exactly once, in [`JournalKey::derive`].

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::{CryptoError, Digest, LedgerSigner};

pub const NONCE_LEN: usize = 12;

/// Symmetric key for journal encryption, one-way derived from the ledger keypair.
#[derive(Clone, PartialEq, Eq)]
pub struct JournalKey([u8; 32]);

impl std::fmt::Debug for JournalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JournalKey(..)")
    }
}

impl JournalKey {
    /// SHA-256 over the 64-byte keypair; the signing key itself never reaches the cipher.
    pub fn derive(signer: &LedgerSigner) -> Self {
        JournalKey(*Digest::of_bytes(&signer.to_keypair_bytes()).as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        JournalKey(bytes)
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

pub fn encrypt_journal(plain: &[u8], key: &JournalKey) -> Result<Vec<u8>, CryptoError> {
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = key
        .cipher()
        .encrypt(&nonce, plain)
        .map_err(|_| CryptoError::Encrypt)?;
    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

pub fn decrypt_journal(data: &[u8], key: &JournalKey) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_LEN {
        return Err(CryptoError::CiphertextTooShort(data.len()));
    }
    let (nonce, sealed) = data.split_at(NONCE_LEN);
    key.cipher()
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::Decrypt)
}
