use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::{CryptoError, Digest};

pub const SIGNATURE_LEN: usize = 64;

/// Ledger signing identity. Signs the raw 32-byte block digest, never its hex rendering.
#[derive(Clone)]
pub struct LedgerSigner {
    key: SigningKey,
}

impl std::fmt::Debug for LedgerSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerSigner")
            .field("public", &hex::encode(self.key.verifying_key().as_bytes()))
            .finish()
    }
}

impl LedgerSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut OsRng))
    }

    /// Load from the 64-byte `seed || public` keypair layout.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: &[u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::KeyMaterial(format!("keypair must be 64 bytes, got {}", bytes.len()))
        })?;
        let key = SigningKey::from_keypair_bytes(arr)
            .map_err(|e| CryptoError::KeyMaterial(e.to_string()))?;
        Ok(Self::new(key))
    }

    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.key.to_keypair_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn sign_digest(&self, digest: &Digest) -> [u8; SIGNATURE_LEN] {
        self.key.sign(digest.as_bytes()).to_bytes()
    }
}

/// Check a detached signature over `digest`.
pub fn verify_digest(
    public: &VerifyingKey,
    digest: &Digest,
    signature: &[u8],
) -> Result<(), CryptoError> {
    let sig = Signature::from_slice(signature)
        .map_err(|_| CryptoError::SignatureLength(signature.len()))?;
    public
        .verify(digest.as_bytes(), &sig)
        .map_err(|_| CryptoError::BadSignature)
}
