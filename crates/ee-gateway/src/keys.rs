//! Ledger keypair on disk: the raw 64-byte ed25519 keypair (secret ‖ public), created
//! on first start with owner-only permissions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ee_crypto::{CryptoError, LedgerSigner};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("key file {path}: {source}")]
    Material {
        path: PathBuf,
        #[source]
        source: CryptoError,
    },
}

/// Load the ledger keypair from `path`, generating and writing a new one if the file
/// does not exist yet.
pub fn load_or_create(path: &Path) -> Result<LedgerSigner, KeyFileError> {
    let io_err = |source| KeyFileError::Io {
        path: path.to_path_buf(),
        source,
    };
    match fs::read(path) {
        Ok(bytes) => {
            let signer =
                LedgerSigner::from_keypair_bytes(&bytes).map_err(|source| KeyFileError::Material {
                    path: path.to_path_buf(),
                    source,
                })?;
            tracing::info!(path = %path.display(), "loaded ledger keypair");
            Ok(signer)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).map_err(io_err)?;
            }
            let signer = LedgerSigner::generate();
            write_private(path, &signer.to_keypair_bytes()).map_err(io_err)?;
            tracing::info!(path = %path.display(), "generated ledger keypair");
            Ok(signer)
        }
        Err(e) => Err(io_err(e)),
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ee_crypto::Digest;

    #[test]
    fn creates_once_then_reloads_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("ledger.key");

        let first = load_or_create(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), 64);
        let second = load_or_create(&path).unwrap();
        assert_eq!(first.verifying_key(), second.verifying_key());

        let digest = Digest::of_bytes(b"block");
        assert_eq!(first.sign_digest(&digest), second.sign_digest(&digest));
    }

    #[cfg(unix)]
    #[test]
    fn new_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.key");
        load_or_create(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.key");
        fs::write(&path, b"short").unwrap();
        assert!(matches!(
            load_or_create(&path),
            Err(KeyFileError::Material { .. })
        ));
    }
}
