//! Keystore for storage key persistence
//!
//! Handles loading and saving the storage root's RSA key pair,
//! ensuring every artifact stays readable across restarts.
//!
//! Stores:
//! - Private key (PKCS#8 DER)
//! - Public key (X.509 SubjectPublicKeyInfo DER)

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CryptoError, CryptoResult};
use crate::keypair::StorageKeyPair;

/// Filename for the private key (PKCS#8 DER)
pub const PRIVATE_KEY_FILENAME: &str = "storage_key.pk8";

/// Filename for the public key (X.509 DER)
pub const PUBLIC_KEY_FILENAME: &str = "storage_key.x509";

/// Keystore for the storage key pair
///
/// Creates the pair once per root and reads it back on every later start.
/// Keys are never rotated automatically; an operator deleting both files
/// is the only way to get a new pair (and orphans existing artifacts).
pub struct Keystore {
    /// Path to the keystore directory
    path: PathBuf,
}

impl Keystore {
    /// Create a new keystore rooted at the given directory
    pub fn new(key_dir: &Path) -> Self {
        Self {
            path: key_dir.to_path_buf(),
        }
    }

    /// Directory holding the key files
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn private_key_path(&self) -> PathBuf {
        self.path.join(PRIVATE_KEY_FILENAME)
    }

    fn public_key_path(&self) -> PathBuf {
        self.path.join(PUBLIC_KEY_FILENAME)
    }

    /// Load the existing key pair or generate and persist a new one
    ///
    /// If either file is missing a fresh pair is generated and both files
    /// are (re)written.
    pub fn load_or_create(&self) -> CryptoResult<StorageKeyPair> {
        if self.exists() {
            self.load()
        } else {
            info!(path = %self.path.display(), "No existing storage key found, generating new key pair");
            let pair = StorageKeyPair::generate()?;
            self.save(&pair)?;
            Ok(pair)
        }
    }

    /// Load the key pair from disk
    pub fn load(&self) -> CryptoResult<StorageKeyPair> {
        let private_der = zeroize::Zeroizing::new(std::fs::read(self.private_key_path()).map_err(
            |e| CryptoError::key_material(format!("Failed to read private key file: {}", e)),
        )?);

        let public_der = std::fs::read(self.public_key_path())
            .map_err(|e| CryptoError::key_material(format!("Failed to read public key file: {}", e)))?;

        let pair = StorageKeyPair::from_der(&private_der, &public_der)?;

        debug!(
            fingerprint = %pair.public_fingerprint(),
            "Loaded storage key pair from keystore"
        );

        Ok(pair)
    }

    /// Save the key pair to disk
    pub fn save(&self, pair: &StorageKeyPair) -> CryptoResult<()> {
        std::fs::create_dir_all(&self.path)
            .map_err(|e| CryptoError::key_material(format!("Failed to create keystore dir: {}", e)))?;

        let (private_der, public_der) = pair.to_der()?;

        let private_path = self.private_key_path();
        std::fs::write(&private_path, private_der.as_slice())
            .map_err(|e| CryptoError::key_material(format!("Failed to write private key file: {}", e)))?;
        Self::set_restrictive_permissions(&private_path)?;

        std::fs::write(self.public_key_path(), &public_der)
            .map_err(|e| CryptoError::key_material(format!("Failed to write public key file: {}", e)))?;

        info!(
            fingerprint = %pair.public_fingerprint(),
            path = %self.path.display(),
            "Saved storage key pair to keystore"
        );

        Ok(())
    }

    /// Check if both key files exist
    pub fn exists(&self) -> bool {
        self.private_key_path().exists() && self.public_key_path().exists()
    }

    /// Delete both key files (every existing artifact becomes unreadable!)
    pub fn delete(&self) -> CryptoResult<()> {
        for path in [self.private_key_path(), self.public_key_path()] {
            if path.exists() {
                std::fs::remove_file(&path)
                    .map_err(|e| CryptoError::key_material(format!("Failed to delete key file: {}", e)))?;
            }
        }
        Ok(())
    }

    /// Set restrictive permissions on a key file (Unix only)
    #[cfg(unix)]
    fn set_restrictive_permissions(path: &Path) -> CryptoResult<()> {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .map_err(|e| CryptoError::key_material(format!("Failed to set key permissions: {}", e)))
    }

    #[cfg(not(unix))]
    fn set_restrictive_permissions(_path: &Path) -> CryptoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let keystore = Keystore::new(temp_dir.path());

        assert!(!keystore.exists());

        let pair1 = keystore.load_or_create().unwrap();
        assert!(keystore.exists());

        let pair2 = keystore.load_or_create().unwrap();
        assert_eq!(pair1.public_fingerprint(), pair2.public_fingerprint());

        let pair3 = keystore.load().unwrap();
        assert_eq!(pair1.public_fingerprint(), pair3.public_fingerprint());
    }

    #[test]
    fn test_load_or_create_is_bit_identical() {
        let temp_dir = TempDir::new().unwrap();
        let keystore = Keystore::new(temp_dir.path());

        let (private1, public1) = keystore.load_or_create().unwrap().to_der().unwrap();
        let (private2, public2) = keystore.load_or_create().unwrap().to_der().unwrap();

        assert_eq!(*private1, *private2);
        assert_eq!(public1, public2);
        assert_eq!(
            std::fs::read(temp_dir.path().join(PUBLIC_KEY_FILENAME)).unwrap(),
            public1
        );
    }

    #[test]
    fn test_missing_half_regenerates() {
        let temp_dir = TempDir::new().unwrap();
        let keystore = Keystore::new(temp_dir.path());

        let original = keystore.load_or_create().unwrap();
        std::fs::remove_file(temp_dir.path().join(PUBLIC_KEY_FILENAME)).unwrap();
        assert!(!keystore.exists());

        let regenerated = keystore.load_or_create().unwrap();
        assert!(keystore.exists());
        assert_ne!(original.public_fingerprint(), regenerated.public_fingerprint());
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("keys");
        let keystore = Keystore::new(&nested);

        keystore.load_or_create().unwrap();
        assert!(nested.join(PRIVATE_KEY_FILENAME).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let keystore = Keystore::new(temp_dir.path());
        keystore.load_or_create().unwrap();

        let mode = std::fs::metadata(temp_dir.path().join(PRIVATE_KEY_FILENAME))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_invalid_key_files() {
        let temp_dir = TempDir::new().unwrap();
        let keystore = Keystore::new(temp_dir.path());

        std::fs::write(temp_dir.path().join(PRIVATE_KEY_FILENAME), b"too short").unwrap();
        std::fs::write(temp_dir.path().join(PUBLIC_KEY_FILENAME), b"too short").unwrap();

        let result = keystore.load_or_create();
        assert!(matches!(result, Err(CryptoError::KeyMaterialUnavailable(_))));
    }

    #[test]
    fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let keystore = Keystore::new(temp_dir.path());

        keystore.load_or_create().unwrap();
        assert!(keystore.exists());

        keystore.delete().unwrap();
        assert!(!keystore.exists());

        // Deleting again is a no-op
        keystore.delete().unwrap();
    }
}
