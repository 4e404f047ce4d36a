//! RSA-2048 storage key pair
//!
//! One pair exists per storage root. The private half is encoded as
//! PKCS#8 DER and the public half as X.509 SubjectPublicKeyInfo DER, which
//! are the two on-disk encodings the [`Keystore`](crate::Keystore) persists.
//!
//! ## Key Sizes
//!
//! - Modulus: 2048 bits
//! - Wrapped session key (PKCS#1 v1.5): 256 bytes

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CipherFault, CryptoError, CryptoResult};

/// Modulus size of the storage key pair in bits
pub const KEY_BITS: usize = 2048;

/// Size of an RSA-wrapped session key in bytes (modulus size)
pub const WRAPPED_KEY_SIZE: usize = KEY_BITS / 8;

/// Asymmetric key pair protecting every artifact under one storage root
///
/// Loaded once at startup and shared read-only (behind an `Arc`) by every
/// cipher operation. The private key is zeroized on drop.
#[derive(Clone)]
pub struct StorageKeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl StorageKeyPair {
    /// Generate a new random 2048-bit key pair
    ///
    /// This is CPU-heavy (hundreds of milliseconds); async callers should
    /// run it on a blocking thread.
    pub fn generate() -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, KEY_BITS)
            .map_err(|e| CryptoError::key_material(format!("RSA key generation failed: {}", e)))?;
        let public_key = private_key.to_public_key();

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Create from PKCS#8 private key DER and X.509 public key DER
    ///
    /// Fails if either encoding is invalid, if the modulus is not 2048 bits,
    /// or if the two halves do not belong together.
    pub fn from_der(private_der: &[u8], public_der: &[u8]) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_der(private_der)
            .map_err(|e| CryptoError::key_material(format!("Invalid PKCS#8 private key: {}", e)))?;

        let public_key = RsaPublicKey::from_public_key_der(public_der)
            .map_err(|e| CryptoError::key_material(format!("Invalid X.509 public key: {}", e)))?;

        if public_key.size() != WRAPPED_KEY_SIZE {
            return Err(CryptoError::key_material(format!(
                "Invalid modulus size: expected {} bits, got {}",
                KEY_BITS,
                public_key.size() * 8
            )));
        }

        if private_key.to_public_key() != public_key {
            return Err(CryptoError::key_material(
                "Public key does not match private key",
            ));
        }

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Export both halves for storage
    ///
    /// Returns (private_key_pkcs8_der, public_key_x509_der).
    /// The private encoding zeroizes on drop.
    pub fn to_der(&self) -> CryptoResult<(Zeroizing<Vec<u8>>, Vec<u8>)> {
        let private_doc = self
            .private_key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::key_material(format!("PKCS#8 encoding failed: {}", e)))?;

        let public_doc = self
            .public_key
            .to_public_key_der()
            .map_err(|e| CryptoError::key_material(format!("X.509 encoding failed: {}", e)))?;

        Ok((
            Zeroizing::new(private_doc.as_bytes().to_vec()),
            public_doc.as_bytes().to_vec(),
        ))
    }

    /// Short hex fingerprint of the public key (first 8 bytes of SHA-256)
    pub fn public_fingerprint(&self) -> String {
        match self.public_key.to_public_key_der() {
            Ok(doc) => hex::encode(&Sha256::digest(doc.as_bytes())[..8]),
            Err(_) => "unencodable".to_string(),
        }
    }

    /// Wrap a session key with the public key (PKCS#1 v1.5)
    pub(crate) fn wrap_session_key(&self, session_key: &[u8]) -> CryptoResult<Vec<u8>> {
        self.public_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, session_key)
            .map_err(|e| CipherFault::WrapFailed(e.to_string()).into())
    }

    /// Recover a session key with the private key
    pub(crate) fn unwrap_session_key(&self, wrapped: &[u8]) -> CryptoResult<Zeroizing<Vec<u8>>> {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, wrapped)
            .map(Zeroizing::new)
            .map_err(|_| CipherFault::UnwrapFailed.into())
    }
}

impl std::fmt::Debug for StorageKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageKeyPair")
            .field("fingerprint", &self.public_fingerprint())
            .finish_non_exhaustive()
    }
}
