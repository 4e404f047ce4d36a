//! # Shutter Crypto
//!
//! Key management and hybrid encryption for Shutter's artifact store.
//!
//! ## Features
//!
//! - RSA-2048 storage key pair, persisted as PKCS#8 / X.509 DER
//! - Load-or-create keystore, one key pair per storage root
//! - Hybrid artifact cipher: per-artifact AES-128-CBC session key wrapped
//!   with RSA PKCS#1 v1.5
//! - Bounded-memory streaming over tokio `AsyncRead` / `AsyncWrite`
//!
//! ## Key Types
//!
//! - [`StorageKeyPair`]: The asymmetric pair guarding every artifact
//! - [`Keystore`]: Loads or creates the pair under a key directory
//! - [`HybridCipher`]: Encrypts and decrypts artifacts with the pair
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shutter_crypto::{HybridCipher, Keystore};
//!
//! let keys = Arc::new(Keystore::new(&key_dir).load_or_create()?);
//! let cipher = HybridCipher::new(keys);
//!
//! cipher.encrypt_file(&raw_path, &artifact_path).await?;
//! cipher.decrypt_file(&artifact_path, &plain_path).await?;
//! ```

pub mod error;
pub mod hybrid;
pub mod keypair;
pub mod keystore;

// Re-exports
pub use error::{CipherFault, CryptoError, CryptoResult};
pub use hybrid::{
    artifact_len, read_full, HybridCipher, TransferStats, BLOCK_SIZE, HEADER_SIZE, IV_SIZE, SEGMENT_SIZE,
    SESSION_KEY_SIZE,
};
pub use keypair::{StorageKeyPair, KEY_BITS, WRAPPED_KEY_SIZE};
pub use keystore::{Keystore, PRIVATE_KEY_FILENAME, PUBLIC_KEY_FILENAME};
