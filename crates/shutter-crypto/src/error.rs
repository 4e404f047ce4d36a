//! Error types for shutter-crypto

use thiserror::Error;

/// Reason a cipher operation was rejected
///
/// Every variant surfaces to callers as [`CryptoError::EncryptionFailure`];
/// the reason is kept for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherFault {
    #[error("session key wrap failed: {0}")]
    WrapFailed(String),

    #[error("session key unwrap failed (wrong key pair or corrupted artifact)")]
    UnwrapFailed,

    #[error("unwrapped session key has invalid length {0}")]
    InvalidSessionKey(usize),

    #[error("artifact header truncated: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },

    #[error("illegal block size: ciphertext length {0} is not a positive multiple of 16")]
    IllegalBlockSize(u64),

    #[error("bad padding in final block")]
    BadPadding,
}

/// Errors that can occur during key management and cipher operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The storage key pair could not be loaded, generated, or persisted.
    /// Fatal at startup.
    #[error("Key material unavailable: {0}")]
    KeyMaterialUnavailable(String),

    #[error("Encryption failure: {0}")]
    EncryptionFailure(#[from] CipherFault),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        CryptoError::Io(err.to_string())
    }
}

impl CryptoError {
    /// Create a new KeyMaterialUnavailable error
    pub fn key_material(message: impl Into<String>) -> Self {
        Self::KeyMaterialUnavailable(message.into())
    }

    /// The cipher fault behind an encryption failure, if any
    pub fn fault(&self) -> Option<&CipherFault> {
        match self {
            CryptoError::EncryptionFailure(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;
