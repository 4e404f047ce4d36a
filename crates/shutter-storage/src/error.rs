//! Error types for shutter-storage
//!
//! This module defines the error types used throughout the storage crate.

use shutter_crypto::CryptoError;
use thiserror::Error;

use crate::object_id::ObjectId;

/// Coarse classification of a storage failure
///
/// Callers mapping failures to responses (HTTP status, exit code) match on
/// this instead of the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    KeyMaterialUnavailable,
    EncryptionFailure,
    ArtifactNotFound,
    Io,
    Config,
}

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage key pair could not be generated, loaded, or persisted
    #[error("Key material unavailable: {0}")]
    KeyMaterialUnavailable(String),

    /// Artifact could not be sealed or opened
    #[error("Encryption failure: {0}")]
    EncryptionFailure(String),

    /// No encrypted artifact exists for the identifier
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(ObjectId),

    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid store configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// String is not a valid object identifier
    #[error("Invalid object id: {0}")]
    InvalidObjectId(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<CryptoError> for StorageError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyMaterialUnavailable(msg) => StorageError::KeyMaterialUnavailable(msg),
            CryptoError::EncryptionFailure(fault) => StorageError::EncryptionFailure(fault.to_string()),
            CryptoError::Io(msg) => StorageError::Io(msg),
        }
    }
}

impl StorageError {
    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::KeyMaterialUnavailable(_) => ErrorKind::KeyMaterialUnavailable,
            StorageError::EncryptionFailure(_) => ErrorKind::EncryptionFailure,
            StorageError::ArtifactNotFound(_) => ErrorKind::ArtifactNotFound,
            StorageError::Io(_) => ErrorKind::Io,
            StorageError::Config(_) | StorageError::InvalidObjectId(_) => ErrorKind::Config,
        }
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::ArtifactNotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
