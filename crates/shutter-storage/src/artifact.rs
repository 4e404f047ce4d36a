//! Artifact reference type

use serde::{Deserialize, Serialize};

use crate::object_id::ObjectId;

/// Reference to a committed encrypted artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Identifier of the stored object
    pub object_id: ObjectId,
    /// Size of the encrypted artifact on disk in bytes
    pub artifact_len: u64,
    /// Size of the plaintext in bytes, when known
    ///
    /// Known right after ingest. Recovering it later requires decrypting
    /// the artifact, so a plain stat leaves it empty.
    pub plaintext_len: Option<u64>,
}

impl ArtifactRef {
    /// Bytes the artifact spends beyond the plaintext (header and padding)
    pub fn overhead(&self) -> Option<u64> {
        self.plaintext_len
            .map(|plain| self.artifact_len.saturating_sub(plain))
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.plaintext_len {
            Some(plain) => write!(
                f,
                "Artifact({}, {} bytes, {} plaintext)",
                self.object_id.short(),
                self.artifact_len,
                plain
            ),
            None => write!(f, "Artifact({}, {} bytes)", self.object_id.short(), self.artifact_len),
        }
    }
}
