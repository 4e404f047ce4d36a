//! Ingest path
//!
//! An upload is first persisted as a raw scratch file, then sealed into a
//! staging artifact, synced, and renamed over the committed path. Both
//! scratch files carry a per-ingest tag. A reader
//! therefore sees either the previous artifact or the complete new one,
//! never a partial write.

use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, instrument};

use shutter_crypto::HybridCipher;

use crate::artifact::ArtifactRef;
use crate::error::StorageResult;
use crate::locks::ObjectLocks;
use crate::object_id::ObjectId;
use crate::paths::PathResolver;
use crate::scratch::ScratchFile;

/// Turns uploaded plaintext into committed encrypted artifacts
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    resolver: PathResolver,
    cipher: HybridCipher,
    locks: ObjectLocks,
}

impl ArtifactWriter {
    pub fn new(resolver: PathResolver, cipher: HybridCipher, locks: ObjectLocks) -> Self {
        Self {
            resolver,
            cipher,
            locks,
        }
    }

    /// Persist everything `source` yields as the artifact for `id`
    ///
    /// Replaces any artifact already stored under `id`. On failure the
    /// previous artifact, if any, is left untouched and no scratch files
    /// remain.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn ingest<R>(&self, id: ObjectId, mut source: R) -> StorageResult<ArtifactRef>
    where
        R: AsyncRead + Unpin + Send,
    {
        let _lock = self.locks.acquire(id).await;
        let paths = self.resolver.resolve_scratch(&id);

        let raw = ScratchFile::new(&paths.raw);
        let staging = ScratchFile::new(&paths.staging);

        let mut raw_file = File::create(raw.path()).await?;
        let received = tokio::io::copy(&mut source, &mut raw_file).await?;
        raw_file.flush().await?;
        drop(raw_file);

        let stats = self.cipher.encrypt_file(raw.path(), staging.path()).await?;

        fs::rename(staging.path(), &paths.encrypted).await?;
        staging.disarm();

        let artifact_len = fs::metadata(&paths.encrypted).await?.len();
        debug!(
            plaintext_len = received,
            artifact_len,
            "Committed artifact"
        );

        Ok(ArtifactRef {
            object_id: id,
            artifact_len,
            plaintext_len: Some(stats.input_len),
        })
    }

    /// Persist an in-memory buffer as the artifact for `id`
    pub async fn ingest_bytes(&self, id: ObjectId, data: &[u8]) -> StorageResult<ArtifactRef> {
        self.ingest(id, data).await
    }
}
