//! Artifact store
//!
//! Ties the key pair, path resolution, ingest and retrieval together behind
//! one cloneable handle.

use std::io::ErrorKind;
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncRead;
use tracing::{debug, info, instrument};

use shutter_crypto::{HybridCipher, Keystore, StorageKeyPair};

use crate::artifact::ArtifactRef;
use crate::config::StoreConfig;
use crate::error::{StorageError, StorageResult};
use crate::lease::RootLease;
use crate::locks::ObjectLocks;
use crate::object_id::ObjectId;
use crate::paths::{PathResolver, ENCRYPTED_SUFFIX};
use crate::reader::{ChunkStream, ChunkedReader};
use crate::writer::ArtifactWriter;

/// Encrypted object store rooted at one directory
///
/// Cheap to clone; clones share the key pair, the per-object locks and the
/// lease on the objects directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    config: Arc<StoreConfig>,
    lease: Arc<RootLease>,
    keys: Arc<StorageKeyPair>,
    resolver: PathResolver,
    locks: ObjectLocks,
    writer: ArtifactWriter,
    reader: ChunkedReader,
}

impl ArtifactStore {
    /// Open the store, loading or creating its key pair
    ///
    /// Fails with `KeyMaterialUnavailable` if the key pair can't be loaded
    /// or created; the store must not be used in that case.
    pub async fn open(config: StoreConfig) -> StorageResult<Self> {
        config.validate()?;

        let keystore = Keystore::new(&config.keys_path());
        // RSA generation takes long enough to stall a runtime worker
        let keys = tokio::task::spawn_blocking(move || keystore.load_or_create())
            .await
            .map_err(|e| StorageError::KeyMaterialUnavailable(format!("Key task failed: {}", e)))??;

        Self::with_keys(config, Arc::new(keys)).await
    }

    /// Open the store with an explicitly supplied key pair
    pub async fn with_keys(config: StoreConfig, keys: Arc<StorageKeyPair>) -> StorageResult<Self> {
        config.validate()?;

        let objects_dir = config.objects_path();
        fs::create_dir_all(&objects_dir).await?;

        let (lease, _) = RootLease::acquire(&objects_dir, config.sweep_scratch_on_open).await?;

        let resolver = PathResolver::new(objects_dir);
        let locks = ObjectLocks::new();
        let cipher = HybridCipher::new(keys.clone());
        let writer = ArtifactWriter::new(resolver.clone(), cipher.clone(), locks.clone());
        let reader = ChunkedReader::new(resolver.clone(), cipher, locks.clone(), config.chunk_size);

        info!(
            objects = %resolver.dir().display(),
            fingerprint = %keys.public_fingerprint(),
            "Artifact store opened"
        );

        Ok(Self {
            config: Arc::new(config),
            lease: Arc::new(lease),
            keys,
            resolver,
            locks,
            writer,
            reader,
        })
    }

    /// Configuration the store was opened with
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The storage key pair
    pub fn keys(&self) -> &Arc<StorageKeyPair> {
        &self.keys
    }

    /// Lease held on the objects directory for the life of the store
    pub fn lease(&self) -> &RootLease {
        &self.lease
    }

    /// Store everything `source` yields under `id`, replacing any previous artifact
    pub async fn ingest<R>(&self, id: ObjectId, source: R) -> StorageResult<ArtifactRef>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.writer.ingest(id, source).await
    }

    /// Store an in-memory buffer under `id`
    pub async fn ingest_bytes(&self, id: ObjectId, data: &[u8]) -> StorageResult<ArtifactRef> {
        self.writer.ingest_bytes(id, data).await
    }

    /// Stream the plaintext of `id` in chunks
    pub async fn open_stream(&self, id: ObjectId) -> StorageResult<ChunkStream> {
        self.reader.open_stream(id).await
    }

    /// Read the whole plaintext of `id` into memory
    pub async fn read_all(&self, id: ObjectId) -> StorageResult<Bytes> {
        self.reader.read_all(id).await
    }

    /// Check if an artifact is stored under `id`
    pub async fn exists(&self, id: &ObjectId) -> StorageResult<bool> {
        Ok(fs::try_exists(self.resolver.resolve(id).encrypted).await?)
    }

    /// Size of the artifact stored under `id`
    pub async fn stat(&self, id: &ObjectId) -> StorageResult<ArtifactRef> {
        let metadata = fs::metadata(self.resolver.resolve(id).encrypted)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    StorageError::ArtifactNotFound(*id)
                } else {
                    StorageError::from(e)
                }
            })?;

        Ok(ArtifactRef {
            object_id: *id,
            artifact_len: metadata.len(),
            plaintext_len: None,
        })
    }

    /// Delete the artifact stored under `id`
    ///
    /// Waits for an ingest or stream setup already running on the same
    /// object. Streams opened earlier keep serving their plaintext. Returns
    /// `false` if nothing was stored.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn delete(&self, id: &ObjectId) -> StorageResult<bool> {
        let _lock = self.locks.acquire(*id).await;

        match fs::remove_file(self.resolver.resolve(id).encrypted).await {
            Ok(()) => {
                debug!("Deleted artifact");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List identifiers of all committed artifacts, sorted
    pub async fn list(&self) -> StorageResult<Vec<ObjectId>> {
        let mut entries = fs::read_dir(self.resolver.dir()).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str()
                && let Some((id, ENCRYPTED_SUFFIX)) = PathResolver::parse_file_name(name)
            {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }
}
