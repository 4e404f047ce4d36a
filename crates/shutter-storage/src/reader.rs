//! Retrieval path
//!
//! An artifact is decrypted into a cache file private to one retrieval,
//! which is then streamed back in fixed-size chunks. The stream is a pull producer: the
//! next read is issued only when the consumer asks for the next chunk, and
//! at most one read is in flight.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio::fs::{self, File};
use tracing::{debug, instrument, warn};

use shutter_crypto::{read_full, HybridCipher};

use crate::error::{StorageError, StorageResult};
use crate::locks::ObjectLocks;
use crate::object_id::ObjectId;
use crate::paths::PathResolver;
use crate::scratch::ScratchFile;

/// Produces chunk streams over stored artifacts
#[derive(Debug, Clone)]
pub struct ChunkedReader {
    resolver: PathResolver,
    cipher: HybridCipher,
    locks: ObjectLocks,
    chunk_size: usize,
}

impl ChunkedReader {
    pub fn new(
        resolver: PathResolver,
        cipher: HybridCipher,
        locks: ObjectLocks,
        chunk_size: usize,
    ) -> Self {
        Self {
            resolver,
            cipher,
            locks,
            chunk_size,
        }
    }

    /// Maximum size of one chunk
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Decrypt the artifact for `id` and return a stream over its plaintext
    ///
    /// The identifier is locked only while the artifact is decrypted. The
    /// returned stream reads its own cache file, so it keeps serving the
    /// plaintext it opened even if the object is re-ingested or deleted
    /// meanwhile, and never blocks other work on the same identifier.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn open_stream(&self, id: ObjectId) -> StorageResult<ChunkStream> {
        let paths = self.resolver.resolve_scratch(&id);
        let cache = ScratchFile::new(&paths.decrypted);

        let (stats, file) = {
            let _lock = self.locks.acquire(id).await;

            if !fs::try_exists(&paths.encrypted).await? {
                return Err(StorageError::ArtifactNotFound(id));
            }

            let stats = self.cipher.decrypt_file(&paths.encrypted, cache.path()).await?;
            (stats, File::open(cache.path()).await?)
        };

        debug!(plaintext_len = stats.output_len, "Opened chunk stream");
        Ok(ChunkStream::new(id, stats.output_len, file, cache, self.chunk_size))
    }

    /// Collect the whole plaintext of `id` into memory
    pub async fn read_all(&self, id: ObjectId) -> StorageResult<Bytes> {
        let mut stream = self.open_stream(id).await?;
        let mut out = BytesMut::with_capacity(stream.len() as usize);

        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }

        Ok(out.freeze())
    }
}

/// Finite, single-pass stream of plaintext chunks
///
/// Every chunk but the last is exactly the configured chunk size. Dropping
/// the stream, at any point, closes the cache file and deletes it.
pub struct ChunkStream {
    id: ObjectId,
    len: u64,
    inner: Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>,
}

impl ChunkStream {
    fn new(
        id: ObjectId,
        len: u64,
        file: File,
        cache: ScratchFile,
        chunk_size: usize,
    ) -> Self {
        let inner = Box::pin(async_stream::try_stream! {
            // Declared first so it drops last: the file closes before the cache is unlinked
            let _cache = cache;
            let mut file = file;
            let mut buf = vec![0u8; chunk_size];
            let mut offset = 0u64;

            loop {
                let filled = read_full(&mut file, &mut buf)
                    .await
                    .inspect_err(|e| warn!(id = %id, offset, error = %e, "Chunk read failed"))
                    .map_err(StorageError::from)?;
                if filled == 0 {
                    break;
                }
                offset += filled as u64;
                yield Bytes::copy_from_slice(&buf[..filled]);
            }

            debug!(id = %id, bytes = offset, "Chunk stream exhausted");
        });

        Self { id, len, inner }
    }

    /// Identifier of the object being streamed
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Total plaintext length the stream will yield
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Stream for ChunkStream {
    type Item = StorageResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("id", &self.id)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
