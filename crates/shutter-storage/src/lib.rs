//! # Shutter Storage
//!
//! Encrypted object storage and chunked streaming retrieval.
//!
//! Uploaded plaintext is sealed into an artifact on disk with a per-object
//! session key (see `shutter-crypto`), and later decrypted and streamed back
//! to the consumer in fixed-size chunks under pull-based backpressure.
//!
//! ## Features
//!
//! - **ArtifactStore**: Cloneable facade over ingest, retrieval and maintenance
//! - **ArtifactWriter**: Raw upload, seal, fsync, atomic commit
//! - **ChunkedReader**: Decrypt to a scoped cache file, stream `Bytes` chunks
//! - **PathResolver**: Deterministic identifier to file name mapping
//! - **ObjectLocks**: Serializes work on one identifier, never across identifiers
//! - **RootLease**: Shared lock on the objects directory; crash leftovers are
//!   swept only when no other handle holds one
//!
//! ## Filesystem Layout
//!
//! ```text
//! <root>/keys/storage_key.pk8      private key (PKCS#8 DER)
//! <root>/keys/storage_key.x509     public key (X.509 DER)
//! <root>/objects/.shutter.lock            lease held by every open store
//! <root>/objects/<uuid>.enc                committed artifact
//! <root>/objects/<uuid>.<tag>.raw          raw upload (only during ingest)
//! <root>/objects/<uuid>.<tag>.enc.part     staging artifact (only during ingest)
//! <root>/objects/<uuid>.<tag>.dec          decrypted cache (only while streaming)
//! ```
//!
//! `<tag>` is random per ingest or retrieval, so concurrent operations never
//! share a scratch file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use shutter_storage::{ArtifactStore, ObjectId, StoreConfig};
//!
//! let store = ArtifactStore::open(StoreConfig::with_root("/var/lib/shutter")).await?;
//!
//! let id = ObjectId::new_v4();
//! store.ingest(id, upload_body).await?;
//!
//! let mut chunks = store.open_stream(id).await?;
//! while let Some(chunk) = chunks.next().await {
//!     response.send(chunk?).await?;
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod lease;
pub mod locks;
pub mod object_id;
pub mod paths;
pub mod reader;
pub mod scratch;
pub mod store;
pub mod writer;

// Re-exports
pub use artifact::ArtifactRef;
pub use config::{StoreConfig, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use lease::{RootLease, LEASE_FILE_NAME};
pub use locks::{ObjectLockGuard, ObjectLocks};
pub use object_id::ObjectId;
pub use paths::{ObjectPaths, PathResolver};
pub use reader::{ChunkStream, ChunkedReader};
pub use scratch::{sweep_scratch, ScratchFile};
pub use store::ArtifactStore;
pub use writer::ArtifactWriter;

// Re-export the key types callers need to open a store with their own pair
pub use shutter_crypto::{Keystore, StorageKeyPair};
