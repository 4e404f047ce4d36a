//! End-to-end tests for ingest and chunked retrieval
//!
//! These tests drive the public `ArtifactStore` API against a temporary
//! directory and verify fidelity, chunking, cleanup and concurrency.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use futures::StreamExt;
use proptest::prelude::*;
use sha2::{Digest, Sha256};
use shutter_storage::{
    ArtifactStore, ObjectId, StorageError, StorageKeyPair, StoreConfig, LEASE_FILE_NAME,
};
use tokio::io::AsyncWriteExt;
use tempfile::TempDir;

fn shared_keys() -> Arc<StorageKeyPair> {
    static KEYS: OnceLock<Arc<StorageKeyPair>> = OnceLock::new();
    KEYS.get_or_init(|| Arc::new(StorageKeyPair::generate().unwrap()))
        .clone()
}

async fn create_test_store() -> (ArtifactStore, TempDir) {
    let temp = TempDir::new().unwrap();
    let store = ArtifactStore::with_keys(StoreConfig::with_root(temp.path()), shared_keys())
        .await
        .unwrap();
    (store, temp)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 131 % 253) as u8).collect()
}

/// Object files under the store root, without the lease file
fn object_files(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(root.join("objects"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name != LEASE_FILE_NAME)
        .collect();
    names.sort();
    names
}

/// Collect a stream, returning the chunk sizes and the concatenated bytes
async fn drain(store: &ArtifactStore, id: ObjectId) -> (Vec<usize>, Vec<u8>) {
    let mut stream = store.open_stream(id).await.unwrap();
    let mut sizes = Vec::new();
    let mut data = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        sizes.push(chunk.len());
        data.extend_from_slice(&chunk);
    }

    (sizes, data)
}

fn expected_sizes(len: usize) -> Vec<usize> {
    let mut sizes = vec![8192; len / 8192];
    if len % 8192 != 0 {
        sizes.push(len % 8192);
    }
    sizes
}

// ============================================================================
// Fidelity
// ============================================================================

/// A 10 000-byte upload comes back as [8192, 1808] with identical content
#[tokio::test]
async fn test_ten_kilobyte_scenario() {
    let (store, temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    let upload = pattern(10_000);

    let artifact = store.ingest_bytes(id, &upload).await.unwrap();
    assert_eq!(artifact.artifact_len, 10_288);
    assert_eq!(artifact.plaintext_len, Some(10_000));
    assert_eq!(object_files(temp.path()), vec![format!("{}.enc", id)]);

    let (sizes, data) = drain(&store, id).await;
    assert_eq!(sizes, vec![8192, 1808]);
    assert_eq!(Sha256::digest(&data), Sha256::digest(&upload));
}

#[tokio::test]
async fn test_roundtrip_boundary_lengths() {
    let (store, _temp) = create_test_store().await;

    for len in [0usize, 1, 15, 16, 8191, 8192, 8193, 24_576] {
        let id = ObjectId::new_v4();
        let upload = pattern(len);
        store.ingest_bytes(id, &upload).await.unwrap();

        let (sizes, data) = drain(&store, id).await;
        assert_eq!(sizes, expected_sizes(len), "length {}", len);
        assert_eq!(data, upload, "length {}", len);
    }
}

#[tokio::test]
async fn test_roundtrip_multi_megabyte() {
    let (store, _temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    let upload = pattern(5 * 1024 * 1024 + 77);

    let start = Instant::now();
    store
        .ingest(id, std::io::Cursor::new(upload.clone()))
        .await
        .unwrap();
    let ingest_time = start.elapsed();

    let start = Instant::now();
    let (sizes, data) = drain(&store, id).await;
    let read_time = start.elapsed();

    println!(
        "5 MiB artifact: ingest {:?}, stream {:?} ({} chunks)",
        ingest_time,
        read_time,
        sizes.len()
    );

    assert_eq!(sizes, expected_sizes(upload.len()));
    assert_eq!(Sha256::digest(&data), Sha256::digest(&upload));
}

#[tokio::test]
async fn test_read_all_matches_stream() {
    let (store, _temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    let upload = pattern(20_001);
    store.ingest_bytes(id, &upload).await.unwrap();

    assert_eq!(&store.read_all(id).await.unwrap()[..], &upload[..]);
}

#[tokio::test]
async fn test_zero_length_artifact() {
    let (store, _temp) = create_test_store().await;
    let id = ObjectId::new_v4();

    let artifact = store.ingest_bytes(id, b"").await.unwrap();
    assert_eq!(artifact.artifact_len, 288);

    let (sizes, data) = drain(&store, id).await;
    assert!(sizes.is_empty());
    assert!(data.is_empty());
}

#[tokio::test]
async fn test_missing_artifact_not_found() {
    let (store, _temp) = create_test_store().await;
    let id = ObjectId::new_v4();

    let err = store.open_stream(id).await.unwrap_err();
    assert!(matches!(err, StorageError::ArtifactNotFound(missing) if missing == id));

    let err = store.read_all(id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_artifact_sealed_by_other_keys_fails() {
    let (store, temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    store.ingest_bytes(id, b"foreign").await.unwrap();

    let other = ArtifactStore::with_keys(
        StoreConfig::with_root(temp.path()),
        Arc::new(StorageKeyPair::generate().unwrap()),
    )
    .await
    .unwrap();

    let err = other.open_stream(id).await.unwrap_err();
    assert!(matches!(err, StorageError::EncryptionFailure(_)));
    assert_eq!(object_files(temp.path()), vec![format!("{}.enc", id)]);
}

// ============================================================================
// Scratch Cleanup
// ============================================================================

#[tokio::test]
async fn test_cache_removed_after_completion() {
    let (store, temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    store.ingest_bytes(id, &pattern(17_000)).await.unwrap();

    let mut stream = store.open_stream(id).await.unwrap();
    assert_eq!(object_files(temp.path()).len(), 2);
    while let Some(chunk) = stream.next().await {
        chunk.unwrap();
    }
    drop(stream);

    assert_eq!(object_files(temp.path()), vec![format!("{}.enc", id)]);
}

#[tokio::test]
async fn test_cache_removed_after_early_drop() {
    let (store, temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    store.ingest_bytes(id, &pattern(50_000)).await.unwrap();

    let mut stream = store.open_stream(id).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 8192);
    drop(stream);

    assert_eq!(object_files(temp.path()), vec![format!("{}.enc", id)]);
}

#[tokio::test]
async fn test_unpolled_stream_cleans_up() {
    let (store, temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    store.ingest_bytes(id, &pattern(100)).await.unwrap();

    let stream = store.open_stream(id).await.unwrap();
    assert_eq!(stream.len(), 100);
    drop(stream);

    assert_eq!(object_files(temp.path()), vec![format!("{}.enc", id)]);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_ids() {
    let (store, temp) = create_test_store().await;
    let task_count = 16;

    let handles: Vec<_> = (0..task_count)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let id = ObjectId::new_v4();
                let upload = pattern(1000 * (i + 1));
                store.ingest_bytes(id, &upload).await.unwrap();
                let (_, data) = drain(&store, id).await;
                assert_eq!(data, upload);
                id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();

    assert_eq!(store.list().await.unwrap(), ids);
    assert_eq!(object_files(temp.path()).len(), task_count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_id_retrievals() {
    let (store, temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    let upload = pattern(40_000);
    store.ingest_bytes(id, &upload).await.unwrap();

    // A stalled consumer must not hold up a second retrieval
    let mut stalled = store.open_stream(id).await.unwrap();
    let first = stalled.next().await.unwrap().unwrap();

    let second = {
        let store = store.clone();
        tokio::spawn(async move { drain(&store, id).await })
    };
    let (_, second_data) = tokio::time::timeout(Duration::from_secs(10), second)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second_data, upload);

    let mut data = first.to_vec();
    while let Some(chunk) = stalled.next().await {
        data.extend_from_slice(&chunk.unwrap());
    }
    drop(stalled);
    assert_eq!(data, upload);
    assert_eq!(object_files(temp.path()), vec![format!("{}.enc", id)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reingest_and_delete_while_streaming() {
    let (store, _temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    let original = pattern(30_000);
    store.ingest_bytes(id, &original).await.unwrap();

    let mut stream = store.open_stream(id).await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), store.ingest_bytes(id, b"replacement"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&store.read_all(id).await.unwrap()[..], b"replacement");

    // The open stream keeps serving the plaintext it was opened on
    let mut data = stream.next().await.unwrap().unwrap().to_vec();
    assert!(store.delete(&id).await.unwrap());
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk.unwrap());
    }
    drop(stream);
    assert_eq!(data, original);
    assert!(!store.exists(&id).await.unwrap());
}

/// A second handle opening the same root must not disturb the first one's
/// in-flight upload
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_handle_spares_inflight_ingest() {
    let (store, temp) = create_test_store().await;
    let id = ObjectId::new_v4();
    let upload = pattern(40_000);
    let (mut tx, rx) = tokio::io::duplex(64 * 1024);

    let ingest = {
        let store = store.clone();
        tokio::spawn(async move { store.ingest(id, rx).await })
    };

    tx.write_all(&upload[..20_000]).await.unwrap();
    // Wait until the raw upload is on disk
    let deadline = Instant::now() + Duration::from_secs(10);
    while !object_files(temp.path()).iter().any(|name| name.ends_with(".raw")) {
        assert!(Instant::now() < deadline, "upload never reached disk");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let second = ArtifactStore::with_keys(StoreConfig::with_root(temp.path()), shared_keys())
        .await
        .unwrap();
    assert!(object_files(temp.path()).iter().any(|name| name.ends_with(".raw")));

    tx.write_all(&upload[20_000..]).await.unwrap();
    drop(tx);

    let artifact = ingest.await.unwrap().unwrap();
    assert_eq!(artifact.plaintext_len, Some(40_000));
    assert_eq!(&second.read_all(id).await.unwrap()[..], &upload[..]);

    // With every handle gone, the next open may sweep again
    drop(second);
    drop(store);
    let leftover = temp.path().join("objects").join(format!("{}.0123456789ab.raw", id));
    std::fs::write(&leftover, b"crashed upload").unwrap();
    let _reopened = ArtifactStore::with_keys(StoreConfig::with_root(temp.path()), shared_keys())
        .await
        .unwrap();
    assert!(!leftover.exists());
}

// ============================================================================
// Chunk Partition Law
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_chunks_partition_plaintext(upload in prop::collection::vec(any::<u8>(), 0..50_000)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (sizes, data) = rt.block_on(async {
            let (store, _temp) = create_test_store().await;
            let id = ObjectId::new_v4();
            store.ingest_bytes(id, &upload).await.unwrap();
            drain(&store, id).await
        });

        prop_assert_eq!(sizes, expected_sizes(upload.len()));
        prop_assert_eq!(data, upload);
    }
}
