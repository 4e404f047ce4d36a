//! Subcommand implementations
//!
//! Each command writes its report to `out` so the binary can target stdout
//! and tests can capture it.

use std::path::Path;

use anyhow::Context;
use futures::StreamExt;
use shutter_storage::{ArtifactStore, Keystore, ObjectId, StoreConfig};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

/// Load or create the key pair and report its fingerprint
pub async fn keygen<W>(config: &StoreConfig, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let keystore = Keystore::new(&config.keys_path());
    let created = !keystore.exists();
    let (keystore, pair) = tokio::task::spawn_blocking(move || {
        let pair = keystore.load_or_create();
        (keystore, pair)
    })
    .await?;
    let pair = pair.context("storage key pair unavailable")?;

    let status = if created { "created" } else { "loaded" };
    let line = format!(
        "{} {} {}\n",
        status,
        pair.public_fingerprint(),
        keystore.path().display()
    );
    out.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Encrypt a file into the store and report its id and artifact size
pub async fn ingest<W>(
    store: &ArtifactStore,
    file: &Path,
    id: Option<ObjectId>,
    out: &mut W,
) -> anyhow::Result<ObjectId>
where
    W: AsyncWrite + Unpin,
{
    let id = id.unwrap_or_else(ObjectId::new_v4);
    let source = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("cannot open {}", file.display()))?;

    let artifact = store.ingest(id, source).await?;
    info!(id = %id, artifact_len = artifact.artifact_len, "Ingested file");

    out.write_all(format!("{}\t{}\n", id, artifact.artifact_len).as_bytes())
        .await?;
    Ok(id)
}

/// Stream the plaintext of an object to `out`, one chunk at a time
pub async fn fetch<W>(store: &ArtifactStore, id: ObjectId, out: &mut W) -> anyhow::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = store.open_stream(id).await?;
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;

    Ok(written)
}

/// Report the artifact size of an object
pub async fn stat<W>(store: &ArtifactStore, id: ObjectId, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let artifact = store.stat(&id).await?;
    out.write_all(format!("{}\t{}\n", artifact.object_id, artifact.artifact_len).as_bytes())
        .await?;
    Ok(())
}

/// Report every stored object id, one per line
pub async fn list<W>(store: &ArtifactStore, out: &mut W) -> anyhow::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let ids = store.list().await?;
    for id in &ids {
        out.write_all(format!("{}\n", id).as_bytes()).await?;
    }
    Ok(ids.len())
}

/// Delete an object; fails if nothing was stored
pub async fn delete<W>(store: &ArtifactStore, id: ObjectId, out: &mut W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if !store.delete(&id).await? {
        anyhow::bail!("no artifact stored under {}", id);
    }
    out.write_all(format!("deleted {}\n", id).as_bytes()).await?;
    Ok(())
}
