//! Scratch file lifecycle
//!
//! Raw uploads, decrypted caches and staging artifacts only live as long as
//! the operation that created them. [`ScratchFile`] deletes its path when
//! dropped, so every exit path (success, error, cancellation) cleans up.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::StorageResult;
use crate::paths::{is_scratch_suffix, PathResolver};

/// A file path that is removed when the guard is dropped
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    /// Guard the given path
    ///
    /// The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file; the guard no longer deletes it
    pub fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Drop can't await; a single unlink is cheap enough to do inline
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file"),
        }
    }
}

/// Remove every scratch file in `dir`
///
/// Committed artifacts and files this crate did not create are left alone.
/// Returns the number of files removed. Deletes scratch files of live
/// operations too, so only call it while no other handle uses `dir` (see
/// [`RootLease`](crate::lease::RootLease)).
pub async fn sweep_scratch(dir: &Path) -> StorageResult<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };

        if let Some((_, suffix)) = PathResolver::parse_file_name(&name)
            && is_scratch_suffix(suffix)
        {
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    if removed > 0 {
        info!(dir = %dir.display(), removed, "Swept leftover scratch files");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_id::ObjectId;
    use tempfile::TempDir;

    #[test]
    fn test_drop_removes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("upload.raw");
        std::fs::write(&path, b"scratch").unwrap();

        {
            let guard = ScratchFile::new(&path);
            assert_eq!(guard.path(), path);
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_drop_without_file_is_silent() {
        let temp = TempDir::new().unwrap();
        drop(ScratchFile::new(temp.path().join("never-created")));
    }

    #[test]
    fn test_disarm_keeps_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("keep.enc");
        std::fs::write(&path, b"artifact").unwrap();

        let kept = ScratchFile::new(&path).disarm();
        assert_eq!(kept, path);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_sweep_only_touches_scratch() {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new(temp.path());
        let id = ObjectId::new_v4();
        let plain = resolver.resolve(&id);
        let tagged = resolver.resolve_scratch(&id);

        for path in [
            &plain.raw,
            &plain.encrypted,
            &plain.decrypted,
            &plain.staging,
            &tagged.raw,
            &tagged.decrypted,
            &tagged.staging,
        ] {
            std::fs::write(path, b"x").unwrap();
        }
        std::fs::write(temp.path().join("README"), b"keep").unwrap();

        let removed = sweep_scratch(temp.path()).await.unwrap();
        assert_eq!(removed, 6);

        assert!(plain.encrypted.exists());
        assert!(temp.path().join("README").exists());
        for path in [
            &plain.raw,
            &plain.decrypted,
            &plain.staging,
            &tagged.raw,
            &tagged.decrypted,
            &tagged.staging,
        ] {
            assert!(!path.exists());
        }
    }

    #[tokio::test]
    async fn test_sweep_missing_dir() {
        let temp = TempDir::new().unwrap();
        let removed = sweep_scratch(&temp.path().join("absent")).await.unwrap();
        assert_eq!(removed, 0);
    }
}
