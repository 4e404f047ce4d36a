//! Objects directory lease
//!
//! Every open store holds a shared advisory lock on a lock file inside its
//! objects directory. Leftover scratch files are only swept by a handle that
//! can briefly take the lock exclusively, i.e. when no other handle (in this
//! process or another) is using the directory.

use std::fs::File;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tokio::fs::OpenOptions;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::scratch::sweep_scratch;

/// Name of the lock file inside the objects directory
pub const LEASE_FILE_NAME: &str = ".shutter.lock";

/// Shared lock on an objects directory, released on drop
#[derive(Debug)]
pub struct RootLease {
    // Closing the file releases the lock
    _file: File,
    path: PathBuf,
}

impl RootLease {
    /// Take a shared lease on `dir`
    ///
    /// With `sweep` set, leftover scratch files are removed first, but only
    /// if no other handle holds a lease. Returns the lease and the number of
    /// files swept.
    pub async fn acquire(dir: &Path, sweep: bool) -> StorageResult<(Self, usize)> {
        let path = dir.join(LEASE_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?
            .into_std()
            .await;

        let mut swept = 0;
        if sweep {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    // Dropping `file` on error releases the exclusive lock
                    swept = sweep_scratch(dir).await?;
                    FileExt::unlock(&file)?;
                }
                Err(e) if is_contended(&e) => {
                    debug!(dir = %dir.display(), "Directory in use by another handle, skipping sweep");
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Blocks while another handle is sweeping
        let file = tokio::task::spawn_blocking(move || {
            FileExt::lock_shared(&file)?;
            Ok::<_, std::io::Error>(file)
        })
        .await
        .map_err(|e| StorageError::Io(format!("Lease task failed: {}", e)))??;

        Ok((Self { _file: file, path }, swept))
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}
