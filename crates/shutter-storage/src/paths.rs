//! Path resolution for object files
//!
//! Every object owns a fixed set of sibling files in one flat directory,
//! named by its identifier plus a suffix. Scratch files belonging to a
//! single ingest or retrieval additionally carry a random tag between the
//! identifier and the suffix (`<id>.<tag>.raw`), so two operations never
//! share a scratch path. Resolution touches no files.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::object_id::ObjectId;

/// Suffix of the raw upload (scratch)
pub const RAW_SUFFIX: &str = "raw";
/// Suffix of the committed encrypted artifact
pub const ENCRYPTED_SUFFIX: &str = "enc";
/// Suffix of the decrypted retrieval cache (scratch)
pub const DECRYPTED_SUFFIX: &str = "dec";
/// Suffix of an artifact still being written (scratch)
pub const STAGING_SUFFIX: &str = "enc.part";

/// Length of the per-operation scratch tag, in hex digits
pub const SCRATCH_TAG_LEN: usize = 12;

/// The on-disk locations belonging to one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPaths {
    pub raw: PathBuf,
    pub encrypted: PathBuf,
    pub decrypted: PathBuf,
    /// Where the artifact is written before the commit rename
    pub staging: PathBuf,
}

/// Maps object identifiers to file paths under one directory
#[derive(Debug, Clone)]
pub struct PathResolver {
    dir: PathBuf,
}

impl PathResolver {
    /// Create a resolver for the given objects directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding all object files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve all file variants for an identifier
    ///
    /// Deterministic: the same identifier always maps to the same paths.
    pub fn resolve(&self, id: &ObjectId) -> ObjectPaths {
        ObjectPaths {
            raw: self.file(id, RAW_SUFFIX),
            encrypted: self.file(id, ENCRYPTED_SUFFIX),
            decrypted: self.file(id, DECRYPTED_SUFFIX),
            staging: self.file(id, STAGING_SUFFIX),
        }
    }

    /// Resolve paths for one ingest or retrieval of `id`
    ///
    /// The committed artifact path is the shared one; the scratch paths are
    /// tagged with a fresh random tag.
    pub fn resolve_scratch(&self, id: &ObjectId) -> ObjectPaths {
        let tag = scratch_tag();
        ObjectPaths {
            raw: self.tagged_file(id, &tag, RAW_SUFFIX),
            encrypted: self.file(id, ENCRYPTED_SUFFIX),
            decrypted: self.tagged_file(id, &tag, DECRYPTED_SUFFIX),
            staging: self.tagged_file(id, &tag, STAGING_SUFFIX),
        }
    }

    fn file(&self, id: &ObjectId, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, suffix))
    }

    fn tagged_file(&self, id: &ObjectId, tag: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.{}", id, tag, suffix))
    }

    /// Split a file name into its identifier and suffix
    ///
    /// Accepts both plain and tagged scratch names. Returns `None` for
    /// names not produced by this resolver.
    pub fn parse_file_name(name: &str) -> Option<(ObjectId, &str)> {
        let (stem, rest) = name.split_once('.')?;
        let suffix = match rest {
            RAW_SUFFIX | ENCRYPTED_SUFFIX | DECRYPTED_SUFFIX | STAGING_SUFFIX => rest,
            _ => {
                let (tag, suffix) = rest.split_once('.')?;
                if !is_scratch_tag(tag) || !is_scratch_suffix(suffix) {
                    return None;
                }
                suffix
            }
        };
        Some((stem.parse().ok()?, suffix))
    }
}

/// Check if a suffix names a scratch variant
pub fn is_scratch_suffix(suffix: &str) -> bool {
    matches!(suffix, RAW_SUFFIX | DECRYPTED_SUFFIX | STAGING_SUFFIX)
}

fn scratch_tag() -> String {
    let mut tag = Uuid::new_v4().simple().to_string();
    tag.truncate(SCRATCH_TAG_LEN);
    tag
}

fn is_scratch_tag(tag: &str) -> bool {
    tag.len() == SCRATCH_TAG_LEN
        && tag
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
