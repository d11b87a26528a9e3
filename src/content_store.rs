//! Content-addressed on-disk storage.
//!
//! Downloaded bytes are named by their content checksum and placed under a
//! two-level sharded layout, `root/{cs[0:2]}/{cs[2:4]}/{cs}.{ext}`, which
//! bounds any single directory's entry count as the store grows into the
//! millions of items.
//!
//! Placement is idempotent: bytes land via write-to-temp-then-rename, and an
//! already-present destination is never overwritten. Concurrent fetches that
//! produce the same checksum race benignly to the same path — one move wins,
//! the rest observe the destination as present.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::download::SuppliedChecksum;
use crate::hasher;

/// Outcome of placing one materialized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The bytes were moved into place; the destination did not exist before.
    Stored(PathBuf),
    /// The destination already existed and its bytes are trusted — either a
    /// supplied checksum matched, or no checksum was supplied to verify
    /// against.
    AlreadyPresent(PathBuf),
    /// The destination exists but matched none of the supplied checksums.
    /// The existing bytes are left untouched and the new bytes discarded.
    ChecksumConflict(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic destination path for a checksum and optional extension.
    ///
    /// Checksums too short to carry both shard prefixes land directly under
    /// the root rather than panicking on the slice.
    pub fn path_for(&self, checksum: &str, extension: Option<&str>) -> PathBuf {
        let filename = match extension {
            Some(ext) if !ext.is_empty() => format!("{checksum}.{ext}"),
            _ => checksum.to_string(),
        };
        match (checksum.get(..2), checksum.get(2..4)) {
            (Some(first), Some(second)) => self.root.join(first).join(second).join(filename),
            _ => self.root.join(filename),
        }
    }

    /// Create a temporary file inside the store root.
    ///
    /// Must live on the same filesystem as the destination so the final
    /// rename is atomic; cleanup on early return is handled by the
    /// [`NamedTempFile`] guard.
    pub fn scratch_file(&self) -> Result<NamedTempFile> {
        std::fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create content store root {}", self.root.display())
        })?;
        NamedTempFile::new_in(&self.root).context("Failed to create scratch file")
    }

    /// Verify-or-move a materialized temp file into its destination.
    ///
    /// `checksum` is the content checksum computed over `temp`'s bytes;
    /// `supplied` are the expected checksums (if any) from the download
    /// descriptor, used only to verify a pre-existing destination.
    pub fn place(
        &self,
        temp: NamedTempFile,
        checksum: &str,
        extension: Option<&str>,
        supplied: &[SuppliedChecksum],
    ) -> Result<Placement> {
        let destination = self.path_for(checksum, extension);

        if destination.exists() {
            // Existing bytes are authoritative when nothing was supplied to
            // verify them against.
            if supplied.is_empty() || verify_existing(&destination, supplied)? {
                return Ok(Placement::AlreadyPresent(destination));
            }
            return Ok(Placement::ChecksumConflict(destination));
        }

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Same-filesystem rename; atomic relative to this process.
        temp.persist(&destination)
            .with_context(|| format!("Failed to move bytes into {}", destination.display()))?;

        Ok(Placement::Stored(destination))
    }
}

/// True if the existing file matches at least one supplied checksum.
///
/// Checksums with algorithms we cannot compute are skipped; a descriptor
/// that only carries unknown algorithms therefore fails verification rather
/// than silently passing.
fn verify_existing(path: &Path, supplied: &[SuppliedChecksum]) -> Result<bool> {
    let algorithms: Vec<_> = supplied.iter().map(|c| c.algorithm).collect();
    let actual = hasher::hash_file(path, &algorithms)?;

    Ok(supplied.iter().any(|expected| {
        actual
            .get(&expected.algorithm)
            .is_some_and(|digest| digest.eq_ignore_ascii_case(&expected.value))
    }))
}
