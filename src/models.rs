//! Core data models used throughout Magpie.
//!
//! The [`Artifact`] record is the unit of identity and lifecycle: one row per
//! discovered URL, keyed by its fingerprint, tracking the two write-once
//! status pairs (processed, fetched) from discovery through placement.

use sqlx::FromRow;

/// Terminal fetch message: no download provider resolved the URL.
pub const FETCH_UNHANDLED: &str = "unhandled";
/// Terminal fetch message: destination already held verified (or trusted) bytes.
pub const FETCH_SKIPPED: &str = "skipped";
/// Terminal fetch message: bytes were placed at the destination.
pub const FETCH_SUCCESS: &str = "success";
/// Terminal fetch message: destination exists but failed checksum
/// verification; existing bytes are left untouched.
pub const FETCH_CHECKSUM_CONFLICT: &str = "checksum_conflict";

/// Message recorded by the enqueue pass once an artifact has been dispatched.
pub const PROCESSED_SUCCESS: &str = "success";

/// A discovered artifact tracked from discovery through fetch.
///
/// Identity fields (`id`, `created_at`, `fingerprint`, `url`) are immutable
/// for the life of the record. The `processed_*` and `fetched_*` pairs each
/// move from `(None, None)` to `(Some(ts), Some(msg))` exactly once, via
/// [`ArtifactStore::mark_processed`](crate::store::ArtifactStore::mark_processed)
/// and [`ArtifactStore::mark_fetched`](crate::store::ArtifactStore::mark_fetched).
///
/// Timestamps are unix seconds (UTC).
#[derive(Debug, Clone, FromRow)]
pub struct Artifact {
    pub id: String,
    pub created_at: i64,
    pub fingerprint: String,
    pub url: String,
    pub fetched_at: Option<i64>,
    pub fetched_message: Option<String>,
    pub processed_at: Option<i64>,
    pub processed_message: Option<String>,
}

impl Artifact {
    /// True once a fetch attempt has recorded a terminal outcome.
    pub fn is_fetched(&self) -> bool {
        self.fetched_at.is_some()
    }

    /// True once the enqueue pass has dispatched this artifact.
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// The only payload carried across the fetch queue boundary.
///
/// Workers re-read all other state from the artifact store, so a stale or
/// re-delivered job never carries stale mutable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub fingerprint: String,
}
