//! The fetch/placement engine.
//!
//! For one artifact: resolve a download provider, materialize the best
//! descriptor to a scratch file, checksum the bytes, and verify-or-place
//! them at the checksum-derived destination — then record exactly one
//! terminal outcome on the artifact. Every step is safe to repeat, which is
//! what makes the enqueue pass's at-least-once dispatch harmless.
//!
//! Terminal outcomes are mutually exclusive per attempt:
//! - `unhandled` — no provider resolves the URL, or it yields no descriptors
//! - `skipped` — destination already held trusted bytes
//! - `success` — bytes moved into place
//! - `checksum_conflict` — destination exists but failed verification;
//!   existing bytes are never overwritten
//!
//! Any transport or placement error propagates instead of marking, leaving
//! the artifact unfetched so the next enqueue pass retries it.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::content_store::Placement;
use crate::context::AppContext;
use crate::hasher;
use crate::models::{
    Artifact, FETCH_CHECKSUM_CONFLICT, FETCH_SKIPPED, FETCH_SUCCESS, FETCH_UNHANDLED,
};

/// Terminal outcome of one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No download capability for this URL; recorded, never retried.
    Unhandled,
    /// Destination already held trusted bytes.
    Skipped,
    /// Bytes were placed at the destination.
    Success,
    /// Destination exists but failed checksum verification.
    ChecksumConflict,
    /// The artifact already carried a terminal mark; nothing was done.
    AlreadyFetched,
}

impl FetchOutcome {
    fn message(&self) -> Option<&'static str> {
        match self {
            FetchOutcome::Unhandled => Some(FETCH_UNHANDLED),
            FetchOutcome::Skipped => Some(FETCH_SKIPPED),
            FetchOutcome::Success => Some(FETCH_SUCCESS),
            FetchOutcome::ChecksumConflict => Some(FETCH_CHECKSUM_CONFLICT),
            FetchOutcome::AlreadyFetched => None,
        }
    }
}

/// Fetch one artifact by fingerprint and record its terminal outcome.
pub async fn fetch_artifact(ctx: &AppContext, fingerprint: &str) -> Result<FetchOutcome> {
    let artifact = ctx
        .store
        .get(fingerprint)
        .await?
        .with_context(|| format!("No artifact with fingerprint {fingerprint}"))?;

    // Terminal write-once: a re-delivered job for an already-fetched
    // artifact must not double-apply side effects.
    if artifact.is_fetched() {
        debug!(fingerprint = %artifact.fingerprint, "Artifact already fetched, nothing to do");
        return Ok(FetchOutcome::AlreadyFetched);
    }

    let outcome = attempt(ctx, &artifact).await?;
    if let Some(message) = outcome.message() {
        ctx.store.mark_fetched(&artifact, message).await?;
        info!(
            fingerprint = %artifact.fingerprint,
            url = %artifact.url,
            outcome = message,
            "Fetch attempt complete"
        );
    }

    Ok(outcome)
}

async fn attempt(ctx: &AppContext, artifact: &Artifact) -> Result<FetchOutcome> {
    let Some(provider) = ctx.downloads.resolve(&artifact.url) else {
        warn!(url = %artifact.url, "No download provider resolves this URL");
        return Ok(FetchOutcome::Unhandled);
    };

    let mut descriptors = provider.descriptors(&artifact.url).await?;
    if descriptors.is_empty() {
        warn!(url = %artifact.url, provider = provider.name(), "Provider found nothing to download");
        return Ok(FetchOutcome::Unhandled);
    }

    // Best descriptor per the provider's own ranking; the ordering is
    // opaque to this engine.
    descriptors.sort_by_key(|d| std::cmp::Reverse(d.ranking));
    let descriptor = &descriptors[0];

    // Scratch file lives in the content store root so the final rename is
    // atomic; the guard removes it on any early return.
    let temp = ctx.content.scratch_file()?;
    provider
        .materialize(descriptor, temp.path())
        .await
        .with_context(|| format!("Failed to materialize {}", descriptor.url))?;

    let checksum = hasher::content_checksum(temp.path())?;
    debug!(
        url = %artifact.url,
        checksum = %checksum,
        filename = %descriptor.filename,
        "Materialized content"
    );

    let placement = ctx.content.place(
        temp,
        &checksum,
        descriptor.extension(),
        &descriptor.checksums,
    )?;

    Ok(match placement {
        Placement::Stored(path) => {
            info!(path = %path.display(), "Placed content");
            FetchOutcome::Success
        }
        Placement::AlreadyPresent(path) => {
            debug!(path = %path.display(), "Content already present");
            FetchOutcome::Skipped
        }
        Placement::ChecksumConflict(path) => {
            warn!(
                path = %path.display(),
                "Existing content failed checksum verification; leaving it untouched"
            );
            FetchOutcome::ChecksumConflict
        }
    })
}
