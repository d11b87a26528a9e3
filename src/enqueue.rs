//! The enqueue pipeline: unprocessed artifacts → fetch dispatches.
//!
//! Streams artifacts with no `processed_at`, dispatches a fetch job for
//! each, then marks it processed. Dispatch happens before the mark, so a
//! crash between the two re-enqueues the artifact on the next pass —
//! at-least-once dispatch, made safe by the fetch engine's idempotent
//! placement. This pipeline never inspects fetch outcomes; it only gates
//! re-dispatch.

use anyhow::Result;
use futures::TryStreamExt;
use tracing::{debug, info};

use crate::context::AppContext;
use crate::models::{FetchJob, PROCESSED_SUCCESS};
use crate::queue::FetchQueue;

/// Run one enqueue pass. Returns the number of artifacts dispatched.
pub async fn run_enqueue(ctx: &AppContext, queue: &FetchQueue) -> Result<u64> {
    info!("Starting enqueue pass");

    let mut dispatched = 0u64;
    let mut unprocessed = ctx.store.iter_unprocessed();

    while let Some(artifact) = unprocessed.try_next().await? {
        queue
            .dispatch(FetchJob {
                fingerprint: artifact.fingerprint.clone(),
            })
            .await?;

        ctx.store
            .mark_processed(&artifact, PROCESSED_SUCCESS)
            .await?;
        debug!(fingerprint = %artifact.fingerprint, "Dispatched artifact for fetch");
        dispatched += 1;
    }

    info!(dispatched, "Enqueue pass complete");
    Ok(dispatched)
}
