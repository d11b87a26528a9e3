//! In-process fetch queue and worker pool.
//!
//! The enqueue pass dispatches [`FetchJob`]s onto a bounded channel; a pool
//! of workers drains it concurrently. Jobs carry only the fingerprint, so a
//! worker always operates on freshly-read store state.
//!
//! A worker that hits a fetch error logs it and moves on: the artifact is
//! left without a terminal mark and the next enqueue pass re-dispatches it
//! (at-least-once delivery, made safe by idempotent placement).

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::context::AppContext;
use crate::fetch;
use crate::models::FetchJob;

/// Sending half of the fetch queue. Clone freely; dropping every clone
/// closes the queue and lets workers drain and exit.
#[derive(Clone)]
pub struct FetchQueue {
    tx: mpsc::Sender<FetchJob>,
}

impl FetchQueue {
    /// Create a bounded queue, returning the dispatch handle and the
    /// receiving half to hand to [`spawn_workers`].
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FetchJob>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Dispatch one job, waiting if the queue is at capacity.
    pub async fn dispatch(&self, job: FetchJob) -> Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| anyhow::anyhow!("Fetch queue is closed"))
    }
}

/// Spawn `count` workers consuming from the queue until it closes.
pub fn spawn_workers(
    ctx: Arc<AppContext>,
    rx: mpsc::Receiver<FetchJob>,
    count: usize,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));

    (0..count)
        .map(|worker| {
            let ctx = ctx.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    // Hold the lock only long enough to take one job so the
                    // pool shares the channel fairly.
                    let job = rx.lock().await.recv().await;
                    let Some(job) = job else {
                        debug!(worker, "Fetch queue closed, worker exiting");
                        break;
                    };

                    debug!(worker, fingerprint = %job.fingerprint, "Picked up fetch job");
                    if let Err(err) = fetch::fetch_artifact(&ctx, &job.fingerprint).await {
                        // Transient: no terminal mark was recorded, so the
                        // next enqueue pass retries this artifact.
                        warn!(
                            worker,
                            fingerprint = %job.fingerprint,
                            error = %format!("{err:#}"),
                            "Fetch attempt failed"
                        );
                    }
                }
            })
        })
        .collect()
}
