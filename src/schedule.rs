//! Recurring scheduling for the `run` command.
//!
//! Each watch entry and the enqueue pass run on independent tokio interval
//! loops — overlapping-tolerant, never mutually exclusive. A failed pass is
//! logged and the loop keeps its cadence; a single bad source or artifact
//! never halts the scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::context::AppContext;
use crate::enqueue;
use crate::queue::{spawn_workers, FetchQueue};
use crate::watch;

/// Run the scheduler and fetch worker pool until ctrl-c.
pub async fn run_app(ctx: Arc<AppContext>) -> Result<()> {
    let (queue, rx) = FetchQueue::new(ctx.config.queue.capacity);
    let workers = spawn_workers(ctx.clone(), rx, ctx.config.queue.workers);
    info!(workers = workers.len(), "Fetch worker pool started");

    let mut loops = Vec::new();

    for entry in ctx.config.watch.clone() {
        let ctx = ctx.clone();
        info!(watch = %entry.name, interval_secs = entry.schedule.interval_secs, "Scheduling watch job");
        loops.push(tokio::spawn(async move {
            let mut ticker = ticker(entry.schedule.interval_secs, entry.schedule.immediate);
            loop {
                ticker.tick().await;
                if let Err(err) = watch::run_watch(&ctx.store, &ctx.watchers, &entry).await {
                    error!(watch = %entry.name, error = %format!("{err:#}"), "Watch pass failed");
                }
            }
        }));
    }

    {
        let ctx = ctx.clone();
        let queue = queue.clone();
        let schedule = ctx.config.enqueue.clone();
        info!(interval_secs = schedule.interval_secs, "Scheduling enqueue job");
        loops.push(tokio::spawn(async move {
            let mut ticker = ticker(schedule.interval_secs, schedule.immediate);
            loop {
                ticker.tick().await;
                if let Err(err) = enqueue::run_enqueue(&ctx, &queue).await {
                    error!(error = %format!("{err:#}"), "Enqueue pass failed");
                }
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down scheduler");

    for handle in loops {
        handle.abort();
    }
    // Dropping the last queue sender closes the channel; workers drain
    // whatever was already dispatched and exit.
    drop(queue);
    for worker in workers {
        let _ = worker.await;
    }

    Ok(())
}

fn ticker(interval_secs: u64, immediate: bool) -> tokio::time::Interval {
    let period = Duration::from_secs(interval_secs);
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = interval_at(start, period);
    // A pass that overruns its interval should not burst to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
