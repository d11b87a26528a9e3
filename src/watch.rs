//! The watch pipeline: discovery → dedup → artifact records.
//!
//! A [`Watcher`] is the discovery capability contract: given validated
//! arguments it yields a finite stream of candidate URLs. The
//! [`WatcherRegistry`] maps configured type names to implementations, and
//! [`run_watch`] bridges a watcher's candidates into store-backed artifacts,
//! applying the dedup rule before any downstream work happens.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info};

use crate::config::WatchConfig;
use crate::fingerprint::fingerprint;
use crate::store::ArtifactStore;

/// A discovery capability producing candidate URLs.
#[async_trait]
pub trait Watcher: Send + Sync {
    /// The type name this watcher is registered under (e.g. `"subreddit"`).
    fn type_name(&self) -> &str;

    /// Validate watcher-specific arguments from a watch entry.
    ///
    /// Called at setup time so misconfiguration surfaces before any
    /// scheduled run, not during one.
    fn validate_args(&self, args: &toml::Value) -> Result<()>;

    /// Discover candidate URLs for one pass.
    ///
    /// The stream is finite and lazy. It is not restartable mid-stream: a
    /// fresh call to `discover` restarts discovery from the source on the
    /// next scheduled invocation.
    async fn discover<'a>(&'a self, args: &toml::Value)
        -> Result<BoxStream<'a, Result<String>>>;
}

/// Registry of watcher implementations keyed by type name.
#[derive(Default, Clone)]
pub struct WatcherRegistry {
    watchers: BTreeMap<String, Arc<dyn Watcher>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, watcher: Arc<dyn Watcher>) {
        self.watchers
            .insert(watcher.type_name().to_string(), watcher);
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn Watcher>> {
        self.watchers.get(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.watchers.keys().map(String::as_str)
    }

    /// Validate every configured watch entry against its watcher.
    ///
    /// Surfaced at schedule-setup time; an unknown type or bad arguments is
    /// a configuration failure, never a runtime one.
    pub fn validate(&self, entries: &[WatchConfig]) -> Result<()> {
        for entry in entries {
            let watcher = self.get(&entry.watcher_type).with_context(|| {
                format!(
                    "watch.{}: unknown watcher type '{}'",
                    entry.name, entry.watcher_type
                )
            })?;
            watcher
                .validate_args(&entry.args)
                .with_context(|| format!("watch.{}: invalid arguments", entry.name))?;
        }
        Ok(())
    }
}

/// Counters for one watch pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchStats {
    pub discovered: u64,
    pub created: u64,
    pub skipped: u64,
}

/// Run one watch pass for a configured entry.
///
/// Each candidate commits independently: a discovery failure mid-stream
/// returns an error, but every artifact ensured before the failure stays
/// recorded — there is no transaction spanning the whole stream.
pub async fn run_watch(
    store: &ArtifactStore,
    registry: &WatcherRegistry,
    entry: &WatchConfig,
) -> Result<WatchStats> {
    let watcher = registry.get(&entry.watcher_type).with_context(|| {
        format!(
            "watch.{}: unknown watcher type '{}'",
            entry.name, entry.watcher_type
        )
    })?;

    info!(watch = %entry.name, watcher = %entry.watcher_type, "Starting watch pass");

    let mut stats = WatchStats::default();
    let mut candidates = watcher.discover(&entry.args).await?;

    while let Some(candidate) = candidates.next().await {
        let url = candidate?;
        stats.discovered += 1;

        if store.exists(&fingerprint(&url)).await? {
            stats.skipped += 1;
            continue;
        }

        let artifact = store.ensure(&url).await?;
        debug!(url = %artifact.url, fingerprint = %artifact.fingerprint, "Recorded artifact");
        stats.created += 1;
    }

    info!(
        watch = %entry.name,
        discovered = stats.discovered,
        created = stats.created,
        skipped = stats.skipped,
        "Watch pass complete"
    );

    Ok(stats)
}
