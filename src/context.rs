//! Application context: explicitly constructed, explicitly passed.
//!
//! Everything stateful lives here — the artifact store (SQLite pool), the
//! content store, and the watcher/download registries. Construction order is
//! config → database pool → stores → registries; teardown is dropping the
//! context, which closes the pool with it.

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::content_store::ContentStore;
use crate::db;
use crate::download::DownloadRegistry;
use crate::download_http::HttpDownloadProvider;
use crate::store::ArtifactStore;
use crate::watch::WatcherRegistry;
use crate::watcher_reddit::SubredditWatcher;

pub struct AppContext {
    pub config: Config,
    pub store: ArtifactStore,
    pub content: ContentStore,
    pub downloads: DownloadRegistry,
    pub watchers: WatcherRegistry,
}

impl AppContext {
    /// Build the full application context with the built-in watcher and
    /// download provider registered, and every configured watch entry
    /// validated.
    pub async fn build(config: Config) -> Result<Arc<Self>> {
        let pool = db::connect(&config.db).await?;
        let store = ArtifactStore::new(pool);
        let content = ContentStore::new(config.content_store.root.clone());

        let mut watchers = WatcherRegistry::new();
        watchers.register(Arc::new(SubredditWatcher::new()?));
        watchers.validate(&config.watch)?;

        let mut downloads = DownloadRegistry::new();
        downloads.register(Arc::new(HttpDownloadProvider::new()?));

        Ok(Arc::new(Self {
            config,
            store,
            content,
            downloads,
            watchers,
        }))
    }
}
