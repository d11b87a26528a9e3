//! End-to-end pipeline behavior: watch → enqueue → fetch → placement,
//! driven by stub watcher and download-provider implementations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tempfile::TempDir;

use magpie::config::{
    Config, ContentStoreConfig, DbConfig, QueueConfig, ScheduleConfig, WatchConfig,
};
use magpie::content_store::ContentStore;
use magpie::context::AppContext;
use magpie::db;
use magpie::download::{ContentDescriptor, DownloadProvider, DownloadRegistry, SuppliedChecksum};
use magpie::enqueue::run_enqueue;
use magpie::fetch::{fetch_artifact, FetchOutcome};
use magpie::hasher::HashAlgorithm;
use magpie::migrate;
use magpie::models::{FETCH_CHECKSUM_CONFLICT, FETCH_SUCCESS, FETCH_UNHANDLED};
use magpie::queue::{spawn_workers, FetchQueue};
use magpie::store::ArtifactStore;
use magpie::watch::{run_watch, Watcher, WatcherRegistry};

/// Watcher yielding a fixed candidate list.
struct StubWatcher {
    urls: Vec<String>,
}

#[async_trait]
impl Watcher for StubWatcher {
    fn type_name(&self) -> &str {
        "stub"
    }

    fn validate_args(&self, _args: &toml::Value) -> Result<()> {
        Ok(())
    }

    async fn discover<'a>(
        &'a self,
        _args: &toml::Value,
    ) -> Result<BoxStream<'a, Result<String>>> {
        Ok(futures::stream::iter(self.urls.iter().cloned().map(Ok)).boxed())
    }
}

/// Provider serving bytes from an in-memory map keyed by URL.
struct StubProvider {
    payloads: HashMap<String, Vec<u8>>,
    checksums: HashMap<String, Vec<SuppliedChecksum>>,
    fail: AtomicBool,
}

impl StubProvider {
    fn new(payloads: HashMap<String, Vec<u8>>) -> Self {
        Self {
            payloads,
            checksums: HashMap::new(),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DownloadProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn handles(&self, url: &str) -> bool {
        self.payloads.contains_key(url)
    }

    async fn descriptors(&self, url: &str) -> Result<Vec<ContentDescriptor>> {
        Ok(vec![ContentDescriptor {
            url: url.to_string(),
            filename: "payload.bin".to_string(),
            ranking: 0,
            checksums: self.checksums.get(url).cloned().unwrap_or_default(),
        }])
    }

    async fn materialize(&self, descriptor: &ContentDescriptor, dest: &Path) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("stub transport failure");
        }
        let bytes = self
            .payloads
            .get(&descriptor.url)
            .ok_or_else(|| anyhow::anyhow!("no payload for {}", descriptor.url))?;
        std::fs::write(dest, bytes)?;
        Ok(())
    }
}

fn watch_entry(name: &str) -> WatchConfig {
    WatchConfig {
        name: name.to_string(),
        watcher_type: "stub".to_string(),
        schedule: ScheduleConfig::default(),
        args: toml::Value::Table(toml::map::Map::new()),
    }
}

async fn setup(
    urls: Vec<&str>,
    provider: Arc<StubProvider>,
) -> (TempDir, Arc<AppContext>) {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        db: DbConfig {
            path: tmp.path().join("magpie.sqlite"),
        },
        content_store: ContentStoreConfig {
            root: tmp.path().join("store"),
        },
        queue: QueueConfig::default(),
        watch: vec![watch_entry("stub-watch")],
        enqueue: ScheduleConfig::default(),
    };

    let pool = db::connect(&config.db).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let mut watchers = WatcherRegistry::new();
    watchers.register(Arc::new(StubWatcher {
        urls: urls.into_iter().map(String::from).collect(),
    }));

    let mut downloads = DownloadRegistry::new();
    downloads.register(provider);

    let content = ContentStore::new(config.content_store.root.clone());
    let ctx = Arc::new(AppContext {
        config,
        store: ArtifactStore::new(pool),
        content,
        downloads,
        watchers,
    });

    (tmp, ctx)
}

/// Run one enqueue pass and drain all dispatched fetches.
async fn enqueue_and_drain(ctx: &Arc<AppContext>) -> u64 {
    let (queue, rx) = FetchQueue::new(ctx.config.queue.capacity);
    let workers = spawn_workers(ctx.clone(), rx, 2);
    let dispatched = run_enqueue(ctx, &queue).await.unwrap();
    drop(queue);
    for worker in workers {
        worker.await.unwrap();
    }
    dispatched
}

fn payloads(entries: &[(&str, &[u8])]) -> HashMap<String, Vec<u8>> {
    entries
        .iter()
        .map(|(url, bytes)| (url.to_string(), bytes.to_vec()))
        .collect()
}

#[test]
fn unknown_watcher_types_fail_validation() {
    let mut watchers = WatcherRegistry::new();
    watchers.register(Arc::new(StubWatcher { urls: vec![] }));

    let mut entry = watch_entry("misconfigured");
    entry.watcher_type = "unregistered".to_string();

    let err = watchers.validate(&[entry]).unwrap_err();
    assert!(err.to_string().contains("unknown watcher type"));
}

#[tokio::test]
async fn watch_pass_records_each_fingerprint_once() {
    let provider = Arc::new(StubProvider::new(HashMap::new()));
    let (_tmp, ctx) = setup(
        vec![
            "https://example.com/a",
            "https://example.com/b",
            // Equivalent spellings of /a: already recorded, skipped silently.
            "https://example.com/a/",
            "HTTPS://EXAMPLE.com/a",
        ],
        provider,
    )
    .await;

    let entry = &ctx.config.watch[0];
    let stats = run_watch(&ctx.store, &ctx.watchers, entry).await.unwrap();
    assert_eq!(stats.discovered, 4);
    assert_eq!(stats.created, 2);
    assert_eq!(stats.skipped, 2);

    // A second pass discovers the same candidates but creates nothing.
    let stats = run_watch(&ctx.store, &ctx.watchers, entry).await.unwrap();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.skipped, 4);
}

#[tokio::test]
async fn full_cycle_places_bytes_and_marks_terminal_state() {
    let url = "https://example.com/cat.jpg";
    let provider = Arc::new(StubProvider::new(payloads(&[(url, b"cat bytes")])));
    let (_tmp, ctx) = setup(vec![url], provider).await;

    run_watch(&ctx.store, &ctx.watchers, &ctx.config.watch[0])
        .await
        .unwrap();

    let dispatched = enqueue_and_drain(&ctx).await;
    assert_eq!(dispatched, 1);

    let checksum = blake3::hash(b"cat bytes").to_hex().to_string();
    // Extension comes from the descriptor filename, not the URL.
    let destination = ctx.content.path_for(&checksum, Some("bin"));
    assert_eq!(std::fs::read(&destination).unwrap(), b"cat bytes");

    let fp = magpie::fingerprint::fingerprint(url);
    let artifact = ctx.store.get(&fp).await.unwrap().unwrap();
    assert!(artifact.is_processed());
    assert_eq!(artifact.fetched_message.as_deref(), Some(FETCH_SUCCESS));

    // Nothing left to dispatch on the next pass.
    assert_eq!(enqueue_and_drain(&ctx).await, 0);
}

#[tokio::test]
async fn refetching_a_fetched_artifact_is_a_no_op() {
    let url = "https://example.com/cat.jpg";
    let provider = Arc::new(StubProvider::new(payloads(&[(url, b"cat bytes")])));
    let (_tmp, ctx) = setup(vec![url], provider).await;

    let artifact = ctx.store.ensure(url).await.unwrap();
    let first = fetch_artifact(&ctx, &artifact.fingerprint).await.unwrap();
    assert_eq!(first, FetchOutcome::Success);

    // Re-delivered job (simulated crash-and-retry after the mark): the
    // terminal pair is write-once, so nothing runs again.
    let second = fetch_artifact(&ctx, &artifact.fingerprint).await.unwrap();
    assert_eq!(second, FetchOutcome::AlreadyFetched);

    let reread = ctx.store.get(&artifact.fingerprint).await.unwrap().unwrap();
    assert_eq!(reread.fetched_message.as_deref(), Some(FETCH_SUCCESS));
}

#[tokio::test]
async fn identical_content_from_different_urls_is_placed_once() {
    let first_url = "https://example.com/one.jpg";
    let second_url = "https://mirror.example.com/two.jpg";
    let provider = Arc::new(StubProvider::new(payloads(&[
        (first_url, b"same bytes"),
        (second_url, b"same bytes"),
    ])));
    let (_tmp, ctx) = setup(vec![first_url, second_url], provider).await;

    let a = ctx.store.ensure(first_url).await.unwrap();
    let b = ctx.store.ensure(second_url).await.unwrap();

    assert_eq!(
        fetch_artifact(&ctx, &a.fingerprint).await.unwrap(),
        FetchOutcome::Success
    );
    // Same checksum, destination already present: trusted, not rewritten.
    assert_eq!(
        fetch_artifact(&ctx, &b.fingerprint).await.unwrap(),
        FetchOutcome::Skipped
    );

    let checksum = blake3::hash(b"same bytes").to_hex().to_string();
    let destination = ctx.content.path_for(&checksum, Some("bin"));
    assert_eq!(std::fs::read(&destination).unwrap(), b"same bytes");
}

#[tokio::test]
async fn unresolvable_urls_are_terminal_unhandled() {
    // Provider handles nothing.
    let provider = Arc::new(StubProvider::new(HashMap::new()));
    let (_tmp, ctx) = setup(vec!["https://example.com/a"], provider).await;

    let artifact = ctx.store.ensure("https://example.com/a").await.unwrap();
    let outcome = fetch_artifact(&ctx, &artifact.fingerprint).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Unhandled);

    let reread = ctx.store.get(&artifact.fingerprint).await.unwrap().unwrap();
    assert!(reread.fetched_at.is_some());
    assert_eq!(reread.fetched_message.as_deref(), Some(FETCH_UNHANDLED));
}

#[tokio::test]
async fn transient_failures_leave_no_mark_and_retry_cleanly() {
    let url = "https://example.com/flaky.jpg";
    let provider = Arc::new(StubProvider::new(payloads(&[(url, b"flaky bytes")])));
    let (_tmp, ctx) = setup(vec![url], provider.clone()).await;

    let artifact = ctx.store.ensure(url).await.unwrap();

    provider.fail.store(true, Ordering::SeqCst);
    assert!(fetch_artifact(&ctx, &artifact.fingerprint).await.is_err());

    // No terminal mark: the artifact is still unfetched and will be retried.
    let reread = ctx.store.get(&artifact.fingerprint).await.unwrap().unwrap();
    assert!(reread.fetched_at.is_none());
    let unfetched: Vec<_> = ctx.store.iter_unfetched().try_collect().await.unwrap();
    assert_eq!(unfetched.len(), 1);

    provider.fail.store(false, Ordering::SeqCst);
    assert_eq!(
        fetch_artifact(&ctx, &artifact.fingerprint).await.unwrap(),
        FetchOutcome::Success
    );
}

#[tokio::test]
async fn checksum_conflicts_never_overwrite_existing_bytes() {
    let first_url = "https://example.com/original.jpg";
    let second_url = "https://example.com/imposter.jpg";

    let mut provider = StubProvider::new(payloads(&[
        (first_url, b"original bytes"),
        // The imposter claims the same destination (stub content collides)
        // but supplies a checksum that does not match what is on disk.
        (second_url, b"original bytes"),
    ]));
    provider.checksums.insert(
        second_url.to_string(),
        vec![SuppliedChecksum {
            algorithm: HashAlgorithm::Sha256,
            value: "0".repeat(64),
        }],
    );
    let provider = Arc::new(provider);
    let (_tmp, ctx) = setup(vec![first_url, second_url], provider).await;

    let a = ctx.store.ensure(first_url).await.unwrap();
    let b = ctx.store.ensure(second_url).await.unwrap();

    assert_eq!(
        fetch_artifact(&ctx, &a.fingerprint).await.unwrap(),
        FetchOutcome::Success
    );
    assert_eq!(
        fetch_artifact(&ctx, &b.fingerprint).await.unwrap(),
        FetchOutcome::ChecksumConflict
    );

    let reread = ctx.store.get(&b.fingerprint).await.unwrap().unwrap();
    assert_eq!(
        reread.fetched_message.as_deref(),
        Some(FETCH_CHECKSUM_CONFLICT)
    );

    let checksum = blake3::hash(b"original bytes").to_hex().to_string();
    let destination = ctx.content.path_for(&checksum, Some("bin"));
    assert_eq!(std::fs::read(&destination).unwrap(), b"original bytes");
}

#[tokio::test]
async fn refingerprint_removes_duplicates_under_current_rules() {
    let provider = Arc::new(StubProvider::new(HashMap::new()));
    let (_tmp, ctx) = setup(vec![], provider).await;

    let keeper = ctx.store.ensure("https://example.com/a").await.unwrap();
    ctx.store.ensure("https://example.com/b").await.unwrap();

    // Simulate a stale fingerprint from an older normalization rule: a
    // second row whose URL now normalizes identically to the first.
    sqlx::query("INSERT INTO artifact (id, created_at, fingerprint, url) VALUES (?, ?, ?, ?)")
        .bind("stale-row")
        .bind(0i64)
        .bind("stale-fingerprint")
        .bind("https://example.com/a/")
        .execute(ctx.store.pool())
        .await
        .unwrap();

    let stats = magpie::maintenance::refingerprint(&ctx).await.unwrap();
    assert_eq!(stats.scanned, 3);
    assert_eq!(stats.deleted, 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artifact")
        .fetch_one(ctx.store.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
    // The older row for the colliding fingerprint survives.
    assert!(ctx.store.get(&keeper.fingerprint).await.unwrap().is_some());
}
