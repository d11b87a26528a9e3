//! # Magpie CLI
//!
//! The `magpie` binary drives the discovery/fetch pipeline. All commands
//! accept a `--config` flag pointing to a TOML configuration file.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `magpie init` | Create the SQLite database and run schema migrations |
//! | `magpie sources` | List watcher types, watch entries, and download providers |
//! | `magpie watch [NAME]` | Run one watch pass for all (or one) configured entries |
//! | `magpie enqueue` | Run one enqueue pass and drain the dispatched fetches |
//! | `magpie fetch <FINGERPRINT>` | Fetch a single artifact |
//! | `magpie run` | Run the scheduler and fetch worker pool |
//! | `magpie admin refingerprint` | Recompute fingerprints, removing duplicates |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use magpie::config;
use magpie::context::AppContext;
use magpie::queue::{spawn_workers, FetchQueue};
use magpie::{enqueue, fetch, maintenance, migrate, schedule, sources, watch};

/// Magpie — scheduled content discovery, dedup, and content-addressed
/// archival.
#[derive(Parser)]
#[command(
    name = "magpie",
    about = "Magpie — scheduled content discovery, dedup, and content-addressed archival",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/magpie.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the artifact table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// List watcher types, configured watch entries, and download providers.
    Sources,

    /// Run one watch pass.
    ///
    /// Discovers candidates for every configured watch entry (or only the
    /// named one) and records new artifacts.
    Watch {
        /// Name of a single watch entry to run.
        name: Option<String>,
    },

    /// Run one enqueue pass.
    ///
    /// Dispatches every unprocessed artifact to the fetch workers, waits for
    /// the queue to drain, then exits.
    Enqueue,

    /// Fetch a single artifact by fingerprint.
    Fetch {
        /// The artifact fingerprint (SHA-256 hex of the normalized URL).
        fingerprint: String,
    },

    /// Run the recurring scheduler and fetch worker pool until ctrl-c.
    Run,

    /// Administrative maintenance operations (destructive).
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

/// Maintenance subcommands.
#[derive(Subcommand)]
enum AdminAction {
    /// Recompute every artifact's fingerprint from its URL.
    ///
    /// Artifacts whose recomputed fingerprint duplicates another's are
    /// deleted. Destructive — intended for use after a normalization-rule
    /// change, never scheduled.
    Refingerprint,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let ctx = AppContext::build(cfg).await?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(ctx.store.pool()).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&ctx)?;
        }
        Commands::Watch { name } => {
            let entries: Vec<_> = match &name {
                Some(name) => {
                    let entry = ctx
                        .config
                        .watch
                        .iter()
                        .find(|w| &w.name == name)
                        .ok_or_else(|| anyhow::anyhow!("No watch entry named '{}'", name))?;
                    vec![entry.clone()]
                }
                None => ctx.config.watch.clone(),
            };

            for entry in entries {
                let stats = watch::run_watch(&ctx.store, &ctx.watchers, &entry).await?;
                println!(
                    "watch {}: discovered {} (new {}, known {})",
                    entry.name, stats.discovered, stats.created, stats.skipped
                );
            }
        }
        Commands::Enqueue => {
            let (queue, rx) = FetchQueue::new(ctx.config.queue.capacity);
            let workers = spawn_workers(ctx.clone(), rx, ctx.config.queue.workers);

            let dispatched = enqueue::run_enqueue(&ctx, &queue).await?;

            // Closing the queue lets the workers drain and exit.
            drop(queue);
            for worker in workers {
                worker.await?;
            }
            println!("enqueue: dispatched {dispatched}");
        }
        Commands::Fetch { fingerprint } => {
            let outcome = fetch::fetch_artifact(&ctx, &fingerprint).await?;
            println!("fetch {fingerprint}: {outcome:?}");
        }
        Commands::Run => {
            schedule::run_app(ctx).await?;
        }
        Commands::Admin { action } => match action {
            AdminAction::Refingerprint => {
                let stats = maintenance::refingerprint(&ctx).await?;
                println!(
                    "refingerprint: scanned {}, rewritten {}, deleted {}",
                    stats.scanned, stats.rewritten, stats.deleted
                );
            }
        },
    }

    Ok(())
}
