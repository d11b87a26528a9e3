use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub content_store: ContentStoreConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
    pub enqueue: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentStoreConfig {
    /// Root directory for content-addressed placement.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Bound on in-flight fetch dispatches; the enqueue pass backpressures
    /// once the queue is full.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Number of concurrent fetch workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            workers: default_workers(),
        }
    }
}

fn default_capacity() -> usize {
    256
}
fn default_workers() -> usize {
    4
}

/// One recurring discovery task: a named watcher instance plus its schedule
/// and watcher-specific arguments.
#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    /// Unique label for this watch entry (used in logs and `magpie watch`).
    pub name: String,
    /// Watcher type to dispatch to (must be registered, e.g. `"subreddit"`).
    #[serde(rename = "type")]
    pub watcher_type: String,
    pub schedule: ScheduleConfig,
    /// Watcher-specific arguments, validated by the watcher at setup time.
    #[serde(default = "default_args")]
    pub args: toml::Value,
}

fn default_args() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Seconds between recurring invocations.
    pub interval_secs: u64,
    /// Fire once immediately when the scheduler starts.
    #[serde(default)]
    pub immediate: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 900,
            immediate: false,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.queue.capacity == 0 {
        anyhow::bail!("queue.capacity must be > 0");
    }
    if config.queue.workers == 0 {
        anyhow::bail!("queue.workers must be > 0");
    }
    if config.enqueue.interval_secs == 0 {
        anyhow::bail!("enqueue.interval_secs must be > 0");
    }

    let mut seen = std::collections::HashSet::new();
    for watch in &config.watch {
        if watch.name.is_empty() {
            anyhow::bail!("watch entries must have a non-empty name");
        }
        if !seen.insert(watch.name.as_str()) {
            anyhow::bail!("Duplicate watch entry name: '{}'", watch.name);
        }
        if watch.schedule.interval_secs == 0 {
            anyhow::bail!("watch.{}.schedule.interval_secs must be > 0", watch.name);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("magpie.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_config_loads_with_defaults() {
        let (_dir, path) = write_config(
            r#"
            [db]
            path = "/tmp/magpie.sqlite"

            [content_store]
            root = "/tmp/store"

            [enqueue]
            interval_secs = 60
            "#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.queue.capacity, 256);
        assert_eq!(config.queue.workers, 4);
        assert!(config.watch.is_empty());
        assert!(!config.enqueue.immediate);
    }

    #[test]
    fn duplicate_watch_names_are_rejected() {
        let (_dir, path) = write_config(
            r#"
            [db]
            path = "/tmp/magpie.sqlite"

            [content_store]
            root = "/tmp/store"

            [enqueue]
            interval_secs = 60

            [[watch]]
            name = "pics"
            type = "subreddit"
            schedule = { interval_secs = 300 }

            [[watch]]
            name = "pics"
            type = "subreddit"
            schedule = { interval_secs = 300 }
            "#,
        );

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Duplicate watch entry"));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let (_dir, path) = write_config(
            r#"
            [db]
            path = "/tmp/magpie.sqlite"

            [content_store]
            root = "/tmp/store"

            [enqueue]
            interval_secs = 0
            "#,
        );

        assert!(load_config(&path).is_err());
    }
}
