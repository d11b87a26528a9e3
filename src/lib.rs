//! # Magpie
//!
//! A scheduled content discovery, dedup, and content-addressed archival
//! engine.
//!
//! Magpie watches external sources for content URLs on a schedule,
//! deduplicates them by a fingerprint of the normalized URL, and fetches
//! each item's bytes exactly once into a checksum-sharded content store,
//! tracking per-item lifecycle state in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐    ┌───────────────┐    ┌──────────────┐
//! │ Watchers │───▶│ Watch pass    │───▶│ Artifact     │
//! │ (reddit) │    │ (dedup)       │    │ store (SQLite)│
//! └──────────┘    └───────────────┘    └──────┬───────┘
//!                                             │ iter_unprocessed
//!                                             ▼
//!                  ┌───────────────┐    ┌──────────────┐
//!                  │ Fetch workers │◀───│ Enqueue pass │
//!                  │ download +    │    │ (dispatch +  │
//!                  │ place + mark  │    │  mark)       │
//!                  └──────┬────────┘    └──────────────┘
//!                         ▼
//!                  root/ab/cd/abcd….ext   (content store)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Artifact record and fetch-message constants |
//! | [`fingerprint`] | URL normalization + dedup fingerprint |
//! | [`hasher`] | Streaming content hashing |
//! | [`store`] | Artifact store (dedup + lifecycle transitions) |
//! | [`content_store`] | Checksum-sharded placement |
//! | [`watch`] | Watcher contract and watch pass |
//! | [`download`] | Download provider contract |
//! | [`fetch`] | Fetch/placement engine |
//! | [`enqueue`] | Enqueue pass |
//! | [`queue`] | Fetch queue and worker pool |
//! | [`schedule`] | Recurring scheduler (`run`) |
//! | [`maintenance`] | Administrative fingerprint recomputation |

pub mod config;
pub mod content_store;
pub mod context;
pub mod db;
pub mod download;
pub mod download_http;
pub mod enqueue;
pub mod fetch;
pub mod fingerprint;
pub mod hasher;
pub mod maintenance;
pub mod migrate;
pub mod models;
pub mod queue;
pub mod schedule;
pub mod sources;
pub mod store;
pub mod watch;
pub mod watcher_reddit;
