//! Administrative maintenance operations.
//!
//! These are destructive and explicitly invoked (`magpie admin ...`), never
//! scheduled. Refingerprinting is the only operation allowed to rewrite an
//! artifact's fingerprint or delete artifact rows.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::fingerprint::fingerprint;
use crate::models::Artifact;

/// Counters for one refingerprint run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefingerprintStats {
    pub scanned: u64,
    pub rewritten: u64,
    pub deleted: u64,
}

/// Recompute every artifact's fingerprint from its URL.
///
/// Run after a normalization-rule change. Artifacts whose recomputed
/// fingerprint collides with one already claimed in this run are deleted —
/// they were duplicates under the current rules. Rows are visited in
/// creation order, so the oldest artifact wins each collision.
pub async fn refingerprint(ctx: &AppContext) -> Result<RefingerprintStats> {
    let mut stats = RefingerprintStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rewrites: Vec<(String, String)> = Vec::new();

    let artifacts: Vec<Artifact> =
        sqlx::query_as("SELECT * FROM artifact ORDER BY rowid")
            .fetch_all(ctx.store.pool())
            .await?;

    for artifact in artifacts {
        stats.scanned += 1;
        let recomputed = fingerprint(&artifact.url);

        if !seen.insert(recomputed.clone()) {
            warn!(
                id = %artifact.id,
                url = %artifact.url,
                fingerprint = %recomputed,
                "Removing duplicate artifact for recomputed fingerprint"
            );
            sqlx::query("DELETE FROM artifact WHERE id = ?")
                .bind(&artifact.id)
                .execute(ctx.store.pool())
                .await?;
            stats.deleted += 1;
            continue;
        }

        if recomputed != artifact.fingerprint {
            rewrites.push((artifact.id, recomputed));
        }
    }

    // Two passes so a rewrite never transiently collides with another row's
    // stale fingerprint: stage unique placeholders first, then finals.
    for (id, _) in &rewrites {
        sqlx::query("UPDATE artifact SET fingerprint = ? WHERE id = ?")
            .bind(format!("rewriting:{id}"))
            .bind(id)
            .execute(ctx.store.pool())
            .await?;
    }
    for (id, recomputed) in &rewrites {
        info!(id = %id, fingerprint = %recomputed, "Rewriting artifact fingerprint");
        sqlx::query("UPDATE artifact SET fingerprint = ? WHERE id = ?")
            .bind(recomputed)
            .bind(id)
            .execute(ctx.store.pool())
            .await?;
        stats.rewritten += 1;
    }

    info!(
        scanned = stats.scanned,
        rewritten = stats.rewritten,
        deleted = stats.deleted,
        "Refingerprint complete"
    );
    Ok(stats)
}
