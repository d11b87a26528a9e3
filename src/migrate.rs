use anyhow::Result;
use sqlx::SqlitePool;

/// Create the artifact schema. Idempotent — safe to run on every start.
///
/// The UNIQUE constraint on `fingerprint` is the serialization point for
/// concurrent creates: the losing insert surfaces as a constraint violation
/// that the store maps to `StoreError::DuplicateFingerprint`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifact (
            id TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL,
            fingerprint TEXT NOT NULL UNIQUE,
            url TEXT NOT NULL,
            fetched_at INTEGER,
            fetched_message TEXT,
            processed_at INTEGER,
            processed_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_artifact_processed_at ON artifact(processed_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifact_fetched_at ON artifact(fetched_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifact_created_at ON artifact(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}
