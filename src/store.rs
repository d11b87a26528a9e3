//! The artifact store: the single source of truth for dedup and lifecycle.
//!
//! All artifact mutation flows through [`ArtifactStore`] — creation at the
//! dedup boundary ([`ensure`](ArtifactStore::ensure)), and the two write-once
//! lifecycle transitions ([`mark_processed`](ArtifactStore::mark_processed),
//! [`mark_fetched`](ArtifactStore::mark_fetched)). No other component holds a
//! writable reference across the persistence boundary.
//!
//! Concurrent creates for the same fingerprint are serialized by the UNIQUE
//! constraint on the `fingerprint` column: the losing writer gets
//! [`StoreError::DuplicateFingerprint`], which `ensure` absorbs by re-reading
//! the winning row.

use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::fingerprint::fingerprint;
use crate::models::Artifact;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced artifact id no longer exists.
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// A concurrent insert already claimed this fingerprint. Recoverable:
    /// re-read the existing record instead of treating this as a failure.
    #[error("artifact fingerprint already exists: {0}")]
    DuplicateFingerprint(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pool: SqlitePool,
}

impl ArtifactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// True iff an artifact with this fingerprint exists.
    ///
    /// Safe to call concurrently with creation; a false result only means
    /// the fingerprint was absent at read time, and the UNIQUE constraint
    /// still guards the subsequent insert.
    pub async fn exists(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let present: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM artifact WHERE fingerprint = ?")
                .bind(fingerprint)
                .fetch_optional(&self.pool)
                .await?;
        Ok(present.is_some())
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<Artifact>, StoreError> {
        let artifact = sqlx::query_as::<_, Artifact>(
            "SELECT * FROM artifact WHERE fingerprint = ?",
        )
        .bind(fingerprint)
        .fetch_optional(&self.pool)
        .await?;
        Ok(artifact)
    }

    /// Insert a new artifact for this URL with null status fields.
    ///
    /// Fails with [`StoreError::DuplicateFingerprint`] when a concurrent
    /// insert already claimed the fingerprint; callers should re-read via
    /// [`get`](ArtifactStore::get) (or use [`ensure`](ArtifactStore::ensure)).
    pub async fn create(&self, url: &str) -> Result<Artifact, StoreError> {
        let artifact = Artifact {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now().timestamp(),
            fingerprint: fingerprint(url),
            url: url.to_string(),
            fetched_at: None,
            fetched_message: None,
            processed_at: None,
            processed_message: None,
        };

        let result = sqlx::query(
            "INSERT INTO artifact (id, created_at, fingerprint, url) VALUES (?, ?, ?, ?)",
        )
        .bind(&artifact.id)
        .bind(artifact.created_at)
        .bind(&artifact.fingerprint)
        .bind(&artifact.url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(artifact),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateFingerprint(artifact.fingerprint))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get-or-create: the dedup boundary used by discovery.
    ///
    /// Returns the winning record whether it previously existed, was created
    /// here, or was created by a racing writer.
    pub async fn ensure(&self, url: &str) -> Result<Artifact, StoreError> {
        let fp = fingerprint(url);
        if let Some(artifact) = self.get(&fp).await? {
            return Ok(artifact);
        }

        match self.create(url).await {
            Ok(artifact) => Ok(artifact),
            Err(StoreError::DuplicateFingerprint(fp)) => {
                // Lost the race; the winner's row is authoritative.
                self.get(&fp)
                    .await?
                    .ok_or(StoreError::NotFound(fp))
            }
            Err(err) => Err(err),
        }
    }

    /// Stream artifacts with no `processed_at`, in creation order.
    ///
    /// Lazy — rows are fetched as the stream is polled, never materialized
    /// wholesale. Each call restarts from the current table state; there is
    /// no persistent cursor.
    pub fn iter_unprocessed(&self) -> BoxStream<'_, Result<Artifact, StoreError>> {
        sqlx::query_as::<_, Artifact>(
            "SELECT * FROM artifact WHERE processed_at IS NULL ORDER BY rowid",
        )
        .fetch(&self.pool)
        .map(|row| row.map_err(StoreError::from))
        .boxed()
    }

    /// Stream artifacts with no `fetched_at`, in creation order.
    ///
    /// Same lazy, restartable-per-call contract as
    /// [`iter_unprocessed`](ArtifactStore::iter_unprocessed).
    pub fn iter_unfetched(&self) -> BoxStream<'_, Result<Artifact, StoreError>> {
        sqlx::query_as::<_, Artifact>(
            "SELECT * FROM artifact WHERE fetched_at IS NULL ORDER BY rowid",
        )
        .fetch(&self.pool)
        .map(|row| row.map_err(StoreError::from))
        .boxed()
    }

    /// Set the processed pair. Callers must call this at most once per
    /// artifact; the enqueue pass is the only caller in normal operation.
    pub async fn mark_processed(
        &self,
        artifact: &Artifact,
        message: &str,
    ) -> Result<Artifact, StoreError> {
        self.mark(artifact, "processed_at", "processed_message", message)
            .await
    }

    /// Set the fetched pair. Called exactly once per fetch attempt that
    /// reaches a terminal outcome.
    pub async fn mark_fetched(
        &self,
        artifact: &Artifact,
        message: &str,
    ) -> Result<Artifact, StoreError> {
        self.mark(artifact, "fetched_at", "fetched_message", message)
            .await
    }

    async fn mark(
        &self,
        artifact: &Artifact,
        at_column: &str,
        message_column: &str,
        message: &str,
    ) -> Result<Artifact, StoreError> {
        let now = Utc::now().timestamp();
        // Column names come from the two callers above, never from input.
        let query = format!(
            "UPDATE artifact SET {at_column} = ?, {message_column} = ? WHERE id = ?"
        );
        let result = sqlx::query(&query)
            .bind(now)
            .bind(message)
            .bind(&artifact.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(artifact.id.clone()));
        }

        let mut updated = artifact.clone();
        if at_column == "processed_at" {
            updated.processed_at = Some(now);
            updated.processed_message = Some(message.to_string());
        } else {
            updated.fetched_at = Some(now);
            updated.fetched_message = Some(message.to_string());
        }
        Ok(updated)
    }
}
