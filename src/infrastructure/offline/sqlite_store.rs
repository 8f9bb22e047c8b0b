use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor, Pool, Sqlite};
use std::time::Duration;
use uuid::Uuid;

use super::rows::{MutationRow, NotificationRow, SnapshotRow};
use crate::application::ports::OfflineStorePort;
use crate::domain::entities::{ActivoModelo, ActivoUnidad, Notification, QueuedMutation};
use crate::shared::config::DatabaseConfig;
use crate::shared::error::AppError;

/// SQLite-backed local persistence store. Partitions: `cache_activos`,
/// `cache_unidades`, `mutation_queue`, `notifications`.
pub struct SqliteOfflineStore {
    pool: Pool<Sqlite>,
}

impl SqliteOfflineStore {
    /// Idempotently opens the database and provisions every partition.
    /// Concurrent opens land on the same underlying database; the
    /// `IF NOT EXISTS` provisioning makes the second open a no-op.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, provisioning partitions first.
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self, AppError> {
        let store = Self { pool };
        store.provision().await?;
        Ok(store)
    }

    async fn provision(&self) -> Result<(), AppError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS cache_activos (
                id INTEGER PRIMARY KEY,
                data TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS cache_unidades (
                id INTEGER PRIMARY KEY,
                data TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS mutation_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                local_id TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                target_id INTEGER NOT NULL,
                data TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 3,
                error_message TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )
            "#,
        ];

        for statement in statements {
            self.pool
                .execute(statement)
                .await
                .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        }

        Ok(())
    }

    async fn load_snapshots(&self, partition: &str) -> Result<Vec<SnapshotRow>, AppError> {
        let query = format!("SELECT data FROM {partition} ORDER BY id ASC");
        sqlx::query_as::<_, SnapshotRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::StorageRead(e.to_string()))
    }

    async fn put_snapshots(
        &self,
        partition: &str,
        records: &[(i64, String)],
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        let query = format!(
            "INSERT INTO {partition} (id, data) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data"
        );
        for (id, data) in records {
            sqlx::query(&query)
                .bind(id)
                .bind(data)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::StorageWrite(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))
    }
}

#[async_trait]
impl OfflineStorePort for SqliteOfflineStore {
    async fn load_activos(&self) -> Result<Vec<ActivoModelo>, AppError> {
        self.load_snapshots("cache_activos")
            .await?
            .into_iter()
            .map(SnapshotRow::into_activo)
            .collect()
    }

    async fn load_unidades(&self) -> Result<Vec<ActivoUnidad>, AppError> {
        self.load_snapshots("cache_unidades")
            .await?
            .into_iter()
            .map(SnapshotRow::into_unidad)
            .collect()
    }

    async fn put_activos(&self, records: &[ActivoModelo]) -> Result<(), AppError> {
        let rows = records
            .iter()
            .map(|r| Ok((r.id, serde_json::to_string(r)?)))
            .collect::<Result<Vec<_>, AppError>>()?;
        self.put_snapshots("cache_activos", &rows).await
    }

    async fn put_unidades(&self, records: &[ActivoUnidad]) -> Result<(), AppError> {
        let rows = records
            .iter()
            .map(|r| Ok((r.id, serde_json::to_string(r)?)))
            .collect::<Result<Vec<_>, AppError>>()?;
        self.put_snapshots("cache_unidades", &rows).await
    }

    async fn enqueue_mutation(&self, mutation: QueuedMutation) -> Result<bool, AppError> {
        let target_id = mutation.target_id().ok_or_else(|| {
            AppError::InvalidInput("Mutation payload must carry a numeric entity id".to_string())
        })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        // Duplicate check and insert run inside one transaction so the
        // invariant holds even with concurrent enqueuers.
        let pending = sqlx::query(
            r#"
            SELECT id FROM mutation_queue
            WHERE kind = ?1 AND target_id = ?2 AND status = 'pending'
            LIMIT 1
            "#,
        )
        .bind(mutation.kind.as_str())
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::StorageRead(e.to_string()))?;

        if pending.is_some() {
            return Ok(false);
        }

        // A re-submission supersedes a parked entry for the same action:
        // refresh it in place with the new payload and a fresh retry budget.
        let revived = sqlx::query(
            r#"
            UPDATE mutation_queue
            SET local_id = ?1, data = ?2, status = 'pending',
                retry_count = 0, max_retries = ?3, error_message = NULL,
                created_at = ?4
            WHERE kind = ?5 AND target_id = ?6 AND status = 'failed'
            "#,
        )
        .bind(mutation.local_id.to_string())
        .bind(serde_json::to_string(&mutation.data)?)
        .bind(mutation.max_retries as i64)
        .bind(mutation.created_at)
        .bind(mutation.kind.as_str())
        .bind(target_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        if revived.rows_affected() > 0 {
            return tx
                .commit()
                .await
                .map(|_| true)
                .map_err(|e| AppError::StorageWrite(e.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO mutation_queue (
                local_id, kind, target_id, data, status,
                retry_count, max_retries, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(mutation.local_id.to_string())
        .bind(mutation.kind.as_str())
        .bind(target_id)
        .bind(serde_json::to_string(&mutation.data)?)
        .bind(mutation.status.as_str())
        .bind(mutation.retry_count as i64)
        .bind(mutation.max_retries as i64)
        .bind(mutation.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        Ok(true)
    }

    async fn queue_snapshot(&self) -> Result<Vec<QueuedMutation>, AppError> {
        sqlx::query_as::<_, MutationRow>(
            r#"
            SELECT local_id, kind, data, status, retry_count, max_retries, created_at
            FROM mutation_queue
            WHERE status = 'pending'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageRead(e.to_string()))?
        .into_iter()
        .map(MutationRow::into_domain)
        .collect()
    }

    async fn clear_queue(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM mutation_queue")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;
        Ok(())
    }

    async fn remove_mutation(&self, local_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM mutation_queue WHERE local_id = ?1")
            .bind(local_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;
        Ok(())
    }

    async fn mark_mutation_failed(&self, local_id: Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE mutation_queue
            SET retry_count = retry_count + 1,
                error_message = ?1,
                status = CASE
                    WHEN retry_count + 1 >= max_retries THEN 'failed'
                    ELSE status
                END
            WHERE local_id = ?2
            "#,
        )
        .bind(error)
        .bind(local_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::StorageWrite(e.to_string()))?;
        Ok(())
    }

    async fn failed_mutations(&self) -> Result<Vec<QueuedMutation>, AppError> {
        sqlx::query_as::<_, MutationRow>(
            r#"
            SELECT local_id, kind, data, status, retry_count, max_retries, created_at
            FROM mutation_queue
            WHERE status = 'failed'
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageRead(e.to_string()))?
        .into_iter()
        .map(MutationRow::into_domain)
        .collect()
    }

    async fn load_notifications(&self) -> Result<Vec<Notification>, AppError> {
        sqlx::query_as::<_, NotificationRow>(
            "SELECT kind, message, timestamp FROM notifications ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::StorageRead(e.to_string()))?
        .into_iter()
        .map(NotificationRow::into_domain)
        .collect()
    }

    async fn save_notifications(&self, entries: &[Notification]) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        sqlx::query("DELETE FROM notifications")
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO notifications (kind, message, timestamp) VALUES (?1, ?2, ?3)",
            )
            .bind(entry.kind.as_str())
            .bind(&entry.message)
            .bind(entry.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::StorageWrite(e.to_string()))
    }
}
