use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::{ActivoModelo, ActivoUnidad, Notification, QueuedMutation};
use crate::shared::error::AppError;

/// Durable, asynchronous, partitioned client-side storage: entity snapshot
/// caches, the pending-mutation queue, and the persisted notification ring.
/// Every call is an independent transaction; there is no cross-call
/// transactionality.
#[async_trait]
pub trait OfflineStorePort: Send + Sync {
    async fn load_activos(&self) -> Result<Vec<ActivoModelo>, AppError>;
    async fn load_unidades(&self) -> Result<Vec<ActivoUnidad>, AppError>;

    /// Upserts every record (insert-or-replace by entity id) inside one
    /// transaction; a single failed put rolls back the whole call.
    async fn put_activos(&self, records: &[ActivoModelo]) -> Result<(), AppError>;
    async fn put_unidades(&self, records: &[ActivoUnidad]) -> Result<(), AppError>;

    /// Appends unless a live entry with the same `(kind, data.id)` already
    /// exists, in which case the duplicate is silently dropped and `false`
    /// is returned. Check and insert run in a single transaction.
    async fn enqueue_mutation(&self, mutation: QueuedMutation) -> Result<bool, AppError>;

    /// Pending entries in insertion order.
    async fn queue_snapshot(&self) -> Result<Vec<QueuedMutation>, AppError>;
    async fn clear_queue(&self) -> Result<(), AppError>;
    async fn remove_mutation(&self, local_id: Uuid) -> Result<(), AppError>;

    /// Bumps the retry counter and parks the entry as failed once the budget
    /// is exhausted.
    async fn mark_mutation_failed(&self, local_id: Uuid, error: &str) -> Result<(), AppError>;
    async fn failed_mutations(&self) -> Result<Vec<QueuedMutation>, AppError>;

    async fn load_notifications(&self) -> Result<Vec<Notification>, AppError>;
    async fn save_notifications(&self, entries: &[Notification]) -> Result<(), AppError>;
}
