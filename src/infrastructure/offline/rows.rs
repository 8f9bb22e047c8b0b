use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::entities::{
    ActivoModelo, ActivoUnidad, MutationKind, MutationStatus, Notification, NotificationKind,
    QueuedMutation,
};
use crate::shared::error::AppError;

/// Snapshot partitions store the full entity as a JSON blob keyed by the
/// server-assigned id, so a put is an insert-or-replace by key.
#[derive(Debug, Clone, FromRow)]
pub struct SnapshotRow {
    pub data: String,
}

impl SnapshotRow {
    pub fn into_activo(self) -> Result<ActivoModelo, AppError> {
        serde_json::from_str(&self.data).map_err(|e| AppError::Serialization(e.to_string()))
    }

    pub fn into_unidad(self) -> Result<ActivoUnidad, AppError> {
        serde_json::from_str(&self.data).map_err(|e| AppError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MutationRow {
    pub local_id: String,
    pub kind: String,
    pub data: String,
    pub status: String,
    pub retry_count: i64,
    pub max_retries: i64,
    pub created_at: i64,
}

impl MutationRow {
    pub fn into_domain(self) -> Result<QueuedMutation, AppError> {
        Ok(QueuedMutation {
            local_id: Uuid::parse_str(&self.local_id)?,
            kind: MutationKind::parse(&self.kind).map_err(AppError::Serialization)?,
            data: serde_json::from_str(&self.data)?,
            status: MutationStatus::parse(&self.status).map_err(AppError::Serialization)?,
            retry_count: self.retry_count as u32,
            max_retries: self.max_retries as u32,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub kind: String,
    pub message: String,
    pub timestamp: i64,
}

impl NotificationRow {
    pub fn into_domain(self) -> Result<Notification, AppError> {
        Ok(Notification {
            kind: NotificationKind::parse(&self.kind).map_err(AppError::Serialization)?,
            message: self.message,
            timestamp: self.timestamp,
        })
    }
}
