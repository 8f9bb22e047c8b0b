use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shared::error::AppError;

/// Discriminator for a pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "create" => Ok(MutationKind::Create),
            "update" => Ok(MutationKind::Update),
            "delete" => Ok(MutationKind::Delete),
            other => Err(format!("Unknown mutation kind: {other}")),
        }
    }
}

/// Lifecycle of a queued mutation. `Pending` entries are replayed by the
/// drainer; `Failed` entries have exhausted their retry budget and are only
/// surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationStatus {
    Pending,
    Failed,
}

impl MutationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationStatus::Pending => "pending",
            MutationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "pending" => Ok(MutationStatus::Pending),
            "failed" => Ok(MutationStatus::Failed),
            other => Err(format!("Unknown mutation status: {other}")),
        }
    }
}

/// An action recorded while the network was unavailable (or speculatively),
/// awaiting successful delivery. FIFO by insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    pub local_id: Uuid,
    pub kind: MutationKind,
    pub data: Value,
    pub status: MutationStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: i64,
}

impl QueuedMutation {
    /// The payload must carry the target entity id; mutations without one
    /// cannot be deduplicated or replayed.
    pub fn new(kind: MutationKind, data: Value, max_retries: u32) -> Result<Self, AppError> {
        if data.get("id").and_then(Value::as_i64).is_none() {
            return Err(AppError::InvalidInput(
                "Mutation payload must carry a numeric entity id".to_string(),
            ));
        }
        Ok(Self {
            local_id: Uuid::new_v4(),
            kind,
            data,
            status: MutationStatus::Pending,
            retry_count: 0,
            max_retries,
            created_at: Utc::now().timestamp(),
        })
    }

    pub fn target_id(&self) -> Option<i64> {
        self.data.get("id").and_then(Value::as_i64)
    }
}
