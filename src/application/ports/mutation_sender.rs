use async_trait::async_trait;

use crate::domain::entities::QueuedMutation;
use crate::shared::error::AppError;

/// Network collaborator that delivers a single queued mutation to the
/// backend. A failed send leaves the mutation queued.
#[async_trait]
pub trait MutationSender: Send + Sync {
    async fn send(&self, mutation: &QueuedMutation) -> Result<(), AppError>;
}
