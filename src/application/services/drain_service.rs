use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::application::ports::{MutationSender, OfflineStorePort};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Mutations delivered and removed from the queue.
    pub sent: u32,
    /// Mutations that failed this pass and remain queued.
    pub failed: u32,
    /// Mutations whose retry budget ran out and were parked.
    pub parked: u32,
    /// Set when the pass was skipped because another drain was in flight.
    pub skipped: bool,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DrainStatus {
    pub is_draining: bool,
    pub last_drain: Option<i64>,
    pub consecutive_failures: u32,
}

/// Replays queued mutations in FIFO order when connectivity returns.
///
/// Acknowledgement is per item: a successful send removes exactly that
/// entry, a failed one stays queued with its retry counter bumped. The
/// queue is never cleared wholesale on a partially failed batch.
pub struct DrainService {
    store: Arc<dyn OfflineStorePort>,
    sender: Arc<dyn MutationSender>,
    config: SyncConfig,
    status: Arc<RwLock<DrainStatus>>,
}

impl DrainService {
    pub fn new(
        store: Arc<dyn OfflineStorePort>,
        sender: Arc<dyn MutationSender>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            sender,
            config,
            status: Arc::new(RwLock::new(DrainStatus::default())),
        }
    }

    pub async fn status(&self) -> DrainStatus {
        self.status.read().await.clone()
    }

    /// One drain pass over the current queue snapshot. Re-entrant calls
    /// while a drain is running are no-ops.
    pub async fn drain(&self) -> Result<DrainOutcome, AppError> {
        {
            let mut status = self.status.write().await;
            if status.is_draining {
                debug!("Drain already in progress, skipping");
                return Ok(DrainOutcome {
                    skipped: true,
                    ..DrainOutcome::default()
                });
            }
            status.is_draining = true;
        }

        let result = self.drain_queue().await;

        let mut status = self.status.write().await;
        status.is_draining = false;
        match &result {
            Ok(outcome) if outcome.failed == 0 => {
                status.consecutive_failures = 0;
                status.last_drain = Some(Utc::now().timestamp());
            }
            _ => status.consecutive_failures += 1,
        }

        result
    }

    async fn drain_queue(&self) -> Result<DrainOutcome, AppError> {
        let snapshot = self.store.queue_snapshot().await?;
        if snapshot.is_empty() {
            return Ok(DrainOutcome::default());
        }

        info!("Draining {} queued mutations", snapshot.len());
        let mut outcome = DrainOutcome::default();

        for mutation in snapshot {
            match self.sender.send(&mutation).await {
                Ok(()) => {
                    self.store.remove_mutation(mutation.local_id).await?;
                    outcome.sent += 1;
                }
                Err(e) => {
                    warn!(
                        "Send failed for {} mutation on activo {:?}: {}",
                        mutation.kind.as_str(),
                        mutation.target_id(),
                        e
                    );
                    self.store
                        .mark_mutation_failed(mutation.local_id, &e.to_string())
                        .await?;
                    outcome.failed += 1;
                    if mutation.retry_count + 1 >= mutation.max_retries {
                        outcome.parked += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Reacts to an online transition: drains, and while sends keep failing
    /// retries with exponential backoff. The loop ends once a pass has no
    /// failures, which is guaranteed because persistently failing entries
    /// park after `max_retries` attempts.
    pub fn spawn_online_drain(self: &Arc<Self>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            for attempt in 0..service.config.max_retries {
                match service.drain().await {
                    Ok(outcome) if outcome.failed == 0 && !outcome.skipped => {
                        if outcome.sent > 0 {
                            info!("Drain complete: {} mutations delivered", outcome.sent);
                        }
                        return;
                    }
                    Ok(DrainOutcome { skipped: true, .. }) => {
                        debug!("Drain pass skipped, another drain in flight");
                    }
                    Ok(outcome) => {
                        debug!(
                            "Drain pass left {} failures ({} parked)",
                            outcome.failed, outcome.parked
                        );
                    }
                    Err(e) => {
                        warn!("Drain aborted: {e}");
                        return;
                    }
                }
                tokio::time::sleep(jittered(backoff_delay(&service.config, attempt))).await;
            }
        });
    }
}

/// Exponential backoff between drain passes, capped by config.
pub fn backoff_delay(config: &SyncConfig, attempt: u32) -> Duration {
    let exp = attempt.min(16);
    let delay = config
        .backoff_base_ms
        .saturating_mul(1u64 << exp)
        .min(config.backoff_max_ms);
    Duration::from_millis(delay)
}

fn jittered(delay: Duration) -> Duration {
    let jitter_cap = (delay.as_millis() as u64 / 4).max(1);
    let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
    delay + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{MutationKind, QueuedMutation};
    use crate::infrastructure::offline::SqliteOfflineStore;
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct MockSender {
        calls: Mutex<Vec<(MutationKind, i64)>>,
        fail_ids: Mutex<HashSet<i64>>,
    }

    impl MockSender {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_ids: Mutex::new(HashSet::new()),
            }
        }

        fn failing(ids: impl IntoIterator<Item = i64>) -> Self {
            let sender = Self::new();
            *sender.fail_ids.lock().unwrap() = ids.into_iter().collect();
            sender
        }

        fn calls(&self) -> Vec<(MutationKind, i64)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MutationSender for MockSender {
        async fn send(&self, mutation: &QueuedMutation) -> Result<(), AppError> {
            let id = mutation.target_id().unwrap();
            self.calls.lock().unwrap().push((mutation.kind, id));
            if self.fail_ids.lock().unwrap().contains(&id) {
                return Err(AppError::NetworkSend("connection refused".to_string()));
            }
            Ok(())
        }
    }

    async fn memory_store() -> Arc<SqliteOfflineStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        Arc::new(SqliteOfflineStore::from_pool(pool).await.unwrap())
    }

    fn sync_config() -> SyncConfig {
        SyncConfig {
            auto_drain: true,
            max_retries: 3,
            backoff_base_ms: 10,
            backoff_max_ms: 100,
        }
    }

    async fn enqueue(store: &SqliteOfflineStore, kind: MutationKind, id: i64) {
        let mutation = QueuedMutation::new(kind, json!({"id": id}), 3).unwrap();
        assert!(store.enqueue_mutation(mutation).await.unwrap());
    }

    #[tokio::test]
    async fn test_drain_sends_in_insertion_order_and_empties_queue() {
        let store = memory_store().await;
        let sender = Arc::new(MockSender::new());

        enqueue(&store, MutationKind::Create, 3).await;
        enqueue(&store, MutationKind::Update, 1).await;
        enqueue(&store, MutationKind::Delete, 2).await;

        let service = DrainService::new(store.clone(), sender.clone(), sync_config());
        let outcome = service.drain().await.unwrap();

        assert_eq!(outcome.sent, 3);
        assert_eq!(outcome.failed, 0);
        assert_eq!(
            sender.calls(),
            vec![
                (MutationKind::Create, 3),
                (MutationKind::Update, 1),
                (MutationKind::Delete, 2),
            ]
        );
        assert!(store.queue_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_retains_failed_entry() {
        let store = memory_store().await;
        let sender = Arc::new(MockSender::failing([2]));

        enqueue(&store, MutationKind::Create, 1).await;
        enqueue(&store, MutationKind::Create, 2).await;
        enqueue(&store, MutationKind::Create, 3).await;

        let service = DrainService::new(store.clone(), sender.clone(), sync_config());
        let outcome = service.drain().await.unwrap();

        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.parked, 0);

        let remaining = store.queue_snapshot().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].target_id(), Some(2));
        assert_eq!(remaining[0].retry_count, 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_park_the_mutation() {
        let store = memory_store().await;
        let sender = Arc::new(MockSender::failing([7]));

        enqueue(&store, MutationKind::Delete, 7).await;
        let service = DrainService::new(store.clone(), sender.clone(), sync_config());

        for _ in 0..2 {
            let outcome = service.drain().await.unwrap();
            assert_eq!(outcome.failed, 1);
            assert_eq!(outcome.parked, 0);
        }
        let outcome = service.drain().await.unwrap();
        assert_eq!(outcome.parked, 1);

        // A parked entry no longer appears in drain passes.
        assert_eq!(service.drain().await.unwrap(), DrainOutcome::default());
        assert_eq!(store.failed_mutations().await.unwrap().len(), 1);
        assert_eq!(sender.calls().len(), 3);
    }

    struct GatedSender {
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl MutationSender for GatedSender {
        async fn send(&self, _mutation: &QueuedMutation) -> Result<(), AppError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_overlapping_drain_reports_skipped_not_clean() {
        let store = memory_store().await;
        enqueue(&store, MutationKind::Create, 1).await;

        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let sender = Arc::new(GatedSender {
            entered: entered.clone(),
            release: release.clone(),
        });

        let service = Arc::new(DrainService::new(store.clone(), sender, sync_config()));
        let in_flight = tokio::spawn({
            let service = service.clone();
            async move { service.drain().await.unwrap() }
        });

        // A drain arriving while another is mid-send is a skip, not a
        // clean pass.
        entered.notified().await;
        let overlapping = service.drain().await.unwrap();
        assert!(overlapping.skipped);
        assert_eq!(overlapping.sent, 0);
        assert_eq!(overlapping.failed, 0);

        release.notify_one();
        let first = in_flight.await.unwrap();
        assert!(!first.skipped);
        assert_eq!(first.sent, 1);
    }

    #[tokio::test]
    async fn test_clean_drain_resets_failure_streak() {
        let store = memory_store().await;
        let sender = Arc::new(MockSender::failing([5]));

        enqueue(&store, MutationKind::Create, 5).await;
        let service = DrainService::new(store.clone(), sender.clone(), sync_config());

        service.drain().await.unwrap();
        assert_eq!(service.status().await.consecutive_failures, 1);

        sender.fail_ids.lock().unwrap().clear();
        service.drain().await.unwrap();
        let status = service.status().await;
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_drain.is_some());
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let config = sync_config();
        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(10));
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(20));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(40));
        assert_eq!(backoff_delay(&config, 10), Duration::from_millis(100));
    }
}
