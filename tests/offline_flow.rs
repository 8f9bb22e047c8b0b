use async_trait::async_trait;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};

use activos_sync::application::ports::{MutationSender, OfflineStorePort, SilentCue};
use activos_sync::application::services::{DrainService, ReconcileService};
use activos_sync::domain::entities::{ActivoModelo, MutationKind, QueuedMutation, UserRole};
use activos_sync::domain::events::{DeletedRef, LiveChangeEvent};
use activos_sync::infrastructure::offline::SqliteOfflineStore;
use activos_sync::shared::config::SyncConfig;
use activos_sync::AppError;

struct RecordingSender {
    calls: Mutex<Vec<i64>>,
    offline: Mutex<bool>,
}

impl RecordingSender {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            offline: Mutex::new(false),
        }
    }

    fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }
}

#[async_trait]
impl MutationSender for RecordingSender {
    async fn send(&self, mutation: &QueuedMutation) -> Result<(), AppError> {
        if *self.offline.lock().unwrap() {
            return Err(AppError::NetworkSend("offline".to_string()));
        }
        self.calls.lock().unwrap().push(mutation.target_id().unwrap());
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
        backoff_max_ms: 50,
    }
}

fn modelo(id: i64, nombre: &str) -> ActivoModelo {
    ActivoModelo {
        id,
        nombre: nombre.to_string(),
        descripcion: None,
        costo: 500.0,
        estado_actual: "Bueno".to_string(),
        asignado: false,
        unidades: Vec::new(),
    }
}

#[tokio::test]
async fn offline_actions_queue_then_drain_in_order() {
    let store = memory_store().await;
    let sender = Arc::new(RecordingSender::new());
    sender.set_offline(true);

    // Actions taken while offline accumulate in the queue.
    for id in [4, 2, 9] {
        let mutation =
            QueuedMutation::new(MutationKind::Create, json!({"id": id, "nombre": "Equipo"}), 3)
                .unwrap();
        assert!(store.enqueue_mutation(mutation).await.unwrap());
    }

    let drainer = DrainService::new(store.clone(), sender.clone(), sync_config());
    let outcome = drainer.drain().await.unwrap();
    assert_eq!(outcome.sent, 0);
    assert_eq!(outcome.failed, 3);
    assert_eq!(store.queue_snapshot().await.unwrap().len(), 3);

    // Connectivity returns; the next drain replays everything FIFO.
    sender.set_offline(false);
    let outcome = drainer.drain().await.unwrap();
    assert_eq!(outcome.sent, 3);
    assert_eq!(*sender.calls.lock().unwrap(), vec![4, 2, 9]);
    assert!(store.queue_snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_submissions_collapse_to_one_entry() {
    let store = memory_store().await;

    let first =
        QueuedMutation::new(MutationKind::Create, json!({"id": 5, "nombre": "Laptop"}), 3).unwrap();
    let second =
        QueuedMutation::new(MutationKind::Create, json!({"id": 5, "nombre": "Laptop"}), 3).unwrap();

    assert!(store.enqueue_mutation(first).await.unwrap());
    assert!(!store.enqueue_mutation(second).await.unwrap());
    assert_eq!(store.queue_snapshot().await.unwrap().len(), 1);
}

#[tokio::test]
async fn live_events_and_notifications_survive_restart() {
    let store = memory_store().await;

    let mut reconciler = ReconcileService::new(UserRole::Administrador, Arc::new(SilentCue));
    reconciler.apply(LiveChangeEvent::Created(modelo(1, "Laptop")));
    reconciler.apply(LiveChangeEvent::Updated(modelo(1, "Laptop Pro")));
    reconciler.apply(LiveChangeEvent::Created(modelo(2, "Monitor")));
    reconciler.apply(LiveChangeEvent::Deleted(DeletedRef { id: 2 }));

    assert_eq!(reconciler.activos().len(), 1);
    assert_eq!(reconciler.activos()[0].nombre, "Laptop Pro");

    store
        .save_notifications(reconciler.notifications())
        .await
        .unwrap();
    store.put_activos(reconciler.activos()).await.unwrap();

    // Simulated restart: a fresh reconciler hydrates from the store.
    let mut restarted = ReconcileService::new(UserRole::Administrador, Arc::new(SilentCue));
    restarted.replace_all(store.load_activos().await.unwrap(), Vec::new());
    restarted.hydrate_notifications(store.load_notifications().await.unwrap());

    assert_eq!(restarted.activos().len(), 1);
    assert_eq!(
        restarted.notifications().len(),
        reconciler.notifications().len()
    );
    assert_eq!(restarted.notifications(), reconciler.notifications());
}
