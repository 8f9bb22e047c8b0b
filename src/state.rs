use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::ports::{CueSink, OfflineStorePort, SilentCue};
use crate::application::services::{DrainService, DrainStatus, ReconcileService};
use crate::domain::entities::{
    ActivoModelo, MutationKind, Notification, QueuedMutation, UserRole,
};
use crate::domain::events::{ChannelEvent, DeletedRef, LiveChangeEvent};
use crate::infrastructure::api::RestClient;
use crate::infrastructure::offline::SqliteOfflineStore;
use crate::infrastructure::realtime::RealtimeChannel;
use crate::shared::config::AppConfig;
use crate::shared::error::{AppError, Result};

/// Application context, created at login and torn down at logout. Replaces
/// the module-level store handle and session globals of the original client
/// with an explicit object owned by the host.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<SqliteOfflineStore>,
    pub api: Arc<RestClient>,
    pub reconciler: Arc<RwLock<ReconcileService>>,
    pub drainer: Arc<DrainService>,
    channel: RealtimeChannel,
    pump: JoinHandle<()>,
}

impl AppState {
    pub async fn new(config: AppConfig, role: UserRole) -> Result<Self> {
        Self::with_cue(config, role, Arc::new(SilentCue)).await
    }

    pub async fn with_cue(
        config: AppConfig,
        role: UserRole,
        cue: Arc<dyn CueSink>,
    ) -> Result<Self> {
        config.validate().map_err(AppError::InvalidInput)?;

        let store = Arc::new(SqliteOfflineStore::open(&config.database).await?);
        let api = Arc::new(RestClient::new(&config.api)?);

        // Hydrate view state from the local cache so the UI renders before
        // the first network round trip.
        let cached_activos = store.load_activos().await?;
        let cached_unidades = store.load_unidades().await?;
        let persisted_notifications = store.load_notifications().await?;

        let mut reconciler = ReconcileService::new(role, cue);
        reconciler.replace_all(cached_activos, cached_unidades);
        reconciler.hydrate_notifications(persisted_notifications);
        let reconciler = Arc::new(RwLock::new(reconciler));

        let drainer = Arc::new(DrainService::new(
            store.clone(),
            api.clone(),
            config.sync.clone(),
        ));

        let (channel, event_rx) = RealtimeChannel::connect(config.realtime.clone(), role);
        let pump = spawn_event_pump(
            event_rx,
            reconciler.clone(),
            store.clone(),
            api.clone(),
            drainer.clone(),
        );

        info!("AppState initialized for role {}", role.as_str());
        Ok(Self {
            config,
            store,
            api,
            reconciler,
            drainer,
            channel,
            pump,
        })
    }

    /// Records a user action: applies it optimistically to the view state,
    /// enqueues it for delivery, and kicks off a drain attempt. Duplicate
    /// `(kind, id)` submissions are dropped by the queue.
    pub async fn submit_mutation(&self, kind: MutationKind, data: Value) -> Result<bool> {
        let mutation = QueuedMutation::new(kind, data, self.config.sync.max_retries)?;
        self.apply_optimistic(&mutation).await;

        let enqueued = self.store.enqueue_mutation(mutation).await?;
        if enqueued && self.config.sync.auto_drain {
            self.drainer.spawn_online_drain();
        }
        Ok(enqueued)
    }

    async fn apply_optimistic(&self, mutation: &QueuedMutation) {
        let event = match mutation.kind {
            MutationKind::Create | MutationKind::Update => {
                match serde_json::from_value::<ActivoModelo>(mutation.data.clone()) {
                    Ok(entity) if mutation.kind == MutationKind::Create => {
                        LiveChangeEvent::Created(entity)
                    }
                    Ok(entity) => LiveChangeEvent::Updated(entity),
                    Err(e) => {
                        // Partial payloads still get queued and delivered;
                        // the view catches up from the server echo.
                        warn!("Skipping optimistic apply: {e}");
                        return;
                    }
                }
            }
            MutationKind::Delete => match mutation.target_id() {
                Some(id) => LiveChangeEvent::Deleted(DeletedRef { id }),
                None => return,
            },
        };

        let mut reconciler = self.reconciler.write().await;
        reconciler.apply(event);
    }

    /// Browser-style connectivity signal. Going online triggers a drain;
    /// going offline is only recorded, queued work just waits.
    pub fn set_online(&self, online: bool) {
        if online {
            info!("Connectivity restored, draining queued mutations");
            self.drainer.spawn_online_drain();
        } else {
            info!("Connectivity lost, mutations will queue locally");
        }
    }

    /// Full snapshot re-fetch: the authoritative catch-up path after a
    /// channel gap, since missed push events are never replayed.
    pub async fn refresh_snapshots(&self) -> Result<()> {
        let activos = self.api.fetch_activos().await?;
        let unidades = self.api.fetch_unidades().await?;

        self.store.put_activos(&activos).await?;
        self.store.put_unidades(&unidades).await?;

        let mut reconciler = self.reconciler.write().await;
        reconciler.replace_all(activos, unidades);
        Ok(())
    }

    pub async fn drain_status(&self) -> DrainStatus {
        self.drainer.status().await
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.reconciler.read().await.notifications().to_vec()
    }

    /// Mutations whose retry budget is exhausted, for surfacing to the user.
    pub async fn failed_mutations(&self) -> Result<Vec<QueuedMutation>> {
        self.store.failed_mutations().await
    }

    /// Teardown on logout: closes the realtime channel and waits for the
    /// event pump to finish.
    pub async fn shutdown(self) {
        self.channel.shutdown().await;
        let _ = self.pump.await;
        info!("AppState shut down");
    }
}

fn spawn_event_pump(
    mut event_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    reconciler: Arc<RwLock<ReconcileService>>,
    store: Arc<SqliteOfflineStore>,
    api: Arc<RestClient>,
    drainer: Arc<DrainService>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ChannelEvent::Change(change) => {
                    let entries = {
                        let mut rec = reconciler.write().await;
                        rec.apply(change);
                        rec.notifications().to_vec()
                    };
                    persist_notifications(&store, &entries).await;
                }
                notice @ (ChannelEvent::Backup { .. } | ChannelEvent::UserChanged { .. }) => {
                    let entries = {
                        let mut rec = reconciler.write().await;
                        rec.apply_notice(&notice);
                        rec.notifications().to_vec()
                    };
                    persist_notifications(&store, &entries).await;
                }
                ChannelEvent::Reconnected => {
                    info!("Realtime channel reconnected, re-fetching snapshots");
                    match refetch(&api, &store, &reconciler).await {
                        Ok(()) => drainer.spawn_online_drain(),
                        Err(e) => warn!("Snapshot re-fetch failed: {e}"),
                    }
                }
                ChannelEvent::Closed => {
                    warn!("Realtime channel closed; live updates stopped until next login");
                }
            }
        }
    })
}

async fn persist_notifications(store: &SqliteOfflineStore, entries: &[Notification]) {
    if let Err(e) = store.save_notifications(entries).await {
        warn!("Failed to persist notifications: {e}");
    }
}

async fn refetch(
    api: &RestClient,
    store: &SqliteOfflineStore,
    reconciler: &Arc<RwLock<ReconcileService>>,
) -> Result<()> {
    let activos = api.fetch_activos().await?;
    let unidades = api.fetch_unidades().await?;

    store.put_activos(&activos).await?;
    store.put_unidades(&unidades).await?;

    let mut rec = reconciler.write().await;
    rec.replace_all(activos, unidades);
    Ok(())
}
