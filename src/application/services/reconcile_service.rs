use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::application::ports::CueSink;
use crate::domain::entities::{
    ActivoModelo, ActivoUnidad, Notification, NotificationKind, NotificationRing, UserRole,
};
use crate::domain::events::{ChannelEvent, LiveChangeEvent};

/// Merges server-pushed change events into the rendered entity list without
/// introducing duplicate or out-of-order visible state, and derives the
/// capped notification ring from them.
///
/// Events are applied in arrival order; nothing is buffered across a
/// disconnect. Catching up after a gap is the full re-fetch's job
/// (`replace_all`).
pub struct ReconcileService {
    activos: Vec<ActivoModelo>,
    unidades: Vec<ActivoUnidad>,
    notifications: NotificationRing,
    role: UserRole,
    cue: Arc<dyn CueSink>,
}

impl ReconcileService {
    pub fn new(role: UserRole, cue: Arc<dyn CueSink>) -> Self {
        Self {
            activos: Vec::new(),
            unidades: Vec::new(),
            notifications: NotificationRing::new(),
            role,
            cue,
        }
    }

    pub fn activos(&self) -> &[ActivoModelo] {
        &self.activos
    }

    pub fn unidades(&self) -> &[ActivoUnidad] {
        &self.unidades
    }

    pub fn notifications(&self) -> &[Notification] {
        self.notifications.entries()
    }

    /// Replaces the whole view state with fresh snapshots, e.g. after a
    /// reconnect re-fetch or at startup from the local cache.
    pub fn replace_all(&mut self, activos: Vec<ActivoModelo>, unidades: Vec<ActivoUnidad>) {
        self.activos = activos;
        self.unidades = unidades;
    }

    /// Restores the persisted notification ring at startup.
    pub fn hydrate_notifications(&mut self, entries: Vec<Notification>) {
        self.notifications = NotificationRing::from_entries(entries);
    }

    /// Applies one live change event and returns the derived notification,
    /// if any was pushed.
    pub fn apply(&mut self, event: LiveChangeEvent) -> Option<Notification> {
        match event {
            LiveChangeEvent::Created(entity) => {
                if self.activos.iter().any(|a| a.id == entity.id) {
                    debug!("Ignoring duplicate create for activo {}", entity.id);
                    return None;
                }
                let message = format!("Asignación creada: {}", entity.nombre);
                self.activos.push(entity);
                self.notify(NotificationKind::Success, message)
            }
            LiveChangeEvent::Updated(entity) | LiveChangeEvent::ChangeEstado(entity) => {
                let Some(existing) = self.activos.iter_mut().find(|a| a.id == entity.id) else {
                    debug!("Ignoring update for unknown activo {}", entity.id);
                    return None;
                };
                let message = format!("Activo actualizado: {}", entity.nombre);
                existing.merge_from(entity);
                self.notify(NotificationKind::Info, message)
            }
            LiveChangeEvent::Deleted(reference) => {
                let before = self.activos.len();
                self.activos.retain(|a| a.id != reference.id);
                self.unidades
                    .retain(|u| u.activo_modelo_id != reference.id);
                if self.activos.len() == before {
                    debug!("Ignoring delete for unknown activo {}", reference.id);
                    return None;
                }
                self.notify(
                    NotificationKind::Warning,
                    format!("Asignación eliminada: activo {}", reference.id),
                )
            }
            LiveChangeEvent::Unknown => None,
        }
    }

    /// Applies a channel event that is not a state transition. Backup events
    /// are visible to administrators only.
    pub fn apply_notice(&mut self, event: &ChannelEvent) -> Option<Notification> {
        match event {
            ChannelEvent::Backup { ok, message } => {
                if !self.role.is_admin() {
                    return None;
                }
                let kind = if *ok {
                    NotificationKind::Success
                } else {
                    NotificationKind::Error
                };
                self.notify(kind, message.clone())
            }
            ChannelEvent::UserChanged { message } => {
                self.notify(NotificationKind::Info, message.clone())
            }
            _ => None,
        }
    }

    fn notify(&mut self, kind: NotificationKind, message: String) -> Option<Notification> {
        let notification = Notification {
            kind,
            message,
            timestamp: Utc::now().timestamp(),
        };
        if !self.notifications.push(notification.clone()) {
            return None;
        }
        self.cue.play(kind);
        Some(notification)
    }
}
