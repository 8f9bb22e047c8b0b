use serde::{Deserialize, Serialize};

use super::entities::activo::ActivoModelo;

/// Reference carried by a delete event; the server only ships the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRef {
    pub id: i64,
}

/// A server-pushed change notification, consumed once by the reconciler.
///
/// The original client dispatched on raw action strings; modeling the known
/// kinds as a tagged union makes every new action a compile-checked addition.
/// Unrecognized actions decode as `Unknown` and leave state untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "entity", rename_all = "kebab-case")]
pub enum LiveChangeEvent {
    Created(ActivoModelo),
    Updated(ActivoModelo),
    ChangeEstado(ActivoModelo),
    Deleted(DeletedRef),
    #[serde(other)]
    Unknown,
}

/// What the realtime channel forwards to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A decoded live change, to be applied by the reconciler.
    Change(LiveChangeEvent),
    /// Backup job result; visible to administrators only.
    Backup { ok: bool, message: String },
    /// Account/role change on the server side.
    UserChanged { message: String },
    /// Connection re-established; missed events are not replayed, so the
    /// app must run a full snapshot re-fetch.
    Reconnected,
    /// Reconnect budget exhausted; the channel gives up.
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_change_estado_action() {
        let event: LiveChangeEvent = serde_json::from_str(
            r#"{"action":"change-estado","entity":{"id":1,"nombre":"Laptop","estadoActual":"Bueno"}}"#,
        )
        .unwrap();
        match event {
            LiveChangeEvent::ChangeEstado(entity) => assert_eq!(entity.estado_actual, "Bueno"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decodes_deleted_action() {
        let event: LiveChangeEvent =
            serde_json::from_str(r#"{"action":"deleted","entity":{"id":7}}"#).unwrap();
        assert_eq!(event, LiveChangeEvent::Deleted(DeletedRef { id: 7 }));
    }

    #[test]
    fn test_unknown_action_is_defensive_default() {
        let event: LiveChangeEvent =
            serde_json::from_str(r#"{"action":"renamed","entity":{"id":7}}"#).unwrap();
        assert_eq!(event, LiveChangeEvent::Unknown);
    }
}
