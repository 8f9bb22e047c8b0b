use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::domain::entities::UserRole;
use crate::domain::events::{ChannelEvent, DeletedRef, LiveChangeEvent};
use crate::shared::config::RealtimeConfig;

/// Named server event with its JSON payload, as pushed over the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelFrame {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Role announcement sent immediately after connecting.
#[derive(Debug, Clone, Serialize)]
struct RoleSelection<'a> {
    event: &'static str,
    role: &'a str,
}

/// Websocket client for the server's push channel. Announces the user's
/// role on connect, decodes named events, and reconnects with exponential
/// backoff up to the configured attempt limit.
pub struct RealtimeChannel {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RealtimeChannel {
    pub fn connect(
        config: RealtimeConfig,
        role: UserRole,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_channel(config, role, event_tx, stop_rx));
        (Self { stop_tx, handle }, event_rx)
    }

    /// Explicit teardown on logout or app shutdown.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn run_channel(
    config: RealtimeConfig,
    role: UserRole,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut attempts = 0u32;
    let mut connected_before = false;

    loop {
        if *stop_rx.borrow() {
            return;
        }

        match connect_async(config.url.as_str()).await {
            Ok((mut ws, _)) => {
                info!("Realtime channel connected to {}", config.url);
                attempts = 0;

                let hello = RoleSelection {
                    event: "select-role",
                    role: role.as_str(),
                };
                let hello_json = match serde_json::to_string(&hello) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode role selection: {e}");
                        return;
                    }
                };
                if let Err(e) = ws.send(Message::Text(hello_json.into())).await {
                    warn!("Failed to announce role: {e}");
                } else {
                    if connected_before && event_tx.send(ChannelEvent::Reconnected).is_err() {
                        return;
                    }
                    connected_before = true;

                    loop {
                        tokio::select! {
                            _ = stop_rx.changed() => {
                                let _ = ws.close(None).await;
                                return;
                            }
                            incoming = ws.next() => match incoming {
                                Some(Ok(Message::Text(txt))) => {
                                    if let Some(event) = decode_frame(txt.as_str()) {
                                        if event_tx.send(event).is_err() {
                                            return;
                                        }
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    warn!("Realtime channel closed by server");
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!("Realtime channel error: {e}");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Realtime channel connect failed: {e}");
            }
        }

        attempts += 1;
        if attempts >= config.max_reconnect_attempts {
            warn!(
                "Realtime channel giving up after {} reconnect attempts",
                attempts
            );
            let _ = event_tx.send(ChannelEvent::Closed);
            return;
        }

        let delay = reconnect_delay(&config, attempts);
        debug!("Realtime channel reconnecting in {:?}", delay);
        tokio::select! {
            _ = stop_rx.changed() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Exponential backoff for reconnects, capped at the configured maximum.
fn reconnect_delay(config: &RealtimeConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = config
        .reconnect_base_delay_ms
        .saturating_mul(1u64 << exp)
        .min(config.reconnect_max_delay_ms);
    Duration::from_millis(delay)
}

/// Maps a wire frame to a channel event. Undecodable payloads are dropped
/// with a warning; unknown event names flow through as `Unknown` so the
/// reducer's defensive arm sees them.
fn decode_frame(raw: &str) -> Option<ChannelEvent> {
    let frame: ChannelFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Undecodable realtime frame: {e}");
            return None;
        }
    };

    let change = |event: LiveChangeEvent| Some(ChannelEvent::Change(event));

    match frame.event.as_str() {
        "asignacion-creada" => match serde_json::from_value(frame.payload) {
            Ok(entity) => change(LiveChangeEvent::Created(entity)),
            Err(e) => {
                warn!("Bad asignacion-creada payload: {e}");
                None
            }
        },
        "asignacion-actualizada" => match serde_json::from_value(frame.payload) {
            Ok(entity) => change(LiveChangeEvent::Updated(entity)),
            Err(e) => {
                warn!("Bad asignacion-actualizada payload: {e}");
                None
            }
        },
        "activo-modelo-changed" => match serde_json::from_value(frame.payload) {
            Ok(entity) => change(LiveChangeEvent::ChangeEstado(entity)),
            Err(e) => {
                warn!("Bad activo-modelo-changed payload: {e}");
                None
            }
        },
        "asignacion-eliminada" => match serde_json::from_value::<DeletedRef>(frame.payload) {
            Ok(reference) => change(LiveChangeEvent::Deleted(reference)),
            Err(e) => {
                warn!("Bad asignacion-eliminada payload: {e}");
                None
            }
        },
        "backup-success" => Some(ChannelEvent::Backup {
            ok: true,
            message: payload_message(&frame.payload, "Respaldo completado"),
        }),
        "backup-error" => Some(ChannelEvent::Backup {
            ok: false,
            message: payload_message(&frame.payload, "Error en el respaldo"),
        }),
        "user-changed" => Some(ChannelEvent::UserChanged {
            message: payload_message(&frame.payload, "Usuario actualizado"),
        }),
        _ => change(LiveChangeEvent::Unknown),
    }
}

fn payload_message(payload: &serde_json::Value, default: &str) -> String {
    payload
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(default)
        .to_string()
}
