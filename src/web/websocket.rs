//! WebSocket handler streaming channel updates.

use super::AppState;
use crate::channels::data::Update;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use std::time::SystemTime;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub connected_at: SystemTime,
}

/// WebSocket upgrade handler. Refuses the upgrade once the configured
/// connection limit is reached.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connected = state.client_count().await;
    if connected >= state.config.max_websocket_connections {
        warn!(connected, "WebSocket connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many WebSocket connections").into_response();
    }
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket client connected: {}", client_id);

    state.clients.write().await.insert(
        client_id.clone(),
        Client {
            id: client_id.clone(),
            connected_at: SystemTime::now(),
        },
    );

    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.updates.subscribe();

    let client_id_recv = client_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    info!("WebSocket client {} disconnected", client_id_recv);
                    break;
                }
                Ok(_) => debug!("Ignoring message from {}", client_id_recv),
                Err(e) => {
                    warn!("WebSocket error for client {}: {}", client_id_recv, e);
                    break;
                }
            }
        }
    });

    let client_id_send = client_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let update = match rx.recv().await {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Client {} fell behind, skipped {} updates", client_id_send, skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match encode(&update) {
                Ok(text) => {
                    if let Err(e) = sender.send(Message::Text(text)).await {
                        warn!("Failed to send message to client {}: {}", client_id_send, e);
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize update for client {}: {}", client_id_send, e),
            }
        }
    });

    tokio::select! {
        _ = recv_task => debug!("Receive task completed for client {}", client_id),
        _ = send_task => debug!("Send task completed for client {}", client_id),
    }

    state.clients.write().await.remove(&client_id);
    info!("WebSocket client disconnected: {}", client_id);
}

/// One update as a WebSocket text frame.
pub fn encode(update: &Update) -> serde_json::Result<String> {
    serde_json::to_string(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::data::{ChannelId, Payload, PlatformType};
    use crate::error::{ChannelFault, FaultKind};

    #[test]
    fn test_encode_data_frame() {
        let update = Update::data(Payload::Volume { percent: 30 }, PlatformType::Android);
        let value: serde_json::Value = serde_json::from_str(&encode(&update).unwrap()).unwrap();
        assert_eq!(value["kind"], "data");
        assert_eq!(value["channel"], "VOLUME");
        assert_eq!(value["payload"]["percent"], 30);
    }

    #[test]
    fn test_encode_error_frame() {
        let update = Update::error(
            ChannelId::Screen,
            ChannelFault::new(FaultKind::Unsupported, "no screen API"),
        );
        let value: serde_json::Value = serde_json::from_str(&encode(&update).unwrap()).unwrap();
        assert_eq!(value["kind"], "error");
        assert_eq!(value["fault"]["kind"], "unsupported");
    }
}
