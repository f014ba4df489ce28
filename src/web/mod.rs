//! Web server streaming channel updates to browser clients.
//!
//! Every update of one [`UpdateStream`] is fanned out to all connected
//! WebSocket clients as a JSON text frame. A small REST surface reports
//! health and the channels being forwarded.

pub mod config;
pub mod handlers;
pub mod router;
pub mod websocket;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::channels::data::{ChannelId, PlatformType, Update};
use crate::channels::multiplexer::UpdateStream;
use crate::error::{Result, SensorError};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: WebConfig,
    pub platform: PlatformType,
    pub channels: Arc<Vec<ChannelId>>,
    pub updates: broadcast::Sender<Update>,
    pub clients: Arc<RwLock<HashMap<String, websocket::Client>>>,
}

impl AppState {
    pub fn new(config: WebConfig, platform: PlatformType, channels: Vec<ChannelId>) -> Self {
        let (updates, _rx) = broadcast::channel(config.client_buffer.max(1));
        Self {
            config,
            platform,
            channels: Arc::new(channels),
            updates,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Serve `stream` over HTTP and WebSocket until the server stops.
pub async fn start_web_server(
    config: WebConfig,
    platform: PlatformType,
    mut stream: UpdateStream,
) -> Result<()> {
    config.validate()?;
    let channels: Vec<ChannelId> = stream.channels().iter().copied().collect();
    let state = AppState::new(config.clone(), platform, channels);
    let app = create_app(state.clone());

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| SensorError::config_error(format!("Invalid bind address: {}", e)))?;

    info!("Starting sensorhub web server on http://{}", addr);
    info!("API endpoints: http://{0}/api/health, http://{0}/api/channels", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SensorError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    let updates = state.updates.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(update) = stream.next().await {
            if updates.send(update).is_err() {
                debug!("Update dropped, no WebSocket clients connected");
            }
        }
        warn!("Update stream ended, no further updates will be forwarded");
    });

    let served = axum::serve(listener, app)
        .await
        .map_err(|e| SensorError::web_server_error(format!("Server error: {}", e)));
    forward_task.abort();
    served
}
