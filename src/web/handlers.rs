//! HTTP handlers for API endpoints.

use super::AppState;
use crate::channels::data::ChannelKind;
use axum::{extract::State, response::Json};
use serde::Serialize;
use serde_json::json;

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "sensorhub",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": state.platform,
        "connected_clients": state.client_count().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[derive(Debug, Serialize)]
pub struct ChannelEntry {
    pub channel: crate::channels::data::ChannelId,
    pub kind: ChannelKind,
}

/// Channels whose updates are forwarded to WebSocket clients.
pub async fn list_channels(State(state): State<AppState>) -> Json<Vec<ChannelEntry>> {
    Json(
        state
            .channels
            .iter()
            .map(|&channel| ChannelEntry {
                channel,
                kind: channel.kind(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::data::{ChannelId, PlatformType};
    use crate::web::WebConfig;

    fn state() -> AppState {
        AppState::new(
            WebConfig::default(),
            PlatformType::Ios,
            vec![ChannelId::Accelerometer, ChannelId::Volume],
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let Json(body) = health_check(State(state())).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["platform"], "iOS");
        assert_eq!(body["connected_clients"], 0);
    }

    #[tokio::test]
    async fn test_list_channels() {
        let Json(entries) = list_channels(State(state())).await;
        let value = serde_json::to_value(&entries).unwrap();
        assert_eq!(value[0]["channel"], "ACCELEROMETER");
        assert_eq!(value[0]["kind"], "sensor");
        assert_eq!(value[1]["channel"], "VOLUME");
        assert_eq!(value[1]["kind"], "state");
    }
}
