//! Web server configuration.

use crate::error::{Result, SensorError};
use serde::{Deserialize, Serialize};

/// Configuration for the web server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Whether to enable CORS
    pub enable_cors: bool,
    /// Maximum number of WebSocket connections
    pub max_websocket_connections: usize,
    /// Updates buffered per WebSocket client before it starts skipping
    pub client_buffer: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
            max_websocket_connections: 100,
            client_buffer: crate::DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl WebConfig {
    /// Create a new web configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub fn with_max_websocket_connections(mut self, max: usize) -> Self {
        self.max_websocket_connections = max;
        self
    }

    pub fn with_client_buffer(mut self, capacity: usize) -> Self {
        self.client_buffer = capacity;
        self
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_websocket_connections == 0 {
            return Err(SensorError::config_error(
                "max_websocket_connections must be at least 1",
            ));
        }
        if self.client_buffer == 0 {
            return Err(SensorError::config_error("client_buffer must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_bind_address() {
        let config = WebConfig::new("127.0.0.1", 9000)
            .with_cors(false)
            .with_max_websocket_connections(5);
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert!(!config.enable_cors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let config = WebConfig::default().with_max_websocket_connections(0);
        assert!(matches!(config.validate(), Err(SensorError::Config(_))));
    }
}
