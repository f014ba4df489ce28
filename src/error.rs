//! Error handling for the sensorhub crate.

use serde::{Deserialize, Serialize};

/// A specialized `Result` type for sensorhub operations.
pub type Result<T> = std::result::Result<T, SensorError>;

/// The main error type for sensorhub operations.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The hardware backing a channel is not present on this device
    #[error("Hardware unavailable: {0}")]
    Unavailable(String),

    /// The user or the OS refused access to a permission-gated source
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The platform offers no way to observe this channel
    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    /// A native source failed while starting or delivering events
    #[error("Native source error: {0}")]
    Native(String),

    /// A polling adapter was started outside of an async runtime
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SensorError {
    /// Create a new hardware-unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a new permission error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a new capability-gap error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a new native source error
    pub fn native(msg: impl Into<String>) -> Self {
        Self::Native(msg.into())
    }

    /// Create a new runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Whether this error means "never started" rather than "started then failed".
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Category of a per-channel failure delivered on the update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    PermissionDenied,
    Unsupported,
    Native,
}

/// A cloneable description of a channel failure.
///
/// Faults travel through the multiplexer to every interested stream, so
/// unlike [`SensorError`] they must be `Clone` and serializable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ChannelFault {
    pub kind: FaultKind,
    pub message: String,
}

impl ChannelFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn native(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Native, message)
    }
}

impl From<SensorError> for ChannelFault {
    fn from(err: SensorError) -> Self {
        let kind = match &err {
            SensorError::PermissionDenied(_) => FaultKind::PermissionDenied,
            SensorError::Unsupported(_) => FaultKind::Unsupported,
            _ => FaultKind::Native,
        };
        let message = match err {
            SensorError::Unavailable(msg)
            | SensorError::PermissionDenied(msg)
            | SensorError::Unsupported(msg)
            | SensorError::Native(msg)
            | SensorError::Runtime(msg)
            | SensorError::Config(msg)
            | SensorError::WebServer(msg) => msg,
            other => other.to_string(),
        };
        Self { kind, message }
    }
}
