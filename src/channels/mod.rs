//! Channel registration and observation lifecycle.
//!
//! This module holds the identifier and payload model, the listener
//! registry that guarantees at most one native registration per channel,
//! the multiplexer that merges every adapter into one ordered stream, and
//! the controller that ties them together.

pub mod config;
pub mod controller;
pub mod data;
pub mod handle;
pub mod multiplexer;
pub mod registry;
pub mod traits;

// Re-export commonly used items
pub use config::{ChannelOptions, MonitorConfig, RegisterOptions};
pub use controller::SensorController;
pub use data::{ChannelId, Payload, PlatformType, Update};
pub use handle::SubscriptionHandle;
pub use multiplexer::{UpdateSink, UpdateStream};
pub use registry::ListenerRegistry;
pub use traits::{ChannelAdapter, PermissionGate, PermissionKind, PermissionStatus};
