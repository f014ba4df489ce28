//! # sensorhub - Unified Sensor and Device-State Channels
//!
//! One registration API over the sensors and device-state signals a phone
//! exposes, with Android- and iOS-flavoured adapters underneath. Callers ask
//! for a set of channels and get back a single ordered stream of updates;
//! dropping the stream releases every native listener it started.
//!
//! ## Features
//!
//! - **No duplicate registration**: each channel holds at most one native listener
//! - **Per-channel errors**: a failing channel never ends the stream
//! - **Bounded buffering**: slow consumers lose the oldest updates, callbacks never block
//! - **Pluggable platforms**: adapters talk to native-source traits, with a
//!   virtual device and Linux host probes included
//! - **Web streaming**: forward updates to browsers over WebSocket
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use sensorhub::{
//!     catalog_for, ChannelId, MonitorConfig, NativeServices, PlatformType, RegisterOptions,
//!     SensorController, StaticPermissionGate, VirtualDevice,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let device = Arc::new(VirtualDevice::new());
//!     let config = MonitorConfig::new(PlatformType::Android);
//!     let catalog = catalog_for(&config, &NativeServices::from_device(&device));
//!     let controller = SensorController::new(catalog, Arc::new(StaticPermissionGate::granted()), config);
//!
//!     let mut stream = controller
//!         .register_channels(&[ChannelId::Volume, ChannelId::Locale], &RegisterOptions::new())
//!         .await;
//!     while let Some(update) = stream.next().await {
//!         println!("{:?}", update);
//!     }
//! }
//! ```

pub mod adapters;
pub mod channels;
pub mod error;
pub mod platform;
pub mod web;

// Re-export public API
pub use adapters::{catalog_for, AdapterCatalog};
pub use channels::{
    config::{ChannelOptions, MonitorConfig, RegisterOptions},
    controller::SensorController,
    data::{ChannelId, ChannelKind, DeviceOrientation, Fidelity, Payload, PlatformType, Update},
    multiplexer::UpdateStream,
    traits::{ChannelAdapter, PermissionGate, PermissionKind, PermissionStatus, StaticPermissionGate},
};
pub use error::{ChannelFault, FaultKind, Result, SensorError};
pub use platform::{host::HostBridge, NativeServices, VirtualDevice};
pub use web::{start_web_server, WebConfig};

/// Default location update spacing in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Default number of updates buffered per consumer before the oldest are dropped
pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// Polling period of synthesized light readings in milliseconds
pub const LIGHT_POLL_INTERVAL_MS: u64 = 500;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;
