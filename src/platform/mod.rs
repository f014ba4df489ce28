//! Native event sources consumed by the channel adapters.
//!
//! Each trait mirrors one push-style facility a mobile OS offers: a sensor
//! service with listener registration, a location provider, a notification
//! center for device-state broadcasts, synchronous probes, and a window-level
//! touch hook. Adapters only ever talk to these traits, so a platform is
//! swapped by handing a different [`NativeServices`] bundle to
//! [`crate::adapters::catalog_for`].

pub mod host;
pub mod simulated;

use crate::adapters::TouchHub;
use crate::channels::data::{ActiveNetwork, LocaleInfo, TouchAction};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

pub use simulated::VirtualDevice;

/// Identifier of a native registration (listener, receiver, observer, hook).
pub type ListenerId = u64;

/// Hardware sensor types known to the sensor service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    MagneticField,
    Pressure,
    StepCounter,
    Light,
    Proximity,
}

/// One raw sample. Single-value sensors only use `values[0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub values: [f32; 3],
}

impl SensorEvent {
    pub fn scalar(value: f32) -> Self {
        Self {
            values: [value, 0.0, 0.0],
        }
    }

    pub fn vector(x: f32, y: f32, z: f32) -> Self {
        Self { values: [x, y, z] }
    }
}

pub type SensorCallback = Arc<dyn Fn(SensorEvent) + Send + Sync>;

/// Listener-based access to motion and environment sensors.
pub trait SensorService: Send + Sync {
    fn has_sensor(&self, kind: SensorKind) -> bool;

    /// Upper bound of the sensor's reported range, if known.
    fn maximum_range(&self, kind: SensorKind) -> Option<f32>;

    fn register_listener(&self, kind: SensorKind, callback: SensorCallback) -> Result<ListenerId>;

    fn unregister_listener(&self, id: ListenerId);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Fix(LocationFix),
    /// The provider reported a failure; updates may resume later.
    Failed(String),
}

pub type LocationCallback = Arc<dyn Fn(LocationEvent) + Send + Sync>;

/// Delegate-style location provider.
pub trait LocationService: Send + Sync {
    /// Request updates no closer together than `min_interval`.
    ///
    /// Returns `SensorError::PermissionDenied` when the process lacks
    /// location authorization.
    fn request_updates(&self, min_interval: Duration, callback: LocationCallback)
        -> Result<ListenerId>;

    fn remove_updates(&self, id: ListenerId);

    fn is_provider_enabled(&self) -> bool;
}

/// Broadcast topics a notification center can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Screen,
    Lifecycle,
    Network,
    LocationProviders,
    Volume,
    Locale,
    Orientation,
    Proximity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    ScreenOn,
    ScreenOff,
    Foreground,
    Background,
    NetworkAvailable,
    NetworkLost,
    TransportChanged(ActiveNetwork),
    LocationProvidersChanged,
    VolumeChanged(u8),
    LocaleChanged,
    /// Rotation in degrees, `None` when the device is flat or the reading
    /// is unavailable.
    OrientationChanged(Option<i32>),
    ProximityChanged { near: bool },
}

impl SystemEvent {
    pub fn topic(&self) -> Topic {
        match self {
            SystemEvent::ScreenOn | SystemEvent::ScreenOff => Topic::Screen,
            SystemEvent::Foreground | SystemEvent::Background => Topic::Lifecycle,
            SystemEvent::NetworkAvailable
            | SystemEvent::NetworkLost
            | SystemEvent::TransportChanged(_) => Topic::Network,
            SystemEvent::LocationProvidersChanged => Topic::LocationProviders,
            SystemEvent::VolumeChanged(_) => Topic::Volume,
            SystemEvent::LocaleChanged => Topic::Locale,
            SystemEvent::OrientationChanged(_) => Topic::Orientation,
            SystemEvent::ProximityChanged { .. } => Topic::Proximity,
        }
    }
}

pub type EventCallback = Arc<dyn Fn(&SystemEvent) + Send + Sync>;

/// Receiver/observer registration for device-state broadcasts.
pub trait NotificationCenter: Send + Sync {
    fn subscribe(&self, topic: Topic, callback: EventCallback) -> Result<ListenerId>;

    fn unsubscribe(&self, id: ListenerId);
}

/// Synchronous reads of current device state.
pub trait DeviceProbe: Send + Sync {
    /// Display brightness in `0.0..=1.0`.
    fn display_brightness(&self) -> Option<f32>;

    fn volume_percent(&self) -> Option<u8>;

    fn locale(&self) -> Option<LocaleInfo>;

    fn active_network(&self) -> Option<ActiveNetwork>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub x: f32,
    pub y: f32,
    pub action: TouchAction,
}

pub type TouchCallback = Arc<dyn Fn(&TouchEvent) + Send + Sync>;

/// Window-level pointer interception. Hooks observe events; they never
/// consume them.
pub trait WindowEvents: Send + Sync {
    fn install_touch_hook(&self, hook: TouchCallback) -> Result<ListenerId>;

    fn remove_touch_hook(&self, id: ListenerId);
}

/// The set of native sources one platform exposes.
#[derive(Clone)]
pub struct NativeServices {
    pub sensors: Arc<dyn SensorService>,
    pub location: Arc<dyn LocationService>,
    pub notifications: Arc<dyn NotificationCenter>,
    pub probe: Arc<dyn DeviceProbe>,
    pub window: Arc<dyn WindowEvents>,
    /// Owner of the window touch hook. Every catalog built from these
    /// services observes touches through this one hub.
    pub touch: Arc<TouchHub>,
}

impl NativeServices {
    /// Back every source with the same virtual device.
    pub fn from_device(device: &Arc<VirtualDevice>) -> Self {
        Self {
            sensors: device.clone(),
            location: device.clone(),
            notifications: device.clone(),
            probe: device.clone(),
            window: device.clone(),
            touch: TouchHub::new(device.clone()),
        }
    }
}
