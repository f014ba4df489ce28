//! Channel identifiers, payload shapes and the update envelope.

use crate::error::{ChannelFault, SensorError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One observable sensor or device-state source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelId {
    Accelerometer,
    Gyroscope,
    Magnetometer,
    Barometer,
    StepCounter,
    Location,
    DeviceOrientation,
    Proximity,
    Light,
    TouchGestures,
    Screen,
    AppVisibility,
    Connectivity,
    ActiveNetwork,
    LocationProvider,
    Volume,
    Locale,
}

/// Whether a channel reports physical readings or device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Sensor,
    State,
}

impl ChannelId {
    /// Every identifier, in declaration order.
    pub const ALL: [ChannelId; 17] = [
        ChannelId::Accelerometer,
        ChannelId::Gyroscope,
        ChannelId::Magnetometer,
        ChannelId::Barometer,
        ChannelId::StepCounter,
        ChannelId::Location,
        ChannelId::DeviceOrientation,
        ChannelId::Proximity,
        ChannelId::Light,
        ChannelId::TouchGestures,
        ChannelId::Screen,
        ChannelId::AppVisibility,
        ChannelId::Connectivity,
        ChannelId::ActiveNetwork,
        ChannelId::LocationProvider,
        ChannelId::Volume,
        ChannelId::Locale,
    ];

    pub fn kind(self) -> ChannelKind {
        match self {
            ChannelId::Screen
            | ChannelId::AppVisibility
            | ChannelId::Connectivity
            | ChannelId::ActiveNetwork
            | ChannelId::LocationProvider
            | ChannelId::Volume
            | ChannelId::Locale => ChannelKind::State,
            _ => ChannelKind::Sensor,
        }
    }

    /// Raw-sample channels that honour an interval as a debounce window.
    pub fn is_sampled(self) -> bool {
        matches!(
            self,
            ChannelId::Accelerometer
                | ChannelId::Gyroscope
                | ChannelId::Magnetometer
                | ChannelId::Barometer
                | ChannelId::StepCounter
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelId::Accelerometer => "ACCELEROMETER",
            ChannelId::Gyroscope => "GYROSCOPE",
            ChannelId::Magnetometer => "MAGNETOMETER",
            ChannelId::Barometer => "BAROMETER",
            ChannelId::StepCounter => "STEP_COUNTER",
            ChannelId::Location => "LOCATION",
            ChannelId::DeviceOrientation => "DEVICE_ORIENTATION",
            ChannelId::Proximity => "PROXIMITY",
            ChannelId::Light => "LIGHT",
            ChannelId::TouchGestures => "TOUCH_GESTURES",
            ChannelId::Screen => "SCREEN",
            ChannelId::AppVisibility => "APP_VISIBILITY",
            ChannelId::Connectivity => "CONNECTIVITY",
            ChannelId::ActiveNetwork => "ACTIVE_NETWORK",
            ChannelId::LocationProvider => "LOCATION_PROVIDER",
            ChannelId::Volume => "VOLUME",
            ChannelId::Locale => "LOCALE",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelId {
    type Err = SensorError;

    /// Accepts the canonical name in any case, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        ChannelId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| SensorError::config_error(format!("Unknown channel: {}", s)))
    }
}

/// Platform whose adapters produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformType {
    Android,
    #[serde(rename = "iOS")]
    Ios,
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformType::Android => f.write_str("Android"),
            PlatformType::Ios => f.write_str("iOS"),
        }
    }
}

impl FromStr for PlatformType {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(PlatformType::Android),
            "ios" => Ok(PlatformType::Ios),
            other => Err(SensorError::config_error(format!("Unknown platform: {}", other))),
        }
    }
}

/// Whether a reading comes from dedicated hardware or is approximated
/// from a proxy signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Fidelity {
    Hardware,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceOrientation {
    Portrait,
    Landscape,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TouchAction {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActiveNetwork {
    Wifi,
    Cellular,
    Ethernet,
    None,
}

/// Current user locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleInfo {
    /// ISO 639 language code (e.g. "en", "ar")
    pub language_code: String,
    /// ISO 3166 country code (e.g. "US"), empty when not set
    pub country_code: String,
    /// Full identifier (e.g. "en_US")
    pub tag: String,
    /// Human-readable name (e.g. "English (United States)")
    pub display_name: String,
    /// Whether the language is written right-to-left
    pub is_rtl: bool,
}

/// A reading or state value, one variant per [`ChannelId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Acceleration in m/s² including gravity
    Accelerometer { x: f32, y: f32, z: f32 },
    /// Rate of rotation in rad/s
    Gyroscope { x: f32, y: f32, z: f32 },
    /// Ambient magnetic field in µT
    Magnetometer { x: f32, y: f32, z: f32 },
    /// Atmospheric pressure in hPa
    Barometer { pressure: f32 },
    /// Hardware step total and steps since the previous sample
    StepCounter { steps: u64, delta: u64 },
    Location {
        latitude: Option<f64>,
        longitude: Option<f64>,
        altitude: Option<f64>,
    },
    Orientation {
        orientation: DeviceOrientation,
        degrees: Option<i32>,
    },
    /// `distance_cm` is a sentinel (0 near, -1 far) without distance hardware
    Proximity { distance_cm: f32, is_near: bool },
    Light { illuminance: f32, fidelity: Fidelity },
    TouchGesture { x: f32, y: f32, action: TouchAction },
    Screen { is_on: bool },
    AppVisibility { is_visible: bool },
    Connectivity { is_connected: bool },
    ActiveNetwork { network: ActiveNetwork },
    LocationProvider { is_enabled: bool },
    Volume { percent: u8 },
    Locale(LocaleInfo),
}

impl Payload {
    /// The channel this payload shape belongs to.
    pub fn channel(&self) -> ChannelId {
        match self {
            Payload::Accelerometer { .. } => ChannelId::Accelerometer,
            Payload::Gyroscope { .. } => ChannelId::Gyroscope,
            Payload::Magnetometer { .. } => ChannelId::Magnetometer,
            Payload::Barometer { .. } => ChannelId::Barometer,
            Payload::StepCounter { .. } => ChannelId::StepCounter,
            Payload::Location { .. } => ChannelId::Location,
            Payload::Orientation { .. } => ChannelId::DeviceOrientation,
            Payload::Proximity { .. } => ChannelId::Proximity,
            Payload::Light { .. } => ChannelId::Light,
            Payload::TouchGesture { .. } => ChannelId::TouchGestures,
            Payload::Screen { .. } => ChannelId::Screen,
            Payload::AppVisibility { .. } => ChannelId::AppVisibility,
            Payload::Connectivity { .. } => ChannelId::Connectivity,
            Payload::ActiveNetwork { .. } => ChannelId::ActiveNetwork,
            Payload::LocationProvider { .. } => ChannelId::LocationProvider,
            Payload::Volume { .. } => ChannelId::Volume,
            Payload::Locale(_) => ChannelId::Locale,
        }
    }
}

/// One item of the multiplexed update stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Update {
    Data {
        channel: ChannelId,
        payload: Payload,
        platform: PlatformType,
        /// Unix timestamp in milliseconds
        timestamp: u64,
    },
    Error {
        channel: ChannelId,
        fault: ChannelFault,
    },
}

impl Update {
    /// Wrap a payload, stamping it with the current time.
    pub fn data(payload: Payload, platform: PlatformType) -> Self {
        Update::Data {
            channel: payload.channel(),
            payload,
            platform,
            timestamp: now_millis(),
        }
    }

    pub fn error(channel: ChannelId, fault: impl Into<ChannelFault>) -> Self {
        Update::Error {
            channel,
            fault: fault.into(),
        }
    }

    pub fn channel(&self) -> ChannelId {
        match self {
            Update::Data { channel, .. } | Update::Error { channel, .. } => *channel,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Update::Error { .. })
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Update::Data { payload, .. } => Some(payload),
            Update::Error { .. } => None,
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;

    #[test]
    fn test_channel_id_parsing() {
        assert_eq!("accelerometer".parse::<ChannelId>().unwrap(), ChannelId::Accelerometer);
        assert_eq!("step-counter".parse::<ChannelId>().unwrap(), ChannelId::StepCounter);
        assert_eq!("LOCATION_PROVIDER".parse::<ChannelId>().unwrap(), ChannelId::LocationProvider);
        assert!("thermometer".parse::<ChannelId>().is_err());
    }

    #[test]
    fn test_channel_kinds() {
        assert_eq!(ChannelId::Gyroscope.kind(), ChannelKind::Sensor);
        assert_eq!(ChannelId::TouchGestures.kind(), ChannelKind::Sensor);
        assert_eq!(ChannelId::Volume.kind(), ChannelKind::State);
        assert!(ChannelId::Barometer.is_sampled());
        assert!(!ChannelId::Location.is_sampled());
    }

    #[test]
    fn test_payload_channel_mapping() {
        let payload = Payload::Orientation {
            orientation: DeviceOrientation::Portrait,
            degrees: Some(10),
        };
        assert_eq!(payload.channel(), ChannelId::DeviceOrientation);
        assert_eq!(Payload::Volume { percent: 40 }.channel(), ChannelId::Volume);
    }

    #[test]
    fn test_update_json_shape() {
        let update = Update::data(
            Payload::Light {
                illuminance: 500.0,
                fidelity: Fidelity::Synthetic,
            },
            PlatformType::Ios,
        );
        let json: serde_json::Value = serde_json::to_value(&update).unwrap();
        assert_eq!(json["kind"], "data");
        assert_eq!(json["channel"], "LIGHT");
        assert_eq!(json["platform"], "iOS");
        assert_eq!(json["payload"]["type"], "light");
        assert_eq!(json["payload"]["fidelity"], "SYNTHETIC");

        let error = Update::error(
            ChannelId::Screen,
            ChannelFault::new(FaultKind::Unsupported, "no screen state"),
        );
        let json: serde_json::Value = serde_json::to_value(&error).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["fault"]["kind"], "unsupported");
    }
}
