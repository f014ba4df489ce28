//! Controller configuration and per-registration options.

use super::data::{ChannelId, PlatformType};
use crate::error::{Result, SensorError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for a [`super::SensorController`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Which platform's adapters to compose
    pub platform: PlatformType,
    /// Updates buffered per stream before the oldest are dropped
    pub buffer_capacity: usize,
    /// Location spacing used when a registration does not supply one
    pub location_interval_ms: u64,
    /// Polling period for synthesized light readings
    pub light_poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            platform: PlatformType::Android,
            buffer_capacity: crate::DEFAULT_BUFFER_CAPACITY,
            location_interval_ms: crate::DEFAULT_INTERVAL_MS,
            light_poll_interval_ms: crate::LIGHT_POLL_INTERVAL_MS,
        }
    }
}

impl MonitorConfig {
    /// Create a configuration for the given platform with default tuning.
    pub fn new(platform: PlatformType) -> Self {
        Self {
            platform,
            ..Default::default()
        }
    }

    pub fn with_platform(mut self, platform: PlatformType) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_location_interval_ms(mut self, interval_ms: u64) -> Self {
        self.location_interval_ms = interval_ms;
        self
    }

    pub fn with_light_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.light_poll_interval_ms = interval_ms;
        self
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(self.location_interval_ms)
    }

    pub fn light_poll_interval(&self) -> Duration {
        Duration::from_millis(self.light_poll_interval_ms)
    }

    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(SensorError::config_error("buffer_capacity must be at least 1"));
        }
        if self.location_interval_ms == 0 {
            return Err(SensorError::config_error("location_interval_ms must be positive"));
        }
        if self.light_poll_interval_ms == 0 {
            return Err(SensorError::config_error("light_poll_interval_ms must be positive"));
        }
        Ok(())
    }
}

/// Options for a single channel within a registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOptions {
    /// Minimum spacing between updates. Location passes it to the provider,
    /// sampled sensors use it as a debounce window.
    pub interval_ms: Option<u64>,
}

impl ChannelOptions {
    pub fn with_interval_ms(interval_ms: u64) -> Self {
        Self {
            interval_ms: Some(interval_ms),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}

/// Per-channel options for one `register_channels` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterOptions {
    pub channels: HashMap<ChannelId, ChannelOptions>,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interval for one channel.
    pub fn with_interval_ms(mut self, channel: ChannelId, interval_ms: u64) -> Self {
        self.channels
            .insert(channel, ChannelOptions::with_interval_ms(interval_ms));
        self
    }

    pub fn for_channel(&self, channel: ChannelId) -> ChannelOptions {
        self.channels.get(&channel).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_config_builder() {
        let config = MonitorConfig::new(PlatformType::Ios)
            .with_buffer_capacity(32)
            .with_location_interval_ms(2000)
            .with_light_poll_interval_ms(250);

        assert_eq!(config.platform, PlatformType::Ios);
        assert_eq!(config.buffer_capacity, 32);
        assert_eq!(config.location_interval(), Duration::from_secs(2));
        assert_eq!(config.light_poll_interval(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_monitor_config_validation() {
        assert!(MonitorConfig::default().with_buffer_capacity(0).validate().is_err());
        assert!(MonitorConfig::default().with_light_poll_interval_ms(0).validate().is_err());
    }

    #[test]
    fn test_register_options_lookup() {
        let options = RegisterOptions::new().with_interval_ms(ChannelId::Location, 5000);
        assert_eq!(
            options.for_channel(ChannelId::Location).interval(),
            Some(Duration::from_secs(5))
        );
        assert_eq!(options.for_channel(ChannelId::Gyroscope).interval(), None);
    }
}
