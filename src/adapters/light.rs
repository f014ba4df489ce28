//! Ambient light: a real lux sensor where one exists, otherwise an
//! estimate polled from display brightness.

use crate::channels::config::ChannelOptions;
use crate::channels::data::{ChannelId, Fidelity, Payload, PlatformType};
use crate::channels::handle::{PollTimer, SubscriptionHandle};
use crate::channels::multiplexer::UpdateSink;
use crate::channels::traits::ChannelAdapter;
use crate::error::{Result, SensorError};
use crate::platform::{DeviceProbe, SensorEvent, SensorKind, SensorService};
use std::sync::Arc;
use std::time::Duration;

/// Lux assigned to full display brightness.
pub const LUX_PER_BRIGHTNESS: f32 = 1000.0;

/// Rough illuminance estimate from a `0.0..=1.0` brightness level.
pub fn synthetic_lux(brightness: f32) -> f32 {
    brightness.clamp(0.0, 1.0) * LUX_PER_BRIGHTNESS
}

pub struct HardwareLightAdapter {
    platform: PlatformType,
    service: Arc<dyn SensorService>,
}

impl HardwareLightAdapter {
    pub fn new(platform: PlatformType, service: Arc<dyn SensorService>) -> Self {
        Self { platform, service }
    }
}

impl ChannelAdapter for HardwareLightAdapter {
    fn channel(&self) -> ChannelId {
        ChannelId::Light
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, _options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        if !self.service.has_sensor(SensorKind::Light) {
            return Err(SensorError::unavailable("light sensor not available"));
        }
        let callback = Arc::new(move |event: SensorEvent| {
            sink.send(Payload::Light {
                illuminance: event.values[0],
                fidelity: Fidelity::Hardware,
            });
        });
        let id = self.service.register_listener(SensorKind::Light, callback)?;
        Ok(SubscriptionHandle::SensorListener {
            service: Arc::clone(&self.service),
            id,
        })
    }
}

/// Polls display brightness on a fixed period and reports it as lux.
pub struct SyntheticLightAdapter {
    platform: PlatformType,
    probe: Arc<dyn DeviceProbe>,
    period: Duration,
}

impl SyntheticLightAdapter {
    pub fn new(platform: PlatformType, probe: Arc<dyn DeviceProbe>, period: Duration) -> Self {
        Self {
            platform,
            probe,
            period,
        }
    }
}

impl ChannelAdapter for SyntheticLightAdapter {
    fn channel(&self) -> ChannelId {
        ChannelId::Light
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, _options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        let probe = Arc::clone(&self.probe);
        let timer = PollTimer::spawn(self.period, move || {
            if let Some(brightness) = probe.display_brightness() {
                sink.send(Payload::Light {
                    illuminance: synthetic_lux(brightness),
                    fidelity: Fidelity::Synthetic,
                });
            }
        })?;
        Ok(SubscriptionHandle::Timer(timer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::data::Update;
    use crate::platform::VirtualDevice;

    #[test]
    fn test_synthetic_lux_scaling() {
        assert_eq!(synthetic_lux(0.0), 0.0);
        assert_eq!(synthetic_lux(0.25), 250.0);
        assert_eq!(synthetic_lux(1.7), 1000.0);
    }

    #[test]
    fn test_hardware_light_is_tagged_hardware() {
        let device = Arc::new(VirtualDevice::new());
        let adapter = HardwareLightAdapter::new(PlatformType::Android, device.clone());
        let (sink, mut rx) = UpdateSink::detached(ChannelId::Light, PlatformType::Android, 8);
        let _handle = adapter.start(&ChannelOptions::default(), sink).unwrap();

        device.emit_sensor(SensorKind::Light, SensorEvent::scalar(320.0));
        assert_eq!(
            rx.try_recv().unwrap().payload(),
            Some(&Payload::Light {
                illuminance: 320.0,
                fidelity: Fidelity::Hardware,
            })
        );
    }

    #[test]
    fn test_synthetic_light_needs_runtime() {
        let device = Arc::new(VirtualDevice::new());
        let adapter =
            SyntheticLightAdapter::new(PlatformType::Ios, device, Duration::from_millis(500));
        let (sink, _rx) = UpdateSink::detached(ChannelId::Light, PlatformType::Ios, 8);
        assert!(matches!(
            adapter.start(&ChannelOptions::default(), sink),
            Err(SensorError::Runtime(_))
        ));
    }

    #[tokio::test]
    async fn test_synthetic_light_polls_brightness() {
        let device = Arc::new(VirtualDevice::new());
        device.set_brightness(0.8);
        let adapter =
            SyntheticLightAdapter::new(PlatformType::Ios, device.clone(), Duration::from_millis(5));
        let (sink, mut rx) = UpdateSink::detached(ChannelId::Light, PlatformType::Ios, 64);

        let handle = adapter.start(&ChannelOptions::default(), sink).unwrap();
        let update = rx.recv().await.unwrap();
        adapter.stop(handle);

        match update {
            Update::Data {
                payload: Payload::Light { illuminance, fidelity },
                platform,
                ..
            } => {
                assert_eq!(illuminance, 800.0);
                assert_eq!(fidelity, Fidelity::Synthetic);
                assert_eq!(platform, PlatformType::Ios);
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }
}
