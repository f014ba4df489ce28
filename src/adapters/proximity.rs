//! Proximity: a hardware distance sensor on Android, the near/far
//! notification on iOS.

use crate::channels::config::ChannelOptions;
use crate::channels::data::{ChannelId, Payload, PlatformType};
use crate::channels::handle::SubscriptionHandle;
use crate::channels::multiplexer::UpdateSink;
use crate::channels::traits::ChannelAdapter;
use crate::error::{Result, SensorError};
use crate::platform::{NotificationCenter, SensorEvent, SensorKind, SensorService, SystemEvent, Topic};
use std::sync::Arc;

/// Distance reported when the platform only knows "near".
pub const NEAR_SENTINEL_CM: f32 = 0.0;
/// Distance reported when the platform only knows "far".
pub const FAR_SENTINEL_CM: f32 = -1.0;

/// Proximity from a distance-reporting sensor.
pub struct HardwareProximityAdapter {
    platform: PlatformType,
    service: Arc<dyn SensorService>,
}

impl HardwareProximityAdapter {
    pub fn new(platform: PlatformType, service: Arc<dyn SensorService>) -> Self {
        Self { platform, service }
    }
}

impl ChannelAdapter for HardwareProximityAdapter {
    fn channel(&self) -> ChannelId {
        ChannelId::Proximity
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, _options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        if !self.service.has_sensor(SensorKind::Proximity) {
            return Err(SensorError::unavailable("proximity sensor not available"));
        }
        // Many sensors only report 0 or their maximum range; anything below
        // the maximum counts as near.
        let max_range = self
            .service
            .maximum_range(SensorKind::Proximity)
            .unwrap_or(f32::INFINITY);
        let callback = Arc::new(move |event: SensorEvent| {
            let distance_cm = event.values[0];
            sink.send(Payload::Proximity {
                distance_cm,
                is_near: distance_cm < max_range,
            });
        });
        let id = self.service.register_listener(SensorKind::Proximity, callback)?;
        Ok(SubscriptionHandle::SensorListener {
            service: Arc::clone(&self.service),
            id,
        })
    }
}

/// Proximity from the system's binary near/far state notification.
pub struct NotifiedProximityAdapter {
    platform: PlatformType,
    center: Arc<dyn NotificationCenter>,
}

impl NotifiedProximityAdapter {
    pub fn new(platform: PlatformType, center: Arc<dyn NotificationCenter>) -> Self {
        Self { platform, center }
    }
}

impl ChannelAdapter for NotifiedProximityAdapter {
    fn channel(&self) -> ChannelId {
        ChannelId::Proximity
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, _options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        let callback = Arc::new(move |event: &SystemEvent| {
            if let SystemEvent::ProximityChanged { near } = event {
                sink.send(Payload::Proximity {
                    distance_cm: if *near { NEAR_SENTINEL_CM } else { FAR_SENTINEL_CM },
                    is_near: *near,
                });
            }
        });
        let id = self.center.subscribe(Topic::Proximity, callback)?;
        Ok(SubscriptionHandle::Observer {
            center: Arc::clone(&self.center),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::data::Update;
    use crate::platform::VirtualDevice;

    fn proximity(update: Update) -> (f32, bool) {
        match update {
            Update::Data {
                payload: Payload::Proximity { distance_cm, is_near },
                ..
            } => (distance_cm, is_near),
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[test]
    fn test_hardware_proximity_compares_against_range() {
        let device = Arc::new(VirtualDevice::new());
        let adapter = HardwareProximityAdapter::new(PlatformType::Android, device.clone());
        let (sink, mut rx) = UpdateSink::detached(ChannelId::Proximity, PlatformType::Android, 8);
        let _handle = adapter.start(&ChannelOptions::default(), sink).unwrap();

        device.emit_sensor(SensorKind::Proximity, SensorEvent::scalar(0.0));
        device.emit_sensor(SensorKind::Proximity, SensorEvent::scalar(5.0));

        assert_eq!(proximity(rx.try_recv().unwrap()), (0.0, true));
        assert_eq!(proximity(rx.try_recv().unwrap()), (5.0, false));
    }

    #[test]
    fn test_hardware_proximity_unavailable() {
        let device = Arc::new(VirtualDevice::with_sensors(&[]));
        let adapter = HardwareProximityAdapter::new(PlatformType::Android, device);
        let (sink, _rx) = UpdateSink::detached(ChannelId::Proximity, PlatformType::Android, 8);
        assert!(adapter
            .start(&ChannelOptions::default(), sink)
            .unwrap_err()
            .is_unavailable());
    }

    #[test]
    fn test_notified_proximity_uses_sentinels() {
        let device = Arc::new(VirtualDevice::new());
        let adapter = NotifiedProximityAdapter::new(PlatformType::Ios, device.clone());
        let (sink, mut rx) = UpdateSink::detached(ChannelId::Proximity, PlatformType::Ios, 8);
        let handle = adapter.start(&ChannelOptions::default(), sink).unwrap();

        device.post(SystemEvent::ProximityChanged { near: true });
        device.post(SystemEvent::ProximityChanged { near: false });

        assert_eq!(proximity(rx.try_recv().unwrap()), (NEAR_SENTINEL_CM, true));
        assert_eq!(proximity(rx.try_recv().unwrap()), (FAR_SENTINEL_CM, false));

        adapter.stop(handle);
        assert_eq!(device.subscriber_count(Topic::Proximity), 0);
    }
}
