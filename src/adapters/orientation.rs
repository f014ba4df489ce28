//! Device orientation, bucketed from a rotation reading.

use crate::channels::config::ChannelOptions;
use crate::channels::data::{ChannelId, DeviceOrientation, Payload, PlatformType};
use crate::channels::handle::SubscriptionHandle;
use crate::channels::multiplexer::UpdateSink;
use crate::channels::traits::ChannelAdapter;
use crate::error::Result;
use crate::platform::{NotificationCenter, SystemEvent, Topic};
use std::sync::Arc;

/// Map a rotation in degrees onto a coarse orientation.
///
/// `[45,135)` and `[225,315)` are landscape, `[135,225)` and the band
/// around zero are portrait. Readings outside `[0,360)` or missing
/// readings are unknown.
pub fn bucket(degrees: Option<i32>) -> DeviceOrientation {
    match degrees {
        Some(d @ 0..=359) => match d {
            45..=134 | 225..=314 => DeviceOrientation::Landscape,
            _ => DeviceOrientation::Portrait,
        },
        _ => DeviceOrientation::Unknown,
    }
}

pub struct OrientationAdapter {
    platform: PlatformType,
    center: Arc<dyn NotificationCenter>,
}

impl OrientationAdapter {
    pub fn new(platform: PlatformType, center: Arc<dyn NotificationCenter>) -> Self {
        Self { platform, center }
    }
}

impl ChannelAdapter for OrientationAdapter {
    fn channel(&self) -> ChannelId {
        ChannelId::DeviceOrientation
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, _options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        let callback = Arc::new(move |event: &SystemEvent| {
            if let SystemEvent::OrientationChanged(degrees) = event {
                sink.send(Payload::Orientation {
                    orientation: bucket(*degrees),
                    degrees: *degrees,
                });
            }
        });
        let id = self.center.subscribe(Topic::Orientation, callback)?;
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

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(bucket(Some(0)), DeviceOrientation::Portrait);
        assert_eq!(bucket(Some(44)), DeviceOrientation::Portrait);
        assert_eq!(bucket(Some(45)), DeviceOrientation::Landscape);
        assert_eq!(bucket(Some(134)), DeviceOrientation::Landscape);
        assert_eq!(bucket(Some(135)), DeviceOrientation::Portrait);
        assert_eq!(bucket(Some(224)), DeviceOrientation::Portrait);
        assert_eq!(bucket(Some(225)), DeviceOrientation::Landscape);
        assert_eq!(bucket(Some(314)), DeviceOrientation::Landscape);
        assert_eq!(bucket(Some(315)), DeviceOrientation::Portrait);
        assert_eq!(bucket(Some(359)), DeviceOrientation::Portrait);
    }

    #[test]
    fn test_bucket_unknown_readings() {
        assert_eq!(bucket(None), DeviceOrientation::Unknown);
        assert_eq!(bucket(Some(-1)), DeviceOrientation::Unknown);
        assert_eq!(bucket(Some(360)), DeviceOrientation::Unknown);
    }

    #[test]
    fn test_adapter_emits_bucketed_orientation() {
        let device = Arc::new(VirtualDevice::new());
        let adapter = OrientationAdapter::new(PlatformType::Android, device.clone());
        let (sink, mut rx) = UpdateSink::detached(ChannelId::DeviceOrientation, PlatformType::Android, 8);
        let handle = adapter.start(&ChannelOptions::default(), sink).unwrap();

        device.post(SystemEvent::OrientationChanged(Some(90)));
        device.post(SystemEvent::OrientationChanged(None));

        let orientations: Vec<_> = (0..2)
            .map(|_| match rx.try_recv().unwrap() {
                Update::Data {
                    payload: Payload::Orientation { orientation, .. },
                    ..
                } => orientation,
                other => panic!("unexpected update: {:?}", other),
            })
            .collect();
        assert_eq!(
            orientations,
            vec![DeviceOrientation::Landscape, DeviceOrientation::Unknown]
        );

        adapter.stop(handle);
        assert_eq!(device.subscriber_count(Topic::Orientation), 0);
    }
}
