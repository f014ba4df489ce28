//! Device-state channels driven by system notifications.
//!
//! Each state channel follows one notification topic and maps the events on
//! it to a payload. Channels whose current value can be read synchronously
//! report it once as soon as they start.

use crate::channels::config::ChannelOptions;
use crate::channels::data::{ActiveNetwork, ChannelId, Payload, PlatformType};
use crate::channels::handle::SubscriptionHandle;
use crate::channels::multiplexer::UpdateSink;
use crate::channels::traits::ChannelAdapter;
use crate::error::{Result, SensorError};
use crate::platform::{DeviceProbe, LocationService, NativeServices, NotificationCenter, SystemEvent, Topic};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Snapshot = Arc<dyn Fn() -> Option<Payload> + Send + Sync>;
type Mapper = Arc<dyn Fn(&SystemEvent) -> Option<Payload> + Send + Sync>;

/// Notification-backed adapter for one state channel.
pub struct StateAdapter {
    channel: ChannelId,
    platform: PlatformType,
    topic: Topic,
    center: Arc<dyn NotificationCenter>,
    snapshot: Option<Snapshot>,
    map: Mapper,
}

impl StateAdapter {
    fn new(channel: ChannelId, platform: PlatformType, topic: Topic, center: Arc<dyn NotificationCenter>, map: Mapper) -> Self {
        Self {
            channel,
            platform,
            topic,
            center,
            snapshot: None,
            map,
        }
    }

    fn with_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn screen(platform: PlatformType, services: &NativeServices) -> Self {
        Self::new(
            ChannelId::Screen,
            platform,
            Topic::Screen,
            services.notifications.clone(),
            Arc::new(|event: &SystemEvent| match event {
                SystemEvent::ScreenOn => Some(Payload::Screen { is_on: true }),
                SystemEvent::ScreenOff => Some(Payload::Screen { is_on: false }),
                _ => None,
            }),
        )
    }

    pub fn app_visibility(platform: PlatformType, services: &NativeServices) -> Self {
        Self::new(
            ChannelId::AppVisibility,
            platform,
            Topic::Lifecycle,
            services.notifications.clone(),
            Arc::new(|event: &SystemEvent| match event {
                SystemEvent::Foreground => Some(Payload::AppVisibility { is_visible: true }),
                SystemEvent::Background => Some(Payload::AppVisibility { is_visible: false }),
                _ => None,
            }),
        )
    }

    pub fn connectivity(platform: PlatformType, services: &NativeServices) -> Self {
        let probe = services.probe.clone();
        Self::new(
            ChannelId::Connectivity,
            platform,
            Topic::Network,
            services.notifications.clone(),
            Arc::new(|event: &SystemEvent| match event {
                SystemEvent::NetworkAvailable => Some(Payload::Connectivity { is_connected: true }),
                SystemEvent::NetworkLost => Some(Payload::Connectivity { is_connected: false }),
                _ => None,
            }),
        )
        .with_snapshot(Arc::new(move || {
            probe.active_network().map(|network| Payload::Connectivity {
                is_connected: network != ActiveNetwork::None,
            })
        }))
    }

    pub fn active_network(platform: PlatformType, services: &NativeServices) -> Self {
        let probe = services.probe.clone();
        Self::new(
            ChannelId::ActiveNetwork,
            platform,
            Topic::Network,
            services.notifications.clone(),
            Arc::new(|event: &SystemEvent| match event {
                SystemEvent::TransportChanged(network) => Some(Payload::ActiveNetwork { network: *network }),
                _ => None,
            }),
        )
        .with_snapshot(Arc::new(move || {
            probe
                .active_network()
                .map(|network| Payload::ActiveNetwork { network })
        }))
    }

    /// Provider status is re-read on every change notification; the
    /// notification itself carries no value.
    pub fn location_provider(platform: PlatformType, services: &NativeServices) -> Self {
        let read = provider_reader(services.location.clone());
        let on_change = read.clone();
        Self::new(
            ChannelId::LocationProvider,
            platform,
            Topic::LocationProviders,
            services.notifications.clone(),
            Arc::new(move |event: &SystemEvent| match event {
                SystemEvent::LocationProvidersChanged => on_change(),
                _ => None,
            }),
        )
        .with_snapshot(read)
    }

    pub fn volume(platform: PlatformType, services: &NativeServices) -> Self {
        let probe = services.probe.clone();
        Self::new(
            ChannelId::Volume,
            platform,
            Topic::Volume,
            services.notifications.clone(),
            Arc::new(|event: &SystemEvent| match event {
                SystemEvent::VolumeChanged(percent) => Some(Payload::Volume { percent: *percent }),
                _ => None,
            }),
        )
        .with_snapshot(Arc::new(move || {
            probe.volume_percent().map(|percent| Payload::Volume { percent })
        }))
    }

    pub fn locale(platform: PlatformType, services: &NativeServices) -> Self {
        let read = locale_reader(services.probe.clone());
        let on_change = read.clone();
        Self::new(
            ChannelId::Locale,
            platform,
            Topic::Locale,
            services.notifications.clone(),
            Arc::new(move |event: &SystemEvent| match event {
                SystemEvent::LocaleChanged => on_change(),
                _ => None,
            }),
        )
        .with_snapshot(read)
    }
}

fn provider_reader(location: Arc<dyn LocationService>) -> Snapshot {
    Arc::new(move || {
        Some(Payload::LocationProvider {
            is_enabled: location.is_provider_enabled(),
        })
    })
}

fn locale_reader(probe: Arc<dyn DeviceProbe>) -> Snapshot {
    Arc::new(move || probe.locale().map(Payload::Locale))
}

impl ChannelAdapter for StateAdapter {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, _options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        // Set once a notification has been forwarded. The snapshot is only
        // sent while this is still false, under the same lock, so it can
        // never arrive after a newer value.
        let notified = Arc::new(Mutex::new(false));
        let map = Arc::clone(&self.map);
        let events = sink.clone();
        let seen = Arc::clone(&notified);
        let callback = Arc::new(move |event: &SystemEvent| {
            if let Some(payload) = map(event) {
                let mut seen = lock_flag(&seen);
                *seen = true;
                events.send(payload);
            }
        });
        let id = self.center.subscribe(self.topic, callback)?;

        if let Some(snapshot) = &self.snapshot {
            let current = snapshot();
            let seen = lock_flag(&notified);
            match current {
                Some(_) if *seen => {
                    debug!(channel = %self.channel, "Snapshot superseded by a change notification")
                }
                Some(payload) => {
                    debug!(channel = %self.channel, "Reporting current state");
                    sink.send(payload);
                }
                None => {}
            }
        }

        Ok(SubscriptionHandle::Observer {
            center: Arc::clone(&self.center),
            id,
        })
    }
}

fn lock_flag(flag: &Mutex<bool>) -> MutexGuard<'_, bool> {
    flag.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Adapter for a channel the platform offers no public signal for.
///
/// Starting it always fails with an explanatory `Unsupported` error, which
/// the caller receives as a single error update.
pub struct UnsupportedAdapter {
    channel: ChannelId,
    platform: PlatformType,
    reason: String,
}

impl UnsupportedAdapter {
    pub fn new(channel: ChannelId, platform: PlatformType, reason: impl Into<String>) -> Self {
        Self {
            channel,
            platform,
            reason: reason.into(),
        }
    }
}

impl ChannelAdapter for UnsupportedAdapter {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, _options: &ChannelOptions, _sink: UpdateSink) -> Result<SubscriptionHandle> {
        Err(SensorError::unsupported(format!(
            "{} is not supported on {}: {}",
            self.channel, self.platform, self.reason
        )))
    }
}
