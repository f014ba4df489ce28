//! Per-channel adapters and the catalog that composes them.
//!
//! Android and iOS expose the same channels through different native
//! mechanisms. [`catalog_for`] picks the right adapter flavour for each
//! channel once, when the controller is built.

pub mod light;
pub mod location;
pub mod motion;
pub mod orientation;
pub mod proximity;
pub mod state;
pub mod touch;

use crate::channels::config::MonitorConfig;
use crate::channels::data::{ChannelId, PlatformType};
use crate::channels::traits::ChannelAdapter;
use crate::platform::NativeServices;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub use light::{HardwareLightAdapter, SyntheticLightAdapter};
pub use location::LocationAdapter;
pub use motion::SampledSensorAdapter;
pub use orientation::{bucket, OrientationAdapter};
pub use proximity::{HardwareProximityAdapter, NotifiedProximityAdapter};
pub use state::{StateAdapter, UnsupportedAdapter};
pub use touch::{TouchAdapter, TouchHub, TouchLease};

/// Lookup table from channel to the adapter that serves it.
#[derive(Default, Clone)]
pub struct AdapterCatalog {
    adapters: HashMap<ChannelId, Arc<dyn ChannelAdapter>>,
}

impl AdapterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, adapter: impl ChannelAdapter + 'static) -> Self {
        self.insert(Arc::new(adapter));
        self
    }

    /// Register `adapter` for its channel, replacing any previous one.
    pub fn insert(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters.insert(adapter.channel(), adapter);
    }

    pub fn get(&self, channel: ChannelId) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    pub fn supports(&self, channel: ChannelId) -> bool {
        self.adapters.contains_key(&channel)
    }

    /// Channels with an adapter, in identifier order.
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<_> = self.adapters.keys().copied().collect();
        channels.sort();
        channels
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Build the full adapter set for `config.platform` on top of `services`.
pub fn catalog_for(config: &MonitorConfig, services: &NativeServices) -> AdapterCatalog {
    let platform = config.platform;
    let mut catalog = AdapterCatalog::new();

    for channel in ChannelId::ALL.into_iter().filter(|c| c.is_sampled()) {
        match SampledSensorAdapter::new(channel, platform, services.sensors.clone()) {
            Ok(adapter) => catalog.insert(Arc::new(adapter)),
            Err(e) => warn!(%channel, "Skipping sampled adapter: {}", e),
        }
    }

    catalog = catalog
        .with(LocationAdapter::new(platform, services.location.clone()))
        .with(OrientationAdapter::new(platform, services.notifications.clone()))
        .with(TouchAdapter::new(platform, services.touch.clone()))
        .with(StateAdapter::app_visibility(platform, services))
        .with(StateAdapter::connectivity(platform, services))
        .with(StateAdapter::active_network(platform, services))
        .with(StateAdapter::location_provider(platform, services))
        .with(StateAdapter::volume(platform, services))
        .with(StateAdapter::locale(platform, services));

    match platform {
        PlatformType::Android => catalog
            .with(HardwareProximityAdapter::new(platform, services.sensors.clone()))
            .with(HardwareLightAdapter::new(platform, services.sensors.clone()))
            .with(StateAdapter::screen(platform, services)),
        PlatformType::Ios => catalog
            .with(NotifiedProximityAdapter::new(platform, services.notifications.clone()))
            .with(SyntheticLightAdapter::new(
                platform,
                services.probe.clone(),
                config.light_poll_interval(),
            ))
            .with(UnsupportedAdapter::new(
                ChannelId::Screen,
                platform,
                "screen on/off state is only observable through private APIs",
            )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::VirtualDevice;

    fn services() -> NativeServices {
        NativeServices::from_device(&Arc::new(VirtualDevice::new()))
    }

    #[test]
    fn test_catalog_covers_every_channel_on_both_platforms() {
        for platform in [PlatformType::Android, PlatformType::Ios] {
            let catalog = catalog_for(&MonitorConfig::new(platform), &services());
            assert_eq!(catalog.channels(), ChannelId::ALL.to_vec());
            for channel in ChannelId::ALL {
                assert_eq!(catalog.get(channel).unwrap().platform(), platform);
            }
        }
    }

    #[test]
    fn test_insert_replaces_existing_adapter() {
        let services = services();
        let mut catalog = AdapterCatalog::new().with(HardwareLightAdapter::new(
            PlatformType::Android,
            services.sensors.clone(),
        ));
        catalog.insert(Arc::new(SyntheticLightAdapter::new(
            PlatformType::Ios,
            services.probe.clone(),
            std::time::Duration::from_millis(500),
        )));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(ChannelId::Light).unwrap().platform(), PlatformType::Ios);
    }
}
