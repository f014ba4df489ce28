//! Location fixes from the platform location provider.

use crate::channels::config::ChannelOptions;
use crate::channels::data::{ChannelId, Payload, PlatformType};
use crate::channels::handle::SubscriptionHandle;
use crate::channels::multiplexer::UpdateSink;
use crate::channels::traits::{ChannelAdapter, PermissionKind};
use crate::error::{ChannelFault, Result};
use crate::platform::{LocationEvent, LocationService};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Requested update spacing when the caller gives none and the controller
/// did not fill one in.
const FALLBACK_INTERVAL: Duration = Duration::from_millis(crate::DEFAULT_INTERVAL_MS);

pub struct LocationAdapter {
    platform: PlatformType,
    service: Arc<dyn LocationService>,
}

impl LocationAdapter {
    pub fn new(platform: PlatformType, service: Arc<dyn LocationService>) -> Self {
        Self { platform, service }
    }
}

impl ChannelAdapter for LocationAdapter {
    fn channel(&self) -> ChannelId {
        ChannelId::Location
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn permission(&self) -> Option<PermissionKind> {
        Some(PermissionKind::Location)
    }

    fn start(&self, options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        let interval = options.interval().unwrap_or(FALLBACK_INTERVAL);
        let callback = Arc::new(move |event: LocationEvent| match event {
            LocationEvent::Fix(fix) => {
                sink.send(Payload::Location {
                    latitude: Some(fix.latitude),
                    longitude: Some(fix.longitude),
                    altitude: fix.altitude,
                });
            }
            LocationEvent::Failed(reason) => {
                sink.fail(ChannelFault::native(format!("Location provider failed: {}", reason)));
            }
        });

        // Authorization failures surface here as PermissionDenied and are
        // turned into an error update by the controller.
        let id = self.service.request_updates(interval, callback)?;
        debug!(id, interval_ms = interval.as_millis() as u64, "Location updates requested");
        Ok(SubscriptionHandle::LocationRequest {
            service: Arc::clone(&self.service),
            id,
        })
    }
}
