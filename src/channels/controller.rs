//! Caller-facing registration API.

use super::config::{ChannelOptions, MonitorConfig, RegisterOptions};
use super::data::{ChannelId, Update};
use super::handle::SubscriptionHandle;
use super::multiplexer::{Multiplexer, UpdateSink, UpdateStream};
use super::registry::{lock_registry, Activation, ListenerRegistry, SharedRegistry, Subscription};
use super::traits::{ChannelAdapter, PermissionGate, PermissionStatus};
use crate::adapters::AdapterCatalog;
use crate::error::{ChannelFault, FaultKind, Result, SensorError};
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Maps requested channels onto adapter registrations and hands back a
/// merged update stream.
pub struct SensorController {
    catalog: AdapterCatalog,
    gate: Arc<dyn PermissionGate>,
    registry: SharedRegistry,
    mux: Multiplexer,
    config: MonitorConfig,
    next_stream: AtomicU64,
}

impl SensorController {
    pub fn new(catalog: AdapterCatalog, gate: Arc<dyn PermissionGate>, config: MonitorConfig) -> Self {
        let mux = Multiplexer::new(config.buffer_capacity);
        Self {
            catalog,
            gate,
            registry: Arc::new(Mutex::new(ListenerRegistry::new())),
            mux,
            config,
            next_stream: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AdapterCatalog {
        &self.catalog
    }

    /// Start every requested channel that is not already running.
    ///
    /// Never fails as a whole: a channel that cannot start produces an
    /// error update on the returned stream (or, for absent hardware, only a
    /// log line) while the remaining channels proceed.
    pub async fn register_channels(
        &self,
        channels: &[ChannelId],
        options: &RegisterOptions,
    ) -> UpdateStream {
        let stream_id = self.next_stream.fetch_add(1, Ordering::Relaxed);
        let requested: BTreeSet<ChannelId> = channels.iter().copied().collect();
        let stream = self
            .mux
            .open(stream_id, requested.clone(), Arc::clone(&self.registry));

        for &channel in &requested {
            self.activate_channel(channel, stream_id, options.for_channel(channel))
                .await;
        }

        info!(
            stream = stream_id,
            channels = requested.len(),
            active = self.active_channels().len(),
            "Channels registered"
        );
        stream
    }

    /// Stop the given channels. Channels that are not active are ignored.
    pub fn unregister_channels(&self, channels: &[ChannelId]) {
        let released = lock_registry(&self.registry).deactivate(channels);
        debug!(
            requested = channels.len(),
            released = released.len(),
            "Channels unregistered"
        );
    }

    pub fn is_active(&self, channel: ChannelId) -> bool {
        lock_registry(&self.registry).is_active(channel)
    }

    pub fn active_channels(&self) -> Vec<ChannelId> {
        lock_registry(&self.registry).active_channels()
    }

    /// Stop everything, including channels still held by open streams.
    pub fn shutdown(&self) -> usize {
        let released = lock_registry(&self.registry).deactivate_all();
        info!(released, "Controller shut down");
        released
    }

    async fn activate_channel(&self, channel: ChannelId, owner: u64, options: ChannelOptions) {
        let Some(adapter) = self.catalog.get(channel) else {
            warn!(%channel, "No adapter for channel on {}", self.config.platform);
            return;
        };

        if let Some(kind) = adapter.permission() {
            if !self.is_active(channel) {
                let status = self.gate.request(kind).await;
                if status != PermissionStatus::Granted {
                    let reason = match status {
                        PermissionStatus::ShowRationale => {
                            format!("{:?} permission requires a rationale before it can be granted", kind)
                        }
                        _ => format!("{:?} permission denied", kind),
                    };
                    warn!(%channel, "{}", reason);
                    self.mux.notify(
                        owner,
                        Update::error(channel, ChannelFault::new(FaultKind::PermissionDenied, reason)),
                    );
                    return;
                }
            }
        }

        let options = self.effective_options(channel, options);
        let result = lock_registry(&self.registry).activate(channel, owner, || {
            let sink = self.mux.sink(channel, adapter.platform());
            match start_guarded(&adapter, &options, sink.clone()) {
                Ok(handle) => Ok(Subscription {
                    adapter: Arc::clone(&adapter),
                    handle,
                    sink,
                }),
                Err(err) => {
                    sink.shut();
                    Err(err)
                }
            }
        });

        match result {
            Ok(Activation::Started) => debug!(%channel, "Adapter started"),
            Ok(Activation::AlreadyActive) => {}
            Err(err) if err.is_unavailable() => {
                warn!(%channel, "Channel not started: {}", err);
            }
            Err(err) => {
                warn!(%channel, "Channel failed to start: {}", err);
                self.mux.notify(owner, Update::error(channel, err));
            }
        }
    }

    /// Fill in defaults the caller left out.
    fn effective_options(&self, channel: ChannelId, options: ChannelOptions) -> ChannelOptions {
        match (channel, options.interval_ms) {
            (ChannelId::Location, None) => ChannelOptions::with_interval_ms(self.config.location_interval_ms),
            _ => options,
        }
    }
}

/// Run `start`, turning a panic into a native error.
fn start_guarded(
    adapter: &Arc<dyn ChannelAdapter>,
    options: &ChannelOptions,
    sink: UpdateSink,
) -> Result<SubscriptionHandle> {
    panic::catch_unwind(AssertUnwindSafe(|| adapter.start(options, sink))).unwrap_or_else(|_| {
        Err(SensorError::native(format!(
            "{} adapter panicked while starting",
            adapter.channel()
        )))
    })
}
