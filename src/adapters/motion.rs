//! Raw-sample sensors: accelerometer, gyroscope, magnetometer, barometer
//! and step counter.

use crate::channels::config::ChannelOptions;
use crate::channels::data::{ChannelId, Payload, PlatformType};
use crate::channels::handle::SubscriptionHandle;
use crate::channels::multiplexer::UpdateSink;
use crate::channels::traits::ChannelAdapter;
use crate::error::{Result, SensorError};
use crate::platform::{SensorEvent, SensorKind, SensorService};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Suppresses samples arriving within `interval` of the last admitted one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether a sample observed at `now` should be forwarded.
    pub fn admit(&mut self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return true;
        };
        match self.last {
            Some(last) if now.saturating_duration_since(last) < interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Turns successive hardware step totals into (total, delta) pairs.
#[derive(Debug, Default)]
struct StepTracker {
    previous: Option<u64>,
}

impl StepTracker {
    fn observe(&mut self, total: u64) -> u64 {
        // Counters reset on reboot; treat a decrease as a fresh baseline.
        let delta = match self.previous {
            Some(previous) if total >= previous => total - previous,
            _ => 0,
        };
        self.previous = Some(total);
        delta
    }
}

fn sensor_kind(channel: ChannelId) -> Option<SensorKind> {
    Some(match channel {
        ChannelId::Accelerometer => SensorKind::Accelerometer,
        ChannelId::Gyroscope => SensorKind::Gyroscope,
        ChannelId::Magnetometer => SensorKind::MagneticField,
        ChannelId::Barometer => SensorKind::Pressure,
        ChannelId::StepCounter => SensorKind::StepCounter,
        _ => return None,
    })
}

/// Listener adapter for one sampled sensor.
pub struct SampledSensorAdapter {
    channel: ChannelId,
    kind: SensorKind,
    platform: PlatformType,
    service: Arc<dyn SensorService>,
}

impl SampledSensorAdapter {
    /// Fails for channels that are not raw-sample sensors.
    pub fn new(channel: ChannelId, platform: PlatformType, service: Arc<dyn SensorService>) -> Result<Self> {
        let kind = sensor_kind(channel).ok_or_else(|| {
            SensorError::config_error(format!("{} is not a sampled sensor channel", channel))
        })?;
        Ok(Self {
            channel,
            kind,
            platform,
            service,
        })
    }
}

impl ChannelAdapter for SampledSensorAdapter {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        if !self.service.has_sensor(self.kind) {
            return Err(SensorError::unavailable(format!("{} not available", self.channel)));
        }

        let channel = self.channel;
        let debouncer = Mutex::new(Debouncer::new(options.interval()));
        let steps = Mutex::new(StepTracker::default());
        let callback = Arc::new(move |event: SensorEvent| {
            let admitted = debouncer
                .lock()
                .map(|mut d| d.admit(Instant::now()))
                .unwrap_or(true);
            if !admitted {
                return;
            }
            let [x, y, z] = event.values;
            let payload = match channel {
                ChannelId::Accelerometer => Payload::Accelerometer { x, y, z },
                ChannelId::Gyroscope => Payload::Gyroscope { x, y, z },
                ChannelId::Magnetometer => Payload::Magnetometer { x, y, z },
                ChannelId::Barometer => Payload::Barometer { pressure: x },
                _ => {
                    let total = x.max(0.0) as u64;
                    let delta = steps.lock().map(|mut s| s.observe(total)).unwrap_or(0);
                    Payload::StepCounter {
                        steps: total,
                        delta,
                    }
                }
            };
            sink.send(payload);
        });

        let id = self.service.register_listener(self.kind, callback)?;
        debug!(channel = %self.channel, id, "Sensor listener registered");
        Ok(SubscriptionHandle::SensorListener {
            service: Arc::clone(&self.service),
            id,
        })
    }
}
