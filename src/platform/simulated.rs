//! An in-process virtual device.
//!
//! `VirtualDevice` implements every native source trait and lets callers
//! inject events by hand (tests) or from a background driver (the demo
//! binary, or the host bridge in [`super::host`]). Callbacks are invoked on
//! the caller's thread, outside of the device lock, the same way a native
//! sensor thread would call into a listener.

use super::{
    DeviceProbe, EventCallback, ListenerId, LocationCallback, LocationEvent, LocationFix,
    LocationService, NotificationCenter, SensorCallback, SensorEvent, SensorKind, SensorService,
    SystemEvent, Topic, TouchCallback, TouchEvent, WindowEvents,
};
use crate::channels::data::{ActiveNetwork, LocaleInfo, TouchAction};
use crate::error::{Result, SensorError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

const ALL_SENSORS: [SensorKind; 7] = [
    SensorKind::Accelerometer,
    SensorKind::Gyroscope,
    SensorKind::MagneticField,
    SensorKind::Pressure,
    SensorKind::StepCounter,
    SensorKind::Light,
    SensorKind::Proximity,
];

/// Default proximity range in centimetres.
const PROXIMITY_RANGE_CM: f32 = 5.0;

struct DeviceState {
    sensors: HashSet<SensorKind>,
    sensor_listeners: HashMap<ListenerId, (SensorKind, SensorCallback)>,
    location_listeners: HashMap<ListenerId, (Duration, LocationCallback)>,
    subscribers: HashMap<ListenerId, (Topic, EventCallback)>,
    touch_hooks: HashMap<ListenerId, TouchCallback>,
    location_authorized: bool,
    provider_enabled: bool,
    brightness: Option<f32>,
    volume: Option<u8>,
    locale: Option<LocaleInfo>,
    network: Option<ActiveNetwork>,
}

/// A programmable stand-in for a phone's native frameworks.
pub struct VirtualDevice {
    state: Mutex<DeviceState>,
    next_id: AtomicU64,
    ui_dispatches: AtomicUsize,
}

impl Default for VirtualDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDevice {
    /// A device with every sensor present and location authorized.
    pub fn new() -> Self {
        Self::with_sensors(&ALL_SENSORS)
    }

    /// A device exposing only the given hardware sensors.
    pub fn with_sensors(sensors: &[SensorKind]) -> Self {
        Self {
            state: Mutex::new(DeviceState {
                sensors: sensors.iter().copied().collect(),
                sensor_listeners: HashMap::new(),
                location_listeners: HashMap::new(),
                subscribers: HashMap::new(),
                touch_hooks: HashMap::new(),
                location_authorized: true,
                provider_enabled: true,
                brightness: Some(0.5),
                volume: Some(50),
                locale: super::host::parse_locale("en_US.UTF-8"),
                network: Some(ActiveNetwork::Wifi),
            }),
            next_id: AtomicU64::new(1),
            ui_dispatches: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn allocate_id(&self) -> ListenerId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove a hardware sensor, e.g. to simulate a device without a barometer.
    pub fn remove_sensor(&self, kind: SensorKind) {
        self.lock().sensors.remove(&kind);
    }

    /// Make subsequent location requests fail with a permission error.
    pub fn revoke_location_access(&self) {
        self.lock().location_authorized = false;
    }

    // ── Event injection ────────────────────────────────────────────────

    /// Deliver a sample to every listener registered for `kind`.
    pub fn emit_sensor(&self, kind: SensorKind, event: SensorEvent) -> usize {
        let callbacks: Vec<SensorCallback> = self
            .lock()
            .sensor_listeners
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn emit_location(&self, fix: LocationFix) -> usize {
        self.deliver_location(LocationEvent::Fix(fix))
    }

    pub fn fail_location(&self, reason: impl Into<String>) -> usize {
        self.deliver_location(LocationEvent::Failed(reason.into()))
    }

    fn deliver_location(&self, event: LocationEvent) -> usize {
        let callbacks: Vec<LocationCallback> = self
            .lock()
            .location_listeners
            .values()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in &callbacks {
            callback(event.clone());
        }
        callbacks.len()
    }

    /// Broadcast a device-state event to subscribers of its topic.
    pub fn post(&self, event: SystemEvent) -> usize {
        let topic = event.topic();
        let callbacks: Vec<EventCallback> = self
            .lock()
            .subscribers
            .values()
            .filter(|(t, _)| *t == topic)
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in &callbacks {
            callback(&event);
        }
        callbacks.len()
    }

    /// Dispatch a pointer event through the window.
    ///
    /// Hooks observe the event first; it then always reaches normal UI
    /// dispatch. Returns `true` once the UI has handled it.
    pub fn touch(&self, x: f32, y: f32, action: TouchAction) -> bool {
        let event = TouchEvent { x, y, action };
        let hooks: Vec<TouchCallback> = self.lock().touch_hooks.values().cloned().collect();
        for hook in &hooks {
            hook(&event);
        }
        self.ui_dispatches.fetch_add(1, Ordering::Relaxed);
        true
    }

    // ── State mutation (posts the matching broadcast) ──────────────────

    pub fn set_volume(&self, percent: u8) {
        let percent = percent.min(100);
        self.lock().volume = Some(percent);
        self.post(SystemEvent::VolumeChanged(percent));
    }

    pub fn set_locale(&self, locale: LocaleInfo) {
        self.lock().locale = Some(locale);
        self.post(SystemEvent::LocaleChanged);
    }

    pub fn set_provider_enabled(&self, enabled: bool) {
        self.lock().provider_enabled = enabled;
        self.post(SystemEvent::LocationProvidersChanged);
    }

    pub fn set_brightness(&self, level: f32) {
        self.lock().brightness = Some(level.clamp(0.0, 1.0));
    }

    /// Switch the active network, posting availability and transport changes.
    pub fn set_network(&self, network: ActiveNetwork) {
        let previous = self.lock().network.replace(network);
        if previous == Some(network) {
            return;
        }
        let was_connected = matches!(previous, Some(n) if n != ActiveNetwork::None);
        let connected = network != ActiveNetwork::None;
        if connected && !was_connected {
            self.post(SystemEvent::NetworkAvailable);
        } else if !connected && was_connected {
            self.post(SystemEvent::NetworkLost);
        }
        self.post(SystemEvent::TransportChanged(network));
    }

    // ── Introspection ──────────────────────────────────────────────────

    pub fn sensor_listener_count(&self) -> usize {
        self.lock().sensor_listeners.len()
    }

    pub fn location_listener_count(&self) -> usize {
        self.lock().location_listeners.len()
    }

    /// Interval requested by the most recent location listener.
    pub fn requested_location_interval(&self) -> Option<Duration> {
        let state = self.lock();
        state
            .location_listeners
            .iter()
            .max_by_key(|(id, _)| **id)
            .map(|(_, (interval, _))| *interval)
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lock()
            .subscribers
            .values()
            .filter(|(t, _)| *t == topic)
            .count()
    }

    pub fn touch_hook_count(&self) -> usize {
        self.lock().touch_hooks.len()
    }

    pub fn ui_dispatches(&self) -> usize {
        self.ui_dispatches.load(Ordering::Relaxed)
    }

    /// Total number of native registrations still held.
    pub fn open_registrations(&self) -> usize {
        let state = self.lock();
        state.sensor_listeners.len()
            + state.location_listeners.len()
            + state.subscribers.len()
            + state.touch_hooks.len()
    }

    /// Drive the device with synthetic readings until the task is aborted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_demo(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let device = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut tick: u64 = 0;
            loop {
                interval.tick().await;
                device.demo_step(tick);
                tick = tick.wrapping_add(1);
            }
        })
    }

    fn demo_step(&self, tick: u64) {
        let t = tick as f32 * 0.1;
        self.emit_sensor(
            SensorKind::Accelerometer,
            SensorEvent::vector(t.sin() * 0.3, t.cos() * 0.3, 9.81),
        );
        self.emit_sensor(
            SensorKind::Gyroscope,
            SensorEvent::vector((t * 0.5).sin() * 0.05, 0.0, (t * 0.5).cos() * 0.05),
        );
        self.emit_sensor(
            SensorKind::MagneticField,
            SensorEvent::vector(22.0 + t.sin(), -5.0, 41.0),
        );
        self.emit_sensor(SensorKind::Pressure, SensorEvent::scalar(1013.25 + (t * 0.2).sin()));
        self.emit_sensor(SensorKind::StepCounter, SensorEvent::scalar((tick / 3) as f32));
        self.emit_sensor(SensorKind::Light, SensorEvent::scalar(300.0 + 50.0 * t.sin()));

        if tick % 5 == 0 {
            self.emit_location(LocationFix {
                latitude: 52.52 + tick as f64 * 1e-5,
                longitude: 13.405 + tick as f64 * 1e-5,
                altitude: Some(34.0),
            });
            self.post(SystemEvent::OrientationChanged(Some(((tick * 9) % 360) as i32)));
        }
        if tick % 10 == 0 {
            let near = (tick / 10) % 2 == 1;
            self.emit_sensor(
                SensorKind::Proximity,
                SensorEvent::scalar(if near { 0.0 } else { PROXIMITY_RANGE_CM }),
            );
            self.post(SystemEvent::ProximityChanged { near });
            self.set_brightness(0.3 + 0.4 * ((tick / 10) % 2) as f32);
        }
        if tick % 7 == 0 {
            let x = (tick % 100) as f32 * 3.0;
            self.touch(x, 200.0, TouchAction::Down);
            self.touch(x + 10.0, 210.0, TouchAction::Move);
            self.touch(x + 10.0, 210.0, TouchAction::Up);
        }
    }
}

impl SensorService for VirtualDevice {
    fn has_sensor(&self, kind: SensorKind) -> bool {
        self.lock().sensors.contains(&kind)
    }

    fn maximum_range(&self, kind: SensorKind) -> Option<f32> {
        match kind {
            SensorKind::Proximity => Some(PROXIMITY_RANGE_CM),
            _ => None,
        }
    }

    fn register_listener(&self, kind: SensorKind, callback: SensorCallback) -> Result<ListenerId> {
        let mut state = self.lock();
        if !state.sensors.contains(&kind) {
            return Err(SensorError::unavailable(format!("{:?} sensor not present", kind)));
        }
        let id = self.allocate_id();
        state.sensor_listeners.insert(id, (kind, callback));
        Ok(id)
    }

    fn unregister_listener(&self, id: ListenerId) {
        self.lock().sensor_listeners.remove(&id);
    }
}

impl LocationService for VirtualDevice {
    fn request_updates(
        &self,
        min_interval: Duration,
        callback: LocationCallback,
    ) -> Result<ListenerId> {
        let mut state = self.lock();
        if !state.location_authorized {
            return Err(SensorError::permission_denied(
                "location access is not authorized for this process",
            ));
        }
        let id = self.allocate_id();
        state.location_listeners.insert(id, (min_interval, callback));
        Ok(id)
    }

    fn remove_updates(&self, id: ListenerId) {
        self.lock().location_listeners.remove(&id);
    }

    fn is_provider_enabled(&self) -> bool {
        self.lock().provider_enabled
    }
}

impl NotificationCenter for VirtualDevice {
    fn subscribe(&self, topic: Topic, callback: EventCallback) -> Result<ListenerId> {
        let id = self.allocate_id();
        self.lock().subscribers.insert(id, (topic, callback));
        Ok(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.lock().subscribers.remove(&id);
    }
}

impl DeviceProbe for VirtualDevice {
    fn display_brightness(&self) -> Option<f32> {
        self.lock().brightness
    }

    fn volume_percent(&self) -> Option<u8> {
        self.lock().volume
    }

    fn locale(&self) -> Option<LocaleInfo> {
        self.lock().locale.clone()
    }

    fn active_network(&self) -> Option<ActiveNetwork> {
        self.lock().network
    }
}

impl WindowEvents for VirtualDevice {
    fn install_touch_hook(&self, hook: TouchCallback) -> Result<ListenerId> {
        let id = self.allocate_id();
        self.lock().touch_hooks.insert(id, hook);
        Ok(id)
    }

    fn remove_touch_hook(&self, id: ListenerId) {
        self.lock().touch_hooks.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_sensor_listener_lifecycle() {
        let device = VirtualDevice::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let id = device
            .register_listener(
                SensorKind::Gyroscope,
                Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert_eq!(device.emit_sensor(SensorKind::Gyroscope, SensorEvent::vector(1.0, 2.0, 3.0)), 1);
        assert_eq!(device.emit_sensor(SensorKind::Accelerometer, SensorEvent::scalar(0.0)), 0);
        device.unregister_listener(id);
        assert_eq!(device.emit_sensor(SensorKind::Gyroscope, SensorEvent::scalar(0.0)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_sensor_is_unavailable() {
        let device = VirtualDevice::with_sensors(&[SensorKind::Accelerometer]);
        let err = device
            .register_listener(SensorKind::Pressure, Arc::new(|_| {}))
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_revoked_location_is_permission_error() {
        let device = VirtualDevice::new();
        device.revoke_location_access();
        let err = device
            .request_updates(Duration::from_secs(1), Arc::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, SensorError::PermissionDenied(_)));
    }

    #[test]
    fn test_network_transitions_post_events() {
        let device = VirtualDevice::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        device
            .subscribe(
                Topic::Network,
                Arc::new(move |event| sink.lock().unwrap().push(event.clone())),
            )
            .unwrap();

        device.set_network(ActiveNetwork::None);
        device.set_network(ActiveNetwork::Cellular);
        device.set_network(ActiveNetwork::Cellular);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                SystemEvent::NetworkLost,
                SystemEvent::TransportChanged(ActiveNetwork::None),
                SystemEvent::NetworkAvailable,
                SystemEvent::TransportChanged(ActiveNetwork::Cellular),
            ]
        );
    }

    #[test]
    fn test_touch_reaches_ui_with_hooks() {
        let device = VirtualDevice::new();
        let observed = Arc::new(AtomicUsize::new(0));
        let counter = observed.clone();
        device
            .install_touch_hook(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert!(device.touch(1.0, 2.0, TouchAction::Down));
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(device.ui_dispatches(), 1);
    }
}
