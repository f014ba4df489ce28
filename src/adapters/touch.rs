//! Window-level touch observation.
//!
//! A window accepts one interception hook per installer, and pointer events
//! pass through it before normal dispatch. [`TouchHub`] installs that hook
//! when its first observer attaches and removes it when the last lease is
//! released, so every touch registration shares one native hook without
//! any process-wide state.

use crate::channels::config::ChannelOptions;
use crate::channels::data::{ChannelId, Payload, PlatformType};
use crate::channels::handle::SubscriptionHandle;
use crate::channels::multiplexer::UpdateSink;
use crate::channels::traits::ChannelAdapter;
use crate::error::Result;
use crate::platform::{ListenerId, TouchCallback, TouchEvent, WindowEvents};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Observers = Arc<Mutex<BTreeMap<u64, TouchCallback>>>;

fn lock_observers(observers: &Observers) -> MutexGuard<'_, BTreeMap<u64, TouchCallback>> {
    observers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct HubState {
    hook: Option<ListenerId>,
    next_observer: u64,
}

/// Reference-counted owner of the window touch hook.
///
/// One hub lives in [`NativeServices`](crate::platform::NativeServices) and
/// is shared by every catalog and controller built from it. The registry
/// holds at most one touch entry per controller, so the count climbs past
/// one when several controllers observe the same window.
pub struct TouchHub {
    window: Arc<dyn WindowEvents>,
    observers: Observers,
    state: Mutex<HubState>,
}

impl TouchHub {
    pub fn new(window: Arc<dyn WindowEvents>) -> Arc<Self> {
        Arc::new(Self {
            window,
            observers: Arc::new(Mutex::new(BTreeMap::new())),
            state: Mutex::new(HubState {
                hook: None,
                next_observer: 1,
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start forwarding touch events to `observer`, installing the window
    /// hook if this is the first observer.
    pub fn attach(self: &Arc<Self>, observer: TouchCallback) -> Result<TouchLease> {
        let mut state = self.lock_state();
        if state.hook.is_none() {
            let observers = Arc::clone(&self.observers);
            let hook: TouchCallback = Arc::new(move |event: &TouchEvent| {
                let targets: Vec<TouchCallback> = lock_observers(&observers).values().cloned().collect();
                for target in &targets {
                    target(event);
                }
            });
            let id = self.window.install_touch_hook(hook)?;
            debug!(hook = id, "Window touch hook installed");
            state.hook = Some(id);
        }

        let id = state.next_observer;
        state.next_observer += 1;
        lock_observers(&self.observers).insert(id, observer);
        Ok(TouchLease {
            hub: Arc::clone(self),
            id: Some(id),
        })
    }

    fn detach(&self, id: u64) {
        let mut state = self.lock_state();
        let remaining = {
            let mut observers = lock_observers(&self.observers);
            observers.remove(&id);
            observers.len()
        };
        if remaining == 0 {
            if let Some(hook) = state.hook.take() {
                self.window.remove_touch_hook(hook);
                debug!(hook, "Window touch hook removed");
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        lock_observers(&self.observers).len()
    }

    pub fn is_hooked(&self) -> bool {
        self.lock_state().hook.is_some()
    }
}

/// One observer's hold on the shared hook. Released on drop.
pub struct TouchLease {
    hub: Arc<TouchHub>,
    id: Option<u64>,
}

impl TouchLease {
    pub fn release(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(id) = self.id.take() {
            self.hub.detach(id);
        }
    }
}

impl Drop for TouchLease {
    fn drop(&mut self) {
        self.detach();
    }
}

pub struct TouchAdapter {
    platform: PlatformType,
    hub: Arc<TouchHub>,
}

impl TouchAdapter {
    pub fn new(platform: PlatformType, hub: Arc<TouchHub>) -> Self {
        Self { platform, hub }
    }

    pub fn hub(&self) -> &Arc<TouchHub> {
        &self.hub
    }
}

impl ChannelAdapter for TouchAdapter {
    fn channel(&self) -> ChannelId {
        ChannelId::TouchGestures
    }

    fn platform(&self) -> PlatformType {
        self.platform
    }

    fn start(&self, _options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle> {
        let observer: TouchCallback = Arc::new(move |event: &TouchEvent| {
            sink.send(Payload::TouchGesture {
                x: event.x,
                y: event.y,
                action: event.action,
            });
        });
        let lease = self.hub.attach(observer)?;
        Ok(SubscriptionHandle::TouchHook(lease))
    }
}
