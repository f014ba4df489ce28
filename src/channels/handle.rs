//! Subscription handles: the native resource behind an active channel.

use crate::adapters::touch::TouchLease;
use crate::error::{Result, SensorError};
use crate::platform::{ListenerId, LocationService, NotificationCenter, SensorService};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Whatever must be released to stop one channel.
///
/// Each variant carries its own release action, so the registry never has
/// to inspect what kind of listener it is holding.
pub enum SubscriptionHandle {
    /// Listener registered with the sensor service
    SensorListener {
        service: Arc<dyn SensorService>,
        id: ListenerId,
    },
    /// Location update request
    LocationRequest {
        service: Arc<dyn LocationService>,
        id: ListenerId,
    },
    /// Receiver/observer on the notification center
    Observer {
        center: Arc<dyn NotificationCenter>,
        id: ListenerId,
    },
    /// Timer driving a polled channel
    Timer(PollTimer),
    /// Lease on the shared window touch hook
    TouchHook(TouchLease),
    /// Bare token; the owning adapter's `stop` does all the work
    Token(ListenerId),
}

impl SubscriptionHandle {
    /// Perform the release action matching this handle.
    pub fn release(self) {
        match self {
            SubscriptionHandle::SensorListener { service, id } => service.unregister_listener(id),
            SubscriptionHandle::LocationRequest { service, id } => service.remove_updates(id),
            SubscriptionHandle::Observer { center, id } => center.unsubscribe(id),
            SubscriptionHandle::Timer(timer) => timer.cancel(),
            SubscriptionHandle::TouchHook(lease) => lease.release(),
            SubscriptionHandle::Token(_) => {}
        }
    }

    /// Short label for logs.
    pub fn describe(&self) -> &'static str {
        match self {
            SubscriptionHandle::SensorListener { .. } => "sensor listener",
            SubscriptionHandle::LocationRequest { .. } => "location request",
            SubscriptionHandle::Observer { .. } => "observer",
            SubscriptionHandle::Timer(_) => "poll timer",
            SubscriptionHandle::TouchHook(_) => "touch hook lease",
            SubscriptionHandle::Token(_) => "token",
        }
    }

    /// Native listener id, for handles that have one.
    pub fn listener_id(&self) -> Option<ListenerId> {
        match self {
            SubscriptionHandle::SensorListener { id, .. }
            | SubscriptionHandle::LocationRequest { id, .. }
            | SubscriptionHandle::Observer { id, .. }
            | SubscriptionHandle::Token(id) => Some(*id),
            SubscriptionHandle::Timer(_) | SubscriptionHandle::TouchHook(_) => None,
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.listener_id() {
            Some(id) => write!(f, "SubscriptionHandle({} #{})", self.describe(), id),
            None => write!(f, "SubscriptionHandle({})", self.describe()),
        }
    }
}

/// A repeating task on the caller's tokio runtime.
pub struct PollTimer {
    task: JoinHandle<()>,
}

impl PollTimer {
    /// Call `tick` every `period`, starting immediately.
    ///
    /// Fails when no tokio runtime is running on the current thread.
    pub fn spawn<F>(period: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SensorError::runtime(format!("Polling requires a tokio runtime: {}", e)))?;

        let task = runtime.spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tick();
            }
        });
        Ok(Self { task })
    }

    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
