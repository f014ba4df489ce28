//! Listener registry: which channels are active and how to stop them.

use super::data::ChannelId;
use super::handle::SubscriptionHandle;
use super::multiplexer::UpdateSink;
use super::traits::ChannelAdapter;
use crate::error::Result;
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Identifier of an update stream that requested a channel.
pub type StreamId = u64;

/// Registry shared between a controller and the streams it opened.
pub type SharedRegistry = Arc<Mutex<ListenerRegistry>>;

/// Lock the registry, recovering from a poisoned lock.
///
/// Release actions run under this lock; a panic in one of them must not
/// prevent the remaining handles from being released later.
pub(crate) fn lock_registry(registry: &SharedRegistry) -> MutexGuard<'_, ListenerRegistry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A successfully started channel, as produced by a handle factory.
pub struct Subscription {
    pub adapter: Arc<dyn ChannelAdapter>,
    pub handle: SubscriptionHandle,
    pub sink: UpdateSink,
}

struct Entry {
    subscription: Subscription,
    owners: BTreeSet<StreamId>,
}

/// Outcome of [`ListenerRegistry::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Started,
    AlreadyActive,
}

/// Map from active channel to the subscription that keeps it alive.
///
/// Entry presence is the only record of whether a channel is active; at
/// most one entry exists per channel.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: HashMap<ChannelId, Entry>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, channel: ChannelId) -> bool {
        self.entries.contains_key(&channel)
    }

    /// Active channels in identifier order.
    pub fn active_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<_> = self.entries.keys().copied().collect();
        channels.sort();
        channels
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Streams currently interested in `channel`.
    pub fn owners(&self, channel: ChannelId) -> Vec<StreamId> {
        self.entries
            .get(&channel)
            .map(|entry| entry.owners.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Activate `channel` on behalf of stream `owner`.
    ///
    /// If the channel is already active the factory is not invoked; `owner`
    /// is only recorded as an additional interested stream. A failing
    /// factory leaves no entry behind.
    pub fn activate<F>(&mut self, channel: ChannelId, owner: StreamId, factory: F) -> Result<Activation>
    where
        F: FnOnce() -> Result<Subscription>,
    {
        if let Some(entry) = self.entries.get_mut(&channel) {
            entry.owners.insert(owner);
            debug!(%channel, owner, "Channel already active, registration skipped");
            return Ok(Activation::AlreadyActive);
        }

        let subscription = factory()?;
        debug!(
            %channel,
            owner,
            handle = subscription.handle.describe(),
            "Channel activated"
        );
        self.entries.insert(
            channel,
            Entry {
                subscription,
                owners: BTreeSet::from([owner]),
            },
        );
        Ok(Activation::Started)
    }

    /// Release the given channels regardless of which streams requested
    /// them. Unknown channels are logged and skipped.
    pub fn deactivate(&mut self, channels: &[ChannelId]) -> Vec<ChannelId> {
        let mut released = Vec::new();
        for &channel in channels {
            match self.entries.remove(&channel) {
                Some(entry) => {
                    release(channel, entry.subscription);
                    released.push(channel);
                }
                None => debug!(%channel, "Deactivate requested for inactive channel"),
            }
        }
        released
    }

    /// Drop `owner`'s interest everywhere, releasing channels nobody else
    /// still wants.
    pub fn release_owner(&mut self, owner: StreamId) -> Vec<ChannelId> {
        let orphaned: Vec<ChannelId> = self
            .entries
            .iter_mut()
            .filter_map(|(channel, entry)| {
                (entry.owners.remove(&owner) && entry.owners.is_empty()).then_some(*channel)
            })
            .collect();
        self.deactivate(&orphaned)
    }

    /// Release every active channel exactly once.
    pub fn deactivate_all(&mut self) -> usize {
        let count = self.entries.len();
        for (channel, entry) in self.entries.drain() {
            release(channel, entry.subscription);
        }
        count
    }
}

impl Drop for ListenerRegistry {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            warn!(
                remaining = self.entries.len(),
                "Registry dropped with active channels, releasing them"
            );
            self.deactivate_all();
        }
    }
}

fn release(channel: ChannelId, subscription: Subscription) {
    let Subscription {
        adapter,
        handle,
        sink,
    } = subscription;
    sink.shut();
    let kind = handle.describe();
    if panic::catch_unwind(AssertUnwindSafe(|| adapter.stop(handle))).is_err() {
        error!(%channel, "Adapter panicked while releasing {}", kind);
    } else {
        debug!(%channel, "Released {}", kind);
    }
}
