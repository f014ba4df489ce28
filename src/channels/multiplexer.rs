//! Update stream multiplexer.
//!
//! Every [`UpdateStream`] owns a bounded buffer of its own. A [`Router`]
//! fans each adapter update out to the buffers of the streams that asked
//! for its channel, so one stream's traffic never evicts another's. Native
//! callbacks never block: when a consumer falls behind, its buffer
//! overwrites the oldest pending update and the consumer skips ahead.

use super::data::{ChannelId, Payload, PlatformType, Update};
use super::registry::{lock_registry, SharedRegistry, StreamId};
use crate::error::ChannelFault;
use futures_util::{Stream, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{ready, Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

#[derive(Clone)]
enum Target {
    Routed(Arc<Router>),
    Bus(broadcast::Sender<Update>),
}

/// Emitter handed to an adapter when it starts.
///
/// Cheap to clone and safe to call from any native callback thread. Once the
/// owning registry entry is released the sink goes dead and silently drops
/// everything, so a callback racing with teardown cannot leak an update past
/// the stop point.
#[derive(Clone)]
pub struct UpdateSink {
    channel: ChannelId,
    platform: PlatformType,
    target: Target,
    live: Arc<AtomicBool>,
}

impl UpdateSink {
    fn new(channel: ChannelId, platform: PlatformType, target: Target) -> Self {
        Self {
            channel,
            platform,
            target,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A sink on a private bus, for driving an adapter without a controller.
    pub fn detached(
        channel: ChannelId,
        platform: PlatformType,
        capacity: usize,
    ) -> (Self, broadcast::Receiver<Update>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self::new(channel, platform, Target::Bus(tx)), rx)
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn platform(&self) -> PlatformType {
        self.platform
    }

    /// Emit a data update. Returns `false` if nothing will see it.
    pub fn send(&self, payload: Payload) -> bool {
        self.emit(Update::data(payload, self.platform))
    }

    /// Emit an error update for this sink's channel.
    pub fn fail(&self, fault: impl Into<ChannelFault>) -> bool {
        self.emit(Update::error(self.channel, fault))
    }

    pub fn emit(&self, update: Update) -> bool {
        if !self.is_live() {
            return false;
        }
        match &self.target {
            Target::Routed(router) => router.deliver(update) > 0,
            Target::Bus(tx) => tx.send(update).is_ok(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub(crate) fn shut(&self) {
        self.live.store(false, Ordering::Release);
    }
}

struct Route {
    channels: BTreeSet<ChannelId>,
    tx: broadcast::Sender<Update>,
}

/// Per-stream buffers keyed by stream id.
///
/// Delivery happens under one lock, so every stream sees updates in the
/// order adapters emitted them.
struct Router {
    capacity: usize,
    routes: Mutex<HashMap<StreamId, Route>>,
}

impl Router {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            routes: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StreamId, Route>> {
        self.routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open(&self, id: StreamId, channels: BTreeSet<ChannelId>) -> broadcast::Receiver<Update> {
        let (tx, rx) = broadcast::channel(self.capacity);
        self.lock().insert(id, Route { channels, tx });
        rx
    }

    fn close(&self, id: StreamId) {
        self.lock().remove(&id);
    }

    /// Copy `update` into every stream that requested its channel. Returns
    /// how many streams received it.
    fn deliver(&self, update: Update) -> usize {
        let channel = update.channel();
        self.lock()
            .values()
            .filter(|route| route.channels.contains(&channel))
            .filter(|route| route.tx.send(update.clone()).is_ok())
            .count()
    }

    /// Hand `update` to one stream only.
    fn deliver_to(&self, id: StreamId, update: Update) -> bool {
        match self.lock().get(&id) {
            Some(route) => route.tx.send(update).is_ok(),
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Fan-out point between adapters and the streams of one controller.
pub struct Multiplexer {
    router: Arc<Router>,
}

impl Multiplexer {
    pub fn new(capacity: usize) -> Self {
        Self {
            router: Arc::new(Router::new(capacity)),
        }
    }

    /// Buffer size of each stream.
    pub fn capacity(&self) -> usize {
        self.router.capacity
    }

    /// A fresh sink for one activation of `channel`.
    pub fn sink(&self, channel: ChannelId, platform: PlatformType) -> UpdateSink {
        UpdateSink::new(channel, platform, Target::Routed(Arc::clone(&self.router)))
    }

    /// Open the buffer for stream `id`. Call this before activating its
    /// channels so no early update is missed.
    pub fn open(
        &self,
        id: StreamId,
        channels: BTreeSet<ChannelId>,
        registry: SharedRegistry,
    ) -> UpdateStream {
        let rx = self.router.open(id, channels.clone());
        UpdateStream {
            id,
            channels,
            inner: BroadcastStream::new(rx),
            router: Arc::clone(&self.router),
            registry,
            dropped: 0,
            closed: false,
        }
    }

    /// Send an update that did not come from an adapter (start failures,
    /// permission refusals) to the stream that caused it.
    pub fn notify(&self, id: StreamId, update: Update) {
        if !self.router.deliver_to(id, update) {
            debug!(stream = id, "Update for a closed stream discarded");
        }
    }

    pub fn stream_count(&self) -> usize {
        self.router.len()
    }
}

/// Ordered asynchronous sequence of updates for one registration.
///
/// Dropping the stream closes it. Closing releases every channel this
/// stream activated that no other open stream still wants.
pub struct UpdateStream {
    id: StreamId,
    channels: BTreeSet<ChannelId>,
    inner: BroadcastStream<Update>,
    router: Arc<Router>,
    registry: SharedRegistry,
    dropped: u64,
    closed: bool,
}

impl UpdateStream {
    /// Channels this stream yields updates for.
    pub fn channels(&self) -> &BTreeSet<ChannelId> {
        &self.channels
    }

    /// Updates of this stream's own channels skipped because it fell
    /// behind.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop every adapter owned by this stream. Idempotent.
    ///
    /// When this returns, the released adapters have been stopped and the
    /// stream yields nothing further.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.router.close(self.id);
        let released = lock_registry(&self.registry).release_owner(self.id);
        debug!(stream = self.id, released = released.len(), "Update stream closed");
    }
}

impl Stream for UpdateStream {
    type Item = Update;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Update>> {
        let this = self.get_mut();
        loop {
            if this.closed {
                return Poll::Ready(None);
            }
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(update)) => return Poll::Ready(Some(update)),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    this.dropped += skipped;
                    warn!(
                        stream = this.id,
                        skipped, "Consumer fell behind, oldest updates dropped"
                    );
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for UpdateStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::registry::ListenerRegistry;
    use futures_util::FutureExt;

    fn empty_registry() -> SharedRegistry {
        Arc::new(Mutex::new(ListenerRegistry::new()))
    }

    fn open(mux: &Multiplexer, id: StreamId, channels: &[ChannelId]) -> UpdateStream {
        mux.open(id, channels.iter().copied().collect(), empty_registry())
    }

    fn volume(percent: u8) -> Payload {
        Payload::Volume { percent }
    }

    fn percents(updates: &[Update]) -> Vec<u8> {
        updates
            .iter()
            .map(|u| match u.payload() {
                Some(Payload::Volume { percent }) => *percent,
                _ => 0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_stream_receives_only_requested_channels() {
        let mux = Multiplexer::new(16);
        let mut stream = open(&mux, 1, &[ChannelId::Volume]);

        assert!(!mux
            .sink(ChannelId::Screen, PlatformType::Android)
            .send(Payload::Screen { is_on: true }));
        assert!(mux.sink(ChannelId::Volume, PlatformType::Android).send(volume(10)));

        let update = stream.next().await.unwrap();
        assert_eq!(update.payload(), Some(&volume(10)));
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let mux = Multiplexer::new(4);
        let mut stream = open(&mux, 1, &[ChannelId::Volume]);
        let sink = mux.sink(ChannelId::Volume, PlatformType::Android);
        for percent in 1..=10 {
            assert!(sink.send(volume(percent)));
        }

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(stream.next().await.unwrap());
        }
        assert_eq!(percents(&received), vec![7, 8, 9, 10]);
        assert_eq!(stream.dropped(), 6);
    }

    #[tokio::test]
    async fn test_busy_channel_does_not_evict_other_streams() {
        let mux = Multiplexer::new(4);
        let mut quiet = open(&mux, 1, &[ChannelId::Volume]);
        let _busy = open(&mux, 2, &[ChannelId::Accelerometer]);

        mux.sink(ChannelId::Volume, PlatformType::Android).send(volume(50));
        let accel = mux.sink(ChannelId::Accelerometer, PlatformType::Android);
        for i in 0..8 {
            accel.send(Payload::Accelerometer { x: i as f32, y: 0.0, z: 9.81 });
        }
        mux.sink(ChannelId::Volume, PlatformType::Android).send(volume(70));

        let received = vec![quiet.next().await.unwrap(), quiet.next().await.unwrap()];
        assert_eq!(percents(&received), vec![50, 70]);
        assert_eq!(quiet.dropped(), 0);
    }

    #[tokio::test]
    async fn test_notify_reaches_one_stream() {
        let mux = Multiplexer::new(4);
        let mut first = open(&mux, 1, &[ChannelId::Screen]);
        let mut second = open(&mux, 2, &[ChannelId::Screen]);

        mux.notify(
            2,
            Update::error(ChannelId::Screen, ChannelFault::new(crate::error::FaultKind::Unsupported, "no API")),
        );
        assert!(matches!(second.next().await, Some(Update::Error { .. })));
        assert!(first.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_dead_sink_drops_updates() {
        let (sink, mut rx) = UpdateSink::detached(ChannelId::Volume, PlatformType::Ios, 4);
        sink.shut();

        assert!(!sink.send(volume(1)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_stream_yields_none() {
        let mux = Multiplexer::new(4);
        let mut stream = open(&mux, 7, &[ChannelId::Volume]);
        mux.sink(ChannelId::Volume, PlatformType::Android).send(volume(3));
        assert_eq!(mux.stream_count(), 1);

        stream.close();
        stream.close();
        assert!(stream.is_closed());
        assert_eq!(mux.stream_count(), 0);
        assert!(stream.next().await.is_none());
    }
}
