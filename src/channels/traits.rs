//! Traits at the seams of the registration engine.

use super::config::ChannelOptions;
use super::data::{ChannelId, PlatformType};
use super::handle::SubscriptionHandle;
use super::multiplexer::UpdateSink;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Driver translating one channel's native events into payloads.
///
/// Implementations are platform specific and are picked when the adapter
/// catalog is composed, not at compile time.
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn channel(&self) -> ChannelId;

    /// Platform tag stamped on every payload this adapter emits.
    fn platform(&self) -> PlatformType;

    /// Permission that must be granted before `start` may run.
    fn permission(&self) -> Option<PermissionKind> {
        None
    }

    /// Register with the native source and begin emitting into `sink`.
    ///
    /// An `Unavailable` error means the channel was never started; every
    /// other error is surfaced to the caller as an error update.
    fn start(&self, options: &ChannelOptions, sink: UpdateSink) -> Result<SubscriptionHandle>;

    /// Release the native resource behind `handle`.
    fn stop(&self, handle: SubscriptionHandle) {
        handle.release();
    }
}

/// Permissions a channel can be gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionKind {
    Location,
}

/// Answer of the permission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The user must be shown a rationale first; treated as not granted.
    ShowRationale,
}

/// External authorization collaborator.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request(&self, kind: PermissionKind) -> PermissionStatus;
}

/// A gate that always answers with the same status.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissionGate {
    status: PermissionStatus,
}

impl StaticPermissionGate {
    pub fn new(status: PermissionStatus) -> Self {
        Self { status }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted)
    }

    pub fn denied() -> Self {
        Self::new(PermissionStatus::Denied)
    }
}

#[async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn request(&self, _kind: PermissionKind) -> PermissionStatus {
        self.status
    }
}
