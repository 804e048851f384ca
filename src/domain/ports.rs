use super::channel::{ChannelEvent, ChannelInput, ChannelState};
use super::commitments::HostedChannelRecord;
use super::message::{ConnectionEvent, LightningMessage};
use super::peer::{ChannelId, PeerIdentity};
use crate::error::Result;
use async_trait::async_trait;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Stores hosted channels, at most one per remote node.
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    async fn existing_hosted_channel(
        &self,
        remote_node_id: &PublicKey,
    ) -> Result<Option<HostedChannelRecord>>;
    async fn store(&self, record: HostedChannelRecord) -> Result<HostedChannelRecord>;
    /// Removes the record stored for `remote_node_id` if it belongs to
    /// `channel_id`. Returns whether a record was removed.
    async fn remove(&self, remote_node_id: &PublicKey, channel_id: &ChannelId) -> Result<bool>;
    async fn all_channels(&self) -> Result<Vec<HostedChannelRecord>>;
}

pub type ChannelRegistryRef = Arc<dyn ChannelRegistry>;

/// Identifies one listener registration with a multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait ConnectionListener: Send + Sync {
    async fn on_connection_event(&self, peer: &PeerIdentity, event: ConnectionEvent);
}

/// Fans peer connection events out to registered listeners.
///
/// `deregister` must be idempotent and callable from inside a listener
/// callback.
#[async_trait]
pub trait ConnectionMultiplexer: Send + Sync {
    async fn register(
        &self,
        peer: &PeerIdentity,
        id: ListenerId,
        listener: Arc<dyn ConnectionListener>,
    );
    async fn deregister(&self, peer: &PeerIdentity, id: ListenerId);
    async fn send(&self, peer: &PeerIdentity, message: LightningMessage) -> Result<()>;
}

pub type ConnectionMultiplexerRef = Arc<dyn ConnectionMultiplexer>;

#[async_trait]
pub trait ChannelListener: Send + Sync {
    async fn on_channel_event(&self, event: ChannelEvent);
}

/// The only side effects a hosted channel state machine may produce.
#[async_trait]
pub trait ChannelEffects: Send + Sync {
    async fn send(&self, messages: Vec<LightningMessage>) -> Result<()>;
    async fn persist(&self, record: HostedChannelRecord) -> Result<HostedChannelRecord>;
}

pub type ChannelEffectsRef = Arc<dyn ChannelEffects>;

#[async_trait]
pub trait HostedChannel: Send + Sync {
    async fn process(&self, input: ChannelInput);
    async fn add_listener(&self, listener: Arc<dyn ChannelListener>);
    async fn state(&self) -> ChannelState;
}

pub type HostedChannelRef = Arc<dyn HostedChannel>;

/// Builds a fresh state machine bound to the effects of one attempt.
pub type HostedChannelFactory =
    Box<dyn Fn(&PeerIdentity, ChannelEffectsRef) -> HostedChannelRef + Send + Sync>;
