use crate::domain::commitments::HostedChannelRecord;
use crate::domain::message::{ConnectionEvent, LightningMessage};
use crate::domain::peer::{ChannelId, PeerIdentity};
use crate::domain::ports::{ChannelRegistry, ConnectionListener, ConnectionMultiplexer, ListenerId};
use crate::error::Result;
use async_trait::async_trait;
use secp256k1::PublicKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A thread-safe in-memory registry of hosted channels.
///
/// Keyed by remote node id, so a peer can hold at most one hosted channel.
/// Ideal for tests and short-lived demo runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryChannelRegistry {
    channels: Arc<RwLock<HashMap<PublicKey, HostedChannelRecord>>>,
}

impl InMemoryChannelRegistry {
    /// Creates a new, empty in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelRegistry for InMemoryChannelRegistry {
    async fn existing_hosted_channel(
        &self,
        remote_node_id: &PublicKey,
    ) -> Result<Option<HostedChannelRecord>> {
        let channels = self.channels.read().await;
        Ok(channels.get(remote_node_id).cloned())
    }

    async fn store(&self, record: HostedChannelRecord) -> Result<HostedChannelRecord> {
        let mut channels = self.channels.write().await;
        channels.insert(record.peer.remote_node_id, record.clone());
        Ok(record)
    }

    async fn remove(&self, remote_node_id: &PublicKey, channel_id: &ChannelId) -> Result<bool> {
        let mut channels = self.channels.write().await;
        match channels.get(remote_node_id) {
            Some(record) if record.channel_id == *channel_id => {
                channels.remove(remote_node_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn all_channels(&self) -> Result<Vec<HostedChannelRecord>> {
        let channels = self.channels.read().await;
        Ok(channels.values().cloned().collect())
    }
}

type ListenerTable = HashMap<PeerIdentity, Vec<(ListenerId, Arc<dyn ConnectionListener>)>>;

/// An in-process connection multiplexer.
///
/// Inbound traffic is simulated with [`InMemoryMultiplexer::deliver`] and
/// outbound messages are kept per peer for inspection. Delivery iterates a
/// snapshot of the listener list, so listeners may deregister themselves
/// from inside a callback.
#[derive(Default, Clone)]
pub struct InMemoryMultiplexer {
    listeners: Arc<RwLock<ListenerTable>>,
    outbox: Arc<RwLock<HashMap<PeerIdentity, Vec<LightningMessage>>>>,
}

impl InMemoryMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands `event` to every listener registered for `peer`, in
    /// registration order. Returns how many listeners were notified.
    pub async fn deliver(&self, peer: &PeerIdentity, event: ConnectionEvent) -> usize {
        let snapshot: Vec<Arc<dyn ConnectionListener>> = {
            let listeners = self.listeners.read().await;
            listeners
                .get(peer)
                .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default()
        };

        for listener in &snapshot {
            listener.on_connection_event(peer, event.clone()).await;
        }
        snapshot.len()
    }

    pub async fn listener_count(&self, peer: &PeerIdentity) -> usize {
        let listeners = self.listeners.read().await;
        listeners.get(peer).map_or(0, Vec::len)
    }

    /// Messages sent to `peer` so far, oldest first.
    pub async fn sent_to(&self, peer: &PeerIdentity) -> Vec<LightningMessage> {
        let outbox = self.outbox.read().await;
        outbox.get(peer).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ConnectionMultiplexer for InMemoryMultiplexer {
    async fn register(
        &self,
        peer: &PeerIdentity,
        id: ListenerId,
        listener: Arc<dyn ConnectionListener>,
    ) {
        let mut listeners = self.listeners.write().await;
        listeners.entry(*peer).or_default().push((id, listener));
        debug!(%peer, listener = %id, "Listener registered");
    }

    async fn deregister(&self, peer: &PeerIdentity, id: ListenerId) {
        let mut listeners = self.listeners.write().await;
        if let Some(entries) = listeners.get_mut(peer) {
            entries.retain(|(existing, _)| *existing != id);
            if entries.is_empty() {
                listeners.remove(peer);
            }
        }
        debug!(%peer, listener = %id, "Listener deregistered");
    }

    async fn send(&self, peer: &PeerIdentity, message: LightningMessage) -> Result<()> {
        debug!(%peer, kind = message.kind(), "Sending message");
        let mut outbox = self.outbox.write().await;
        outbox.entry(*peer).or_default().push(message);
        Ok(())
    }
}
