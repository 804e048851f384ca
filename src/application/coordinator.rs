use super::observer::HandshakeObserver;
use crate::domain::channel::{ChannelEvent, ChannelInput, ChannelState, OpeningRequest};
use crate::domain::commitments::{HostedChannelRecord, HostedCommitments};
use crate::domain::message::{ConnectionEvent, LightningMessage};
use crate::domain::peer::{ChannelId, PeerIdentity};
use crate::domain::ports::{
    ChannelEffects, ChannelListener, ChannelRegistryRef, ConnectionListener,
    ConnectionMultiplexerRef, HostedChannel, HostedChannelFactory, HostedChannelRef, ListenerId,
};
use crate::error::{HandshakeError, HostedError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Opens one hosted channel with one remote peer.
///
/// A coordinator drives a single attempt: it refuses to open a second channel
/// with a peer the registry already knows, wires a fresh state machine to the
/// peer connection and reports the outcome to a [`HandshakeObserver`] exactly
/// once. Retrying means building a new coordinator.
pub struct HandshakeCoordinator {
    peer: PeerIdentity,
    request: OpeningRequest,
    registry: ChannelRegistryRef,
    multiplexer: ConnectionMultiplexerRef,
    factory: HostedChannelFactory,
}

impl HandshakeCoordinator {
    /// Creates a coordinator for one attempt.
    ///
    /// # Arguments
    ///
    /// * `peer` - Local node key and remote node id.
    /// * `request` - Peer-specific secret, refund key and alias.
    /// * `registry` - Existence checks and persistence of hosted channels.
    /// * `multiplexer` - The connection to the remote peer.
    /// * `factory` - Builds the channel state machine from the attempt's effects.
    pub fn new(
        peer: PeerIdentity,
        request: OpeningRequest,
        registry: ChannelRegistryRef,
        multiplexer: ConnectionMultiplexerRef,
        factory: HostedChannelFactory,
    ) -> Self {
        Self {
            peer,
            request,
            registry,
            multiplexer,
            factory,
        }
    }

    /// Starts the attempt.
    ///
    /// If the registry already holds a hosted channel with the peer, the
    /// observer's `on_failure` runs before this returns and nothing is
    /// registered or sent. Otherwise the listener is registered, the opening
    /// request is fed into the state machine and the attempt resolves later.
    pub async fn start(self, observer: Arc<dyn HandshakeObserver>) -> AttemptHandle {
        let attempt = Arc::new(Attempt {
            peer: self.peer,
            channel_id: self.peer.channel_id(),
            listener_id: ListenerId::new(),
            state: AtomicU8::new(ChannelState::Idle as u8),
            multiplexer: self.multiplexer.clone(),
            registry: self.registry.clone(),
            observer,
        });
        let handle = AttemptHandle {
            attempt: attempt.clone(),
        };

        match self
            .registry
            .existing_hosted_channel(&self.peer.remote_node_id)
            .await
        {
            Ok(None) => {}
            Ok(Some(existing)) => {
                warn!(peer = %self.peer, channel_id = %existing.channel_id, "Hosted channel already exists");
                attempt.reject(HandshakeError::DuplicateChannel(self.peer.remote_node_id));
                return handle;
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "Channel registry lookup failed");
                attempt.reject(HandshakeError::Registry(e.to_string()));
                return handle;
            }
        }

        let effects = Arc::new(AttemptEffects {
            attempt: attempt.clone(),
        });
        let channel = (self.factory)(&self.peer, effects);
        attempt.advance(ChannelState::Idle, ChannelState::AwaitingAccept);

        channel
            .add_listener(Arc::new(AttemptChannelListener {
                attempt: attempt.clone(),
                channel: Arc::downgrade(&channel),
            }))
            .await;
        self.multiplexer
            .register(
                &self.peer,
                attempt.listener_id,
                Arc::new(AttemptConnectionListener {
                    attempt: attempt.clone(),
                    channel: channel.clone(),
                }),
            )
            .await;

        info!(peer = %self.peer, channel_id = %attempt.channel_id, "Opening hosted channel");
        channel.process(ChannelInput::Open(self.request)).await;
        handle
    }
}

/// Whether a message from the peer belongs to the attempt for `channel_id`.
///
/// Hosted-family messages and channel updates always do; the state machine
/// judges their relevance. Channel-scoped messages only when their id
/// matches. Anything else is dropped.
pub fn routes_to(channel_id: &ChannelId, message: &LightningMessage) -> bool {
    match message {
        LightningMessage::Hosted(_) | LightningMessage::ChannelUpdate(_) => true,
        LightningMessage::Scoped(scoped) => scoped.channel_id() == *channel_id,
        LightningMessage::Ping { .. } => false,
    }
}

/// State shared by the listeners of one attempt.
struct Attempt {
    peer: PeerIdentity,
    channel_id: ChannelId,
    listener_id: ListenerId,
    state: AtomicU8,
    multiplexer: ConnectionMultiplexerRef,
    registry: ChannelRegistryRef,
    observer: Arc<dyn HandshakeObserver>,
}

impl Attempt {
    fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Compare-and-swap on the attempt state. Only one caller can win a
    /// given `from`, which makes every resolution one-shot.
    fn advance(&self, from: ChannelState, to: ChannelState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn reject(&self, error: HandshakeError) {
        if self.advance(ChannelState::Idle, ChannelState::Failed) {
            self.observer.on_failure(error);
        }
    }

    async fn deregister(&self) {
        self.multiplexer
            .deregister(&self.peer, self.listener_id)
            .await;
    }

    async fn establish(&self, commitments: HostedCommitments, channel: HostedChannelRef) -> bool {
        if !self.advance(ChannelState::AwaitingAccept, ChannelState::Established) {
            return false;
        }
        info!(peer = %self.peer, channel_id = %self.channel_id, "Hosted channel established");
        self.observer.on_established(commitments, channel);
        self.deregister().await;
        true
    }

    /// Removes the record a state machine persisted for this attempt after
    /// the attempt had already failed.
    async fn discard_record(&self) {
        match self
            .registry
            .remove(&self.peer.remote_node_id, &self.channel_id)
            .await
        {
            Ok(true) => {
                info!(peer = %self.peer, channel_id = %self.channel_id, "Discarded channel record of a failed attempt")
            }
            Ok(false) => {}
            Err(e) => {
                warn!(peer = %self.peer, channel_id = %self.channel_id, error = %e, "Failed to discard channel record")
            }
        }
    }

    async fn fail(&self, error: HandshakeError) -> bool {
        if !self.advance(ChannelState::AwaitingAccept, ChannelState::Failed) {
            return false;
        }
        self.deregister().await;
        warn!(peer = %self.peer, channel_id = %self.channel_id, error = %error, "Hosted channel opening failed");
        self.observer.on_failure(error);
        true
    }
}

/// Follows the peer connection on behalf of one attempt.
struct AttemptConnectionListener {
    attempt: Arc<Attempt>,
    channel: HostedChannelRef,
}

#[async_trait]
impl ConnectionListener for AttemptConnectionListener {
    async fn on_connection_event(&self, peer: &PeerIdentity, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Operational => {
                self.channel.process(ChannelInput::SocketOnline).await;
            }
            ConnectionEvent::Message(message) => {
                if routes_to(&self.attempt.channel_id, &message) {
                    self.channel.process(ChannelInput::Remote(message)).await;
                } else {
                    debug!(%peer, kind = message.kind(), "Dropping message for another channel");
                }
            }
            ConnectionEvent::Disconnected => {
                // The attempt stays unresolved: reconnecting and timing out
                // belong to the caller.
                debug!(%peer, state = ?self.attempt.state(), "Peer disconnected");
                self.attempt.deregister().await;
            }
        }
    }
}

/// Follows the state machine on behalf of one attempt.
///
/// Holds the machine weakly; the machine holds this listener.
struct AttemptChannelListener {
    attempt: Arc<Attempt>,
    channel: Weak<dyn HostedChannel>,
}

#[async_trait]
impl ChannelListener for AttemptChannelListener {
    async fn on_channel_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Transition {
                from: ChannelState::AwaitingAccept,
                to: ChannelState::Established,
                commitments: Some(commitments),
            } => {
                let Some(channel) = self.channel.upgrade() else {
                    self.attempt
                        .fail(HandshakeError::Cancelled(
                            "channel state machine dropped".to_string(),
                        ))
                        .await;
                    if self.attempt.state() == ChannelState::Failed {
                        self.attempt.discard_record().await;
                    }
                    return;
                };
                if !self.attempt.establish(commitments, channel).await {
                    debug!(channel_id = %self.attempt.channel_id, "Ignoring establishment of a resolved attempt");
                    // Cancelled or timed out while the record was being stored.
                    if self.attempt.state() == ChannelState::Failed {
                        self.attempt.discard_record().await;
                    }
                }
            }
            ChannelEvent::Transition { from, to, .. } => {
                debug!(channel_id = %self.attempt.channel_id, ?from, ?to, "Channel transition");
            }
            ChannelEvent::Malfunction { error, context } => {
                if !self.attempt.fail(HandshakeError::Malfunction(error)).await {
                    debug!(channel_id = %self.attempt.channel_id, ?context, "Ignoring malfunction of a resolved attempt");
                }
            }
        }
    }
}

/// The send and persist capabilities handed to the state machine.
///
/// Persisting is refused once the attempt has resolved.
struct AttemptEffects {
    attempt: Arc<Attempt>,
}

#[async_trait]
impl ChannelEffects for AttemptEffects {
    async fn send(&self, messages: Vec<LightningMessage>) -> Result<()> {
        for message in messages {
            self.attempt
                .multiplexer
                .send(&self.attempt.peer, message)
                .await?;
        }
        Ok(())
    }

    async fn persist(&self, record: HostedChannelRecord) -> Result<HostedChannelRecord> {
        let state = self.attempt.state();
        if state != ChannelState::AwaitingAccept {
            return Err(HostedError::ValidationError(format!(
                "attempt for channel {} is already {}",
                self.attempt.channel_id,
                state.as_str()
            )));
        }
        self.attempt.registry.store(record).await
    }
}

/// Caller-side view of a running attempt.
#[derive(Clone)]
pub struct AttemptHandle {
    attempt: Arc<Attempt>,
}

impl AttemptHandle {
    pub fn peer(&self) -> &PeerIdentity {
        &self.attempt.peer
    }

    pub fn channel_id(&self) -> ChannelId {
        self.attempt.channel_id
    }

    pub fn state(&self) -> ChannelState {
        self.attempt.state()
    }

    pub fn is_resolved(&self) -> bool {
        self.state().is_terminal()
    }

    /// Fails a pending attempt with `error`: the listener is deregistered
    /// and the observer's `on_failure` runs. Returns `false` if the attempt
    /// had already resolved.
    pub async fn cancel(&self, error: HandshakeError) -> bool {
        self.attempt.fail(error).await
    }

    /// Cancels the attempt with [`HandshakeError::TimedOut`] unless it
    /// resolves within `timeout`.
    pub fn expire_after(&self, timeout: Duration) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if handle.cancel(HandshakeError::TimedOut(timeout)).await {
                warn!(peer = %handle.peer(), ?timeout, "Hosted channel opening timed out");
            }
        })
    }
}
