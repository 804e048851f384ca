use crate::domain::channel::{ChannelEvent, ChannelInput, ChannelState, OpeningRequest};
use crate::domain::commitments::{HostedChannelRecord, HostedCommitments};
use crate::domain::message::{
    ChannelScopedMessage, ChannelUpdate, HostedMessage, LightningMessage,
};
use crate::domain::peer::PeerIdentity;
use crate::domain::ports::{
    ChannelEffectsRef, ChannelListener, HostedChannel, HostedChannelFactory,
};
use crate::error::ChannelMalfunction;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Client side of the hosted channel opening protocol.
///
/// The exchange is: client `InvokeHostedChannel`, host `InitHostedChannel`,
/// client `StateUpdate`, host `StateUpdate`. The channel is persisted before
/// it reports `Established`. HTLC handling is left to a full implementation;
/// this machine only opens channels.
pub struct ClientHostedChannel {
    peer: PeerIdentity,
    effects: ChannelEffectsRef,
    inner: Mutex<ChannelInner>,
    listeners: RwLock<Vec<Arc<dyn ChannelListener>>>,
}

struct ChannelInner {
    state: ChannelState,
    request: Option<OpeningRequest>,
    pending: Option<HostedCommitments>,
    commitments: Option<HostedCommitments>,
    last_remote_update: Option<ChannelUpdate>,
}

impl ChannelInner {
    fn transition(
        &mut self,
        to: ChannelState,
        commitments: Option<HostedCommitments>,
    ) -> ChannelEvent {
        let from = self.state;
        self.state = to;
        ChannelEvent::Transition {
            from,
            to,
            commitments,
        }
    }

    /// A malfunction during the opening exchange fails the channel.
    fn malfunction(&mut self, error: ChannelMalfunction) -> Vec<ChannelEvent> {
        let context = self.state;
        let mut events = vec![ChannelEvent::Malfunction { error, context }];
        if context == ChannelState::AwaitingAccept {
            self.pending = None;
            events.push(self.transition(ChannelState::Failed, None));
        }
        events
    }
}

impl ClientHostedChannel {
    pub fn new(peer: PeerIdentity, effects: ChannelEffectsRef) -> Self {
        Self {
            peer,
            effects,
            inner: Mutex::new(ChannelInner {
                state: ChannelState::Idle,
                request: None,
                pending: None,
                commitments: None,
                last_remote_update: None,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn factory() -> HostedChannelFactory {
        Box::new(|peer: &PeerIdentity, effects: ChannelEffectsRef| {
            Arc::new(Self::new(*peer, effects)) as Arc<dyn HostedChannel>
        })
    }

    pub async fn commitments(&self) -> Option<HostedCommitments> {
        self.inner.lock().await.commitments.clone()
    }

    /// The most recent routing policy the host gossiped for this channel.
    pub async fn last_remote_update(&self) -> Option<ChannelUpdate> {
        self.inner.lock().await.last_remote_update.clone()
    }

    fn invoke(request: &OpeningRequest) -> LightningMessage {
        LightningMessage::Hosted(HostedMessage::InvokeHostedChannel {
            refund_key: request.refund_key,
            secret: request.secret.clone(),
            alias: request.alias.clone(),
        })
    }

    async fn send(&self, inner: &mut ChannelInner, message: LightningMessage) -> Vec<ChannelEvent> {
        match self.effects.send(vec![message]).await {
            Ok(()) => Vec::new(),
            Err(e) => inner.malfunction(ChannelMalfunction::SendFailed(e.to_string())),
        }
    }

    async fn step(&self, inner: &mut ChannelInner, input: ChannelInput) -> Vec<ChannelEvent> {
        match (inner.state, input) {
            (ChannelState::Idle, ChannelInput::Open(request)) => {
                let invoke = Self::invoke(&request);
                inner.request = Some(request);
                let mut events = vec![inner.transition(ChannelState::AwaitingAccept, None)];
                events.extend(self.send(inner, invoke).await);
                events
            }
            (ChannelState::AwaitingAccept, ChannelInput::SocketOnline) => {
                // The host may have missed the invoke if the socket dropped.
                match inner.request.as_ref().map(Self::invoke) {
                    Some(invoke) => self.send(inner, invoke).await,
                    None => Vec::new(),
                }
            }
            (
                ChannelState::AwaitingAccept,
                ChannelInput::Remote(LightningMessage::Hosted(HostedMessage::InitHostedChannel(
                    init,
                ))),
            ) => {
                if inner.pending.is_some() {
                    return inner.malfunction(ChannelMalfunction::UnexpectedMessage {
                        message: "init_hosted_channel",
                        state: inner.state,
                    });
                }
                let alias = inner
                    .request
                    .as_ref()
                    .map(|r| r.alias.clone())
                    .unwrap_or_default();
                match HostedCommitments::from_init(self.peer, alias, init) {
                    Ok(commitments) => {
                        let update = LightningMessage::Hosted(HostedMessage::StateUpdate {
                            local_updates: commitments.local_updates,
                            remote_updates: commitments.remote_updates,
                        });
                        inner.pending = Some(commitments);
                        self.send(inner, update).await
                    }
                    Err(malfunction) => inner.malfunction(malfunction),
                }
            }
            (
                ChannelState::AwaitingAccept,
                ChannelInput::Remote(LightningMessage::Hosted(HostedMessage::StateUpdate {
                    ..
                })),
            ) => {
                let Some(commitments) = inner.pending.take() else {
                    return inner.malfunction(ChannelMalfunction::UnexpectedMessage {
                        message: "state_update",
                        state: inner.state,
                    });
                };
                let record = HostedChannelRecord::established(commitments.clone());
                match self.effects.persist(record).await {
                    Ok(_) => {
                        inner.commitments = Some(commitments.clone());
                        vec![inner.transition(ChannelState::Established, Some(commitments))]
                    }
                    Err(e) => inner.malfunction(ChannelMalfunction::PersistFailed(e.to_string())),
                }
            }
            (
                state,
                ChannelInput::Remote(LightningMessage::Scoped(ChannelScopedMessage::Error {
                    data,
                    ..
                })),
            ) if state != ChannelState::Failed => {
                inner.malfunction(ChannelMalfunction::RemoteError(data))
            }
            (_, ChannelInput::Remote(LightningMessage::ChannelUpdate(update))) => {
                inner.last_remote_update = Some(update);
                Vec::new()
            }
            (ChannelState::AwaitingAccept, ChannelInput::Remote(message)) => {
                inner.malfunction(ChannelMalfunction::UnexpectedMessage {
                    message: message.kind(),
                    state: inner.state,
                })
            }
            (state, input) => {
                debug!(peer = %self.peer, ?state, ?input, "Ignoring channel input");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl HostedChannel for ClientHostedChannel {
    async fn process(&self, input: ChannelInput) {
        let events = {
            let mut inner = self.inner.lock().await;
            self.step(&mut inner, input).await
        };

        // Listeners run without the state lock held, so they may feed the
        // channel again.
        let listeners = self.listeners.read().await.clone();
        for event in events {
            for listener in &listeners {
                listener.on_channel_event(event.clone()).await;
            }
        }
    }

    async fn add_listener(&self, listener: Arc<dyn ChannelListener>) {
        self.listeners.write().await.push(listener);
    }

    async fn state(&self) -> ChannelState {
        self.inner.lock().await.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::PeerSecret;
    use crate::domain::message::InitHostedChannel;
    use crate::domain::ports::{ChannelEffects, ChannelRegistry};
    use crate::error::{HostedError, Result};
    use crate::infrastructure::in_memory::InMemoryChannelRegistry;
    use parking_lot::Mutex as SyncMutex;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn key(byte: u8) -> PublicKey {
        let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
        PublicKey::from_secret_key(&Secp256k1::new(), &secret)
    }

    fn peer() -> PeerIdentity {
        PeerIdentity::new(key(1), key(2))
    }

    fn request() -> OpeningRequest {
        OpeningRequest {
            secret: PeerSecret([5; 32]),
            refund_key: key(3),
            alias: "host".to_string(),
        }
    }

    fn init(capacity: u64, client_balance: u64) -> LightningMessage {
        LightningMessage::Hosted(HostedMessage::InitHostedChannel(InitHostedChannel {
            max_htlc_value_in_flight_msat: capacity,
            htlc_minimum_msat: 1_000,
            max_accepted_htlcs: 30,
            channel_capacity_msat: capacity,
            initial_client_balance_msat: client_balance,
        }))
    }

    fn state_update() -> LightningMessage {
        LightningMessage::Hosted(HostedMessage::StateUpdate {
            local_updates: 0,
            remote_updates: 0,
        })
    }

    struct RecordingEffects {
        sent: SyncMutex<Vec<LightningMessage>>,
        registry: InMemoryChannelRegistry,
        fail_send: bool,
    }

    impl RecordingEffects {
        fn new(fail_send: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: SyncMutex::new(Vec::new()),
                registry: InMemoryChannelRegistry::new(),
                fail_send,
            })
        }

        fn sent_kinds(&self) -> Vec<&'static str> {
            self.sent.lock().iter().map(LightningMessage::kind).collect()
        }
    }

    #[async_trait]
    impl ChannelEffects for RecordingEffects {
        async fn send(&self, messages: Vec<LightningMessage>) -> Result<()> {
            if self.fail_send {
                return Err(HostedError::InternalError("socket closed".to_string()));
            }
            self.sent.lock().extend(messages);
            Ok(())
        }

        async fn persist(&self, record: HostedChannelRecord) -> Result<HostedChannelRecord> {
            self.registry.store(record).await
        }
    }

    #[derive(Default)]
    struct CollectingListener {
        events: SyncMutex<Vec<ChannelEvent>>,
    }

    #[async_trait]
    impl ChannelListener for CollectingListener {
        async fn on_channel_event(&self, event: ChannelEvent) {
            self.events.lock().push(event);
        }
    }

    async fn channel(fail_send: bool) -> (ClientHostedChannel, Arc<RecordingEffects>, Arc<CollectingListener>) {
        let effects = RecordingEffects::new(fail_send);
        let channel = ClientHostedChannel::new(peer(), effects.clone());
        let listener = Arc::new(CollectingListener::default());
        channel.add_listener(listener.clone()).await;
        (channel, effects, listener)
    }

    #[tokio::test]
    async fn test_open_sends_invoke_and_awaits_accept() {
        let (channel, effects, listener) = channel(false).await;

        channel.process(ChannelInput::Open(request())).await;

        assert_eq!(channel.state().await, ChannelState::AwaitingAccept);
        assert_eq!(effects.sent_kinds(), vec!["invoke_hosted_channel"]);
        assert_eq!(
            listener.events.lock().as_slice(),
            &[ChannelEvent::Transition {
                from: ChannelState::Idle,
                to: ChannelState::AwaitingAccept,
                commitments: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_full_exchange_persists_and_establishes() {
        let (channel, effects, listener) = channel(false).await;

        channel.process(ChannelInput::Open(request())).await;
        channel.process(ChannelInput::Remote(init(100_000, 25_000))).await;
        assert_eq!(channel.state().await, ChannelState::AwaitingAccept);
        channel.process(ChannelInput::Remote(state_update())).await;

        assert_eq!(channel.state().await, ChannelState::Established);
        assert_eq!(
            effects.sent_kinds(),
            vec!["invoke_hosted_channel", "state_update"]
        );

        let commitments = channel.commitments().await.unwrap();
        assert_eq!(commitments.local_balance_msat, 25_000);
        assert_eq!(commitments.remote_balance_msat, 75_000);
        assert_eq!(commitments.alias, "host");

        let stored = effects
            .registry
            .existing_hosted_channel(&peer().remote_node_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.commitments, Some(commitments.clone()));

        assert_eq!(
            listener.events.lock().last(),
            Some(&ChannelEvent::Transition {
                from: ChannelState::AwaitingAccept,
                to: ChannelState::Established,
                commitments: Some(commitments),
            })
        );
    }

    #[tokio::test]
    async fn test_socket_online_resends_invoke() {
        let (channel, effects, _listener) = channel(false).await;

        channel.process(ChannelInput::SocketOnline).await;
        assert!(effects.sent_kinds().is_empty());

        channel.process(ChannelInput::Open(request())).await;
        channel.process(ChannelInput::SocketOnline).await;
        assert_eq!(
            effects.sent_kinds(),
            vec!["invoke_hosted_channel", "invoke_hosted_channel"]
        );
    }

    #[tokio::test]
    async fn test_invalid_init_is_a_malfunction() {
        let (channel, _effects, listener) = channel(false).await;

        channel.process(ChannelInput::Open(request())).await;
        channel.process(ChannelInput::Remote(init(1_000, 2_000))).await;

        assert_eq!(channel.state().await, ChannelState::Failed);
        assert!(listener.events.lock().iter().any(|e| matches!(
            e,
            ChannelEvent::Malfunction {
                error: ChannelMalfunction::InvalidParameters(_),
                context: ChannelState::AwaitingAccept,
            }
        )));
    }

    #[tokio::test]
    async fn test_state_update_before_init_is_a_malfunction() {
        let (channel, _effects, listener) = channel(false).await;

        channel.process(ChannelInput::Open(request())).await;
        channel.process(ChannelInput::Remote(state_update())).await;

        assert_eq!(channel.state().await, ChannelState::Failed);
        assert!(listener.events.lock().iter().any(|e| matches!(
            e,
            ChannelEvent::Malfunction {
                error: ChannelMalfunction::UnexpectedMessage {
                    message: "state_update",
                    ..
                },
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_remote_error_is_a_malfunction() {
        let (channel, _effects, listener) = channel(false).await;

        channel.process(ChannelInput::Open(request())).await;
        channel
            .process(ChannelInput::Remote(LightningMessage::Scoped(
                ChannelScopedMessage::Error {
                    channel_id: peer().channel_id(),
                    data: "unknown secret".to_string(),
                },
            )))
            .await;

        assert_eq!(channel.state().await, ChannelState::Failed);
        assert!(listener.events.lock().iter().any(|e| matches!(
            e,
            ChannelEvent::Malfunction {
                error: ChannelMalfunction::RemoteError(data),
                ..
            } if data == "unknown secret"
        )));
    }

    #[tokio::test]
    async fn test_send_failure_is_a_malfunction() {
        let (channel, _effects, listener) = channel(true).await;

        channel.process(ChannelInput::Open(request())).await;

        assert_eq!(channel.state().await, ChannelState::Failed);
        assert!(listener.events.lock().iter().any(|e| matches!(
            e,
            ChannelEvent::Malfunction {
                error: ChannelMalfunction::SendFailed(_),
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_channel_update_is_remembered() {
        let (channel, _effects, listener) = channel(false).await;
        let update = ChannelUpdate {
            short_channel_id: 7,
            timestamp: 100,
            cltv_expiry_delta: 144,
            fee_base_msat: 0,
            fee_proportional_millionths: 10,
        };

        channel.process(ChannelInput::Open(request())).await;
        channel
            .process(ChannelInput::Remote(LightningMessage::ChannelUpdate(
                update.clone(),
            )))
            .await;

        assert_eq!(channel.last_remote_update().await, Some(update));
        assert_eq!(channel.state().await, ChannelState::AwaitingAccept);
        assert_eq!(listener.events.lock().len(), 1);
    }
}
