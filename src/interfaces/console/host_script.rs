use crate::domain::message::{
    ChannelScopedMessage, ConnectionEvent, HostedMessage, InitHostedChannel, LightningMessage,
};
use crate::domain::peer::PeerIdentity;
use crate::infrastructure::in_memory::InMemoryMultiplexer;
use clap::ValueEnum;
use tracing::info;

/// How the simulated host answers an opening attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HostReply {
    /// Accept the invoke and cross-sign the first state.
    Accept,
    /// Answer with a channel error.
    Reject,
    /// Never answer.
    Silent,
    /// Drop the connection.
    Disconnect,
}

/// Plays the host side of the opening exchange over an in-memory multiplexer.
pub struct ScriptedHost {
    multiplexer: InMemoryMultiplexer,
    peer: PeerIdentity,
    capacity_msat: u64,
    client_balance_msat: u64,
}

impl ScriptedHost {
    pub fn new(
        multiplexer: InMemoryMultiplexer,
        peer: PeerIdentity,
        capacity_msat: u64,
        client_balance_msat: u64,
    ) -> Self {
        Self {
            multiplexer,
            peer,
            capacity_msat,
            client_balance_msat,
        }
    }

    pub async fn play(&self, reply: HostReply) {
        self.deliver(ConnectionEvent::Operational).await;
        if !self.invoked().await {
            info!(peer = %self.peer, "Host saw no invoke, staying quiet");
            return;
        }

        match reply {
            HostReply::Accept => {
                self.deliver_message(LightningMessage::Hosted(HostedMessage::InitHostedChannel(
                    InitHostedChannel {
                        max_htlc_value_in_flight_msat: self.capacity_msat,
                        htlc_minimum_msat: 1_000,
                        max_accepted_htlcs: 30,
                        channel_capacity_msat: self.capacity_msat,
                        initial_client_balance_msat: self.client_balance_msat,
                    },
                )))
                .await;
                self.deliver_message(LightningMessage::Hosted(HostedMessage::StateUpdate {
                    local_updates: 0,
                    remote_updates: 0,
                }))
                .await;
            }
            HostReply::Reject => {
                self.deliver_message(LightningMessage::Scoped(ChannelScopedMessage::Error {
                    channel_id: self.peer.channel_id(),
                    data: "hosted channel refused".to_string(),
                }))
                .await;
            }
            HostReply::Silent => {}
            HostReply::Disconnect => self.deliver(ConnectionEvent::Disconnected).await,
        }
    }

    async fn invoked(&self) -> bool {
        self.multiplexer.sent_to(&self.peer).await.iter().any(|m| {
            matches!(
                m,
                LightningMessage::Hosted(HostedMessage::InvokeHostedChannel { .. })
            )
        })
    }

    async fn deliver_message(&self, message: LightningMessage) {
        self.deliver(ConnectionEvent::Message(message)).await;
    }

    async fn deliver(&self, event: ConnectionEvent) {
        self.multiplexer.deliver(&self.peer, event).await;
    }
}
