use super::keys::PeerSecret;
use super::peer::ChannelId;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// Messages of the hosted-channel establishment family.
///
/// They carry no channel id: both sides derive it from their node keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostedMessage {
    InvokeHostedChannel {
        refund_key: PublicKey,
        secret: PeerSecret,
        alias: String,
    },
    InitHostedChannel(InitHostedChannel),
    StateUpdate {
        local_updates: u32,
        remote_updates: u32,
    },
}

/// Channel limits and the opening balance proposed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitHostedChannel {
    pub max_htlc_value_in_flight_msat: u64,
    pub htlc_minimum_msat: u64,
    pub max_accepted_htlcs: u16,
    pub channel_capacity_msat: u64,
    pub initial_client_balance_msat: u64,
}

/// Messages addressed to one specific channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelScopedMessage {
    Error {
        channel_id: ChannelId,
        data: String,
    },
    UpdateAddHtlc {
        channel_id: ChannelId,
        id: u64,
        amount_msat: u64,
        payment_hash: [u8; 32],
    },
}

impl ChannelScopedMessage {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            Self::Error { channel_id, .. } | Self::UpdateAddHtlc { channel_id, .. } => *channel_id,
        }
    }
}

/// Gossip describing the routing policy of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    pub short_channel_id: u64,
    pub timestamp: u32,
    pub cltv_expiry_delta: u16,
    pub fee_base_msat: u32,
    pub fee_proportional_millionths: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightningMessage {
    Hosted(HostedMessage),
    Scoped(ChannelScopedMessage),
    ChannelUpdate(ChannelUpdate),
    Ping { num_pong_bytes: u16 },
}

impl LightningMessage {
    /// Short name used in logs and malfunction reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hosted(HostedMessage::InvokeHostedChannel { .. }) => "invoke_hosted_channel",
            Self::Hosted(HostedMessage::InitHostedChannel(_)) => "init_hosted_channel",
            Self::Hosted(HostedMessage::StateUpdate { .. }) => "state_update",
            Self::Scoped(ChannelScopedMessage::Error { .. }) => "error",
            Self::Scoped(ChannelScopedMessage::UpdateAddHtlc { .. }) => "update_add_htlc",
            Self::ChannelUpdate(_) => "channel_update",
            Self::Ping { .. } => "ping",
        }
    }
}

/// What a connection multiplexer tells its listeners about one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Operational,
    Message(LightningMessage),
    Disconnected,
}
