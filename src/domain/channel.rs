use super::commitments::HostedCommitments;
use super::keys::PeerSecret;
use super::message::LightningMessage;
use crate::error::ChannelMalfunction;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// Lifecycle of one hosted channel opening attempt.
///
/// Moves once along Idle -> AwaitingAccept -> {Established, Failed}, or
/// straight from Idle to Failed. Established and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ChannelState {
    Idle = 0,
    AwaitingAccept = 1,
    Established = 2,
    Failed = 3,
}

impl ChannelState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Established | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingAccept => "awaiting_accept",
            Self::Established => "established",
            Self::Failed => "failed",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::AwaitingAccept,
            2 => Self::Established,
            _ => Self::Failed,
        }
    }
}

/// The first message of an attempt, fed into the channel state machine.
///
/// Secret and refund key must already be specific to the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningRequest {
    pub secret: PeerSecret,
    pub refund_key: PublicKey,
    pub alias: String,
}

/// Inputs a hosted channel state machine accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInput {
    Open(OpeningRequest),
    SocketOnline,
    Remote(LightningMessage),
}

/// Notifications a hosted channel state machine emits to its listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Transition {
        from: ChannelState,
        to: ChannelState,
        commitments: Option<HostedCommitments>,
    },
    Malfunction {
        error: ChannelMalfunction,
        context: ChannelState,
    },
}
