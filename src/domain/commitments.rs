use super::channel::ChannelState;
use super::message::InitHostedChannel;
use super::peer::{ChannelId, PeerIdentity};
use crate::error::ChannelMalfunction;
use serde::{Deserialize, Serialize};

/// Finalized state of a hosted channel once the opening handshake completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedCommitments {
    pub peer: PeerIdentity,
    pub channel_id: ChannelId,
    pub alias: String,
    pub params: InitHostedChannel,
    /// Balance owned by this side (the client).
    pub local_balance_msat: u64,
    /// Balance owned by the host.
    pub remote_balance_msat: u64,
    pub local_updates: u32,
    pub remote_updates: u32,
}

impl HostedCommitments {
    /// Builds the opening commitments from the host's proposal.
    ///
    /// The client balance has to fit inside the channel capacity.
    pub fn from_init(
        peer: PeerIdentity,
        alias: String,
        params: InitHostedChannel,
    ) -> Result<Self, ChannelMalfunction> {
        if params.channel_capacity_msat == 0 {
            return Err(ChannelMalfunction::InvalidParameters(
                "Channel capacity must be positive".to_string(),
            ));
        }
        let remote_balance_msat = params
            .channel_capacity_msat
            .checked_sub(params.initial_client_balance_msat)
            .ok_or_else(|| {
                ChannelMalfunction::InvalidParameters(format!(
                    "Client balance {} exceeds capacity {}",
                    params.initial_client_balance_msat, params.channel_capacity_msat
                ))
            })?;

        Ok(Self {
            peer,
            channel_id: peer.channel_id(),
            alias,
            local_balance_msat: params.initial_client_balance_msat,
            remote_balance_msat,
            params,
            local_updates: 0,
            remote_updates: 0,
        })
    }
}

/// What a channel registry stores per remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedChannelRecord {
    pub channel_id: ChannelId,
    pub peer: PeerIdentity,
    pub state: ChannelState,
    pub commitments: Option<HostedCommitments>,
}

impl HostedChannelRecord {
    pub fn established(commitments: HostedCommitments) -> Self {
        Self {
            channel_id: commitments.channel_id,
            peer: commitments.peer,
            state: ChannelState::Established,
            commitments: Some(commitments),
        }
    }
}
