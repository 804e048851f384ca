use crate::error::Result;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// The two keys that identify one side of a hosted channel.
///
/// `local_key` is the node key this side uses towards the remote peer and
/// `remote_node_id` is the peer's own node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentity {
    pub local_key: PublicKey,
    pub remote_node_id: PublicKey,
}

impl PeerIdentity {
    pub fn new(local_key: PublicKey, remote_node_id: PublicKey) -> Self {
        Self {
            local_key,
            remote_node_id,
        }
    }

    /// Derives the identifier of the hosted channel between both keys.
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::derive(&self.local_key, &self.remote_node_id)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.remote_node_id)
    }
}

/// Parses a hex-encoded, 33-byte compressed node id.
pub fn parse_node_id(encoded: &str) -> Result<PublicKey> {
    let bytes = hex::decode(encoded.trim())?;
    Ok(PublicKey::from_slice(&bytes)?)
}

/// 32-byte identifier routing channel-scoped messages to one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub [u8; 32]);

impl ChannelId {
    /// SHA-256 over the compressed encodings of both keys, local key first.
    ///
    /// Swapping the arguments yields a different id.
    pub fn derive(local_key: &PublicKey, remote_node_id: &PublicKey) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(local_key.serialize());
        hasher.update(remote_node_id.serialize());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
