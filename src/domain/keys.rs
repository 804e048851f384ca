use crate::error::Result;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte secret shared with exactly one remote peer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSecret(pub [u8; 32]);

impl fmt::Debug for PeerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PeerSecret(..)")
    }
}

/// Node key material derived from a wallet seed.
///
/// Peer-specific values are tagged hashes of the node secret and the remote
/// node id, so no two peers ever see the same secret or refund key.
pub struct NodeKeys {
    node_secret: SecretKey,
    pub node_key: PublicKey,
}

impl NodeKeys {
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let node_secret = SecretKey::from_slice(&tagged_hash(b"hosted/node", &[seed]))?;
        let node_key = PublicKey::from_secret_key(&Secp256k1::new(), &node_secret);
        Ok(Self {
            node_secret,
            node_key,
        })
    }

    pub fn peer_secret(&self, remote_node_id: &PublicKey) -> PeerSecret {
        PeerSecret(tagged_hash(
            b"hosted/secret",
            &[&self.node_secret.secret_bytes(), &remote_node_id.serialize()],
        ))
    }

    pub fn refund_key(&self, remote_node_id: &PublicKey) -> Result<PublicKey> {
        let refund_secret = SecretKey::from_slice(&tagged_hash(
            b"hosted/refund",
            &[&self.node_secret.secret_bytes(), &remote_node_id.serialize()],
        ))?;
        Ok(PublicKey::from_secret_key(&Secp256k1::new(), &refund_secret))
    }
}

fn tagged_hash(tag: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(Sha256::digest(tag));
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_keys_are_deterministic() {
        let a = NodeKeys::from_seed(b"seed").unwrap();
        let b = NodeKeys::from_seed(b"seed").unwrap();
        assert_eq!(a.node_key, b.node_key);

        let other = NodeKeys::from_seed(b"other seed").unwrap();
        assert_ne!(a.node_key, other.node_key);
    }

    #[test]
    fn test_peer_specific_material() {
        let keys = NodeKeys::from_seed(b"seed").unwrap();
        let host_a = NodeKeys::from_seed(b"host a").unwrap().node_key;
        let host_b = NodeKeys::from_seed(b"host b").unwrap().node_key;

        assert_ne!(keys.peer_secret(&host_a), keys.peer_secret(&host_b));
        assert_ne!(
            keys.refund_key(&host_a).unwrap(),
            keys.refund_key(&host_b).unwrap()
        );
        assert_eq!(keys.peer_secret(&host_a), keys.peer_secret(&host_a));
    }

    #[test]
    fn test_peer_secret_debug_is_redacted() {
        let secret = PeerSecret([7; 32]);
        assert_eq!(format!("{:?}", secret), "PeerSecret(..)");
    }
}
