#![allow(dead_code)]

use hosted_handshake::application::coordinator::HandshakeCoordinator;
use hosted_handshake::domain::channel::OpeningRequest;
use hosted_handshake::domain::keys::NodeKeys;
use hosted_handshake::domain::message::{
    ConnectionEvent, HostedMessage, InitHostedChannel, LightningMessage,
};
use hosted_handshake::domain::peer::PeerIdentity;
use hosted_handshake::infrastructure::hosted_channel::ClientHostedChannel;
use hosted_handshake::infrastructure::in_memory::{InMemoryChannelRegistry, InMemoryMultiplexer};
use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use std::sync::Arc;

pub fn key(byte: u8) -> PublicKey {
    let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
    PublicKey::from_secret_key(&Secp256k1::new(), &secret)
}

pub fn random_key(rng: &mut impl RngCore) -> PublicKey {
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if let Ok(secret) = SecretKey::from_slice(&bytes) {
            return PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        }
    }
}

/// A client wallet and everything it needs to open a channel with `remote`.
pub struct Client {
    pub keys: NodeKeys,
    pub peer: PeerIdentity,
    pub multiplexer: InMemoryMultiplexer,
    pub registry: InMemoryChannelRegistry,
}

impl Client {
    pub fn new(seed: &[u8], remote: PublicKey) -> Self {
        let keys = NodeKeys::from_seed(seed).unwrap();
        let peer = PeerIdentity::new(keys.node_key, remote);
        Self {
            keys,
            peer,
            multiplexer: InMemoryMultiplexer::new(),
            registry: InMemoryChannelRegistry::new(),
        }
    }

    pub fn request(&self) -> OpeningRequest {
        let remote = self.peer.remote_node_id;
        OpeningRequest {
            secret: self.keys.peer_secret(&remote),
            refund_key: self.keys.refund_key(&remote).unwrap(),
            alias: "test host".to_string(),
        }
    }

    pub fn coordinator(&self) -> HandshakeCoordinator {
        HandshakeCoordinator::new(
            self.peer,
            self.request(),
            Arc::new(self.registry.clone()),
            Arc::new(self.multiplexer.clone()),
            ClientHostedChannel::factory(),
        )
    }

    pub async fn host_says(&self, message: LightningMessage) {
        self.multiplexer
            .deliver(&self.peer, ConnectionEvent::Message(message))
            .await;
    }

    /// Plays a host that accepts the channel with `client_balance_msat`.
    pub async fn host_accepts(&self, capacity_msat: u64, client_balance_msat: u64) {
        self.host_says(init(capacity_msat, client_balance_msat)).await;
        self.host_says(LightningMessage::Hosted(HostedMessage::StateUpdate {
            local_updates: 0,
            remote_updates: 0,
        }))
        .await;
    }
}

pub fn init(capacity_msat: u64, client_balance_msat: u64) -> LightningMessage {
    LightningMessage::Hosted(HostedMessage::InitHostedChannel(InitHostedChannel {
        max_htlc_value_in_flight_msat: capacity_msat,
        htlc_minimum_msat: 1_000,
        max_accepted_htlcs: 30,
        channel_capacity_msat: capacity_msat,
        initial_client_balance_msat: client_balance_msat,
    }))
}
