use hosted_handshake::domain::commitments::{HostedChannelRecord, HostedCommitments};
use hosted_handshake::domain::message::{HostedMessage, InitHostedChannel, LightningMessage};
use hosted_handshake::domain::peer::PeerIdentity;
use hosted_handshake::domain::ports::{
    ChannelRegistry, ChannelRegistryRef, ConnectionMultiplexer, ConnectionMultiplexerRef,
};
use hosted_handshake::infrastructure::in_memory::{InMemoryChannelRegistry, InMemoryMultiplexer};
use std::sync::Arc;

mod common;

#[tokio::test]
async fn test_ports_as_trait_objects() {
    let registry: ChannelRegistryRef = Arc::new(InMemoryChannelRegistry::new());
    let multiplexer = InMemoryMultiplexer::new();
    let port: ConnectionMultiplexerRef = Arc::new(multiplexer.clone());

    let peer = PeerIdentity::new(common::key(1), common::key(2));
    let commitments = HostedCommitments::from_init(
        peer,
        "host".to_string(),
        InitHostedChannel {
            max_htlc_value_in_flight_msat: 10_000,
            htlc_minimum_msat: 1,
            max_accepted_htlcs: 5,
            channel_capacity_msat: 10_000,
            initial_client_balance_msat: 0,
        },
    )
    .unwrap();

    // Verify Send + Sync by spawning tasks
    let registry_handle = tokio::spawn(async move {
        registry
            .store(HostedChannelRecord::established(commitments))
            .await
            .unwrap();
        registry
            .existing_hosted_channel(&peer.remote_node_id)
            .await
            .unwrap()
            .unwrap()
    });

    let send_handle = tokio::spawn(async move {
        port.send(
            &peer,
            LightningMessage::Hosted(HostedMessage::StateUpdate {
                local_updates: 0,
                remote_updates: 0,
            }),
        )
        .await
    });

    let record = registry_handle.await.unwrap();
    assert_eq!(record.channel_id, peer.channel_id());

    send_handle.await.unwrap().unwrap();
    assert_eq!(multiplexer.sent_to(&peer).await.len(), 1);
}
