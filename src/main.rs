use clap::Parser;
use hosted_handshake::application::coordinator::HandshakeCoordinator;
use hosted_handshake::application::observer::OneshotObserver;
use hosted_handshake::domain::channel::OpeningRequest;
use hosted_handshake::domain::keys::NodeKeys;
use hosted_handshake::domain::peer::{PeerIdentity, parse_node_id};
use hosted_handshake::domain::ports::ChannelRegistryRef;
use hosted_handshake::infrastructure::hosted_channel::ClientHostedChannel;
use hosted_handshake::infrastructure::in_memory::{InMemoryChannelRegistry, InMemoryMultiplexer};
#[cfg(feature = "storage-rocksdb")]
use hosted_handshake::infrastructure::rocksdb::RocksDbChannelRegistry;
use hosted_handshake::interfaces::console::host_script::{HostReply, ScriptedHost};
use hosted_handshake::interfaces::console::outcome_writer::OutcomeWriter;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
#[cfg(not(feature = "storage-rocksdb"))]
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Seed of the simulated host when no `--remote` is given.
const DEFAULT_HOST_SEED: &[u8] = b"hosted-handshake demo host";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Wallet seed the local node keys are derived from
    #[arg(long, default_value = "hosted-handshake demo wallet")]
    seed: String,

    /// Hex-encoded node id of the host (defaults to the demo host)
    #[arg(long)]
    remote: Option<String>,

    /// Alias recorded for the channel
    #[arg(long, default_value = "demo host")]
    alias: String,

    /// How the simulated host answers
    #[arg(long, value_enum, default_value_t = HostReply::Accept)]
    host_reply: HostReply,

    /// Channel capacity the host offers, in msat
    #[arg(long, default_value_t = 100_000_000)]
    capacity_msat: u64,

    /// Opening balance the host grants the client, in msat
    #[arg(long, default_value_t = 0)]
    client_balance_msat: u64,

    /// Fail the attempt if it has not resolved after this many seconds
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Print every stored channel after the attempt
    #[arg(long)]
    list: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, results to stdout
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let registry = open_registry(cli.db_path.as_deref())?;

    let keys = NodeKeys::from_seed(cli.seed.as_bytes()).into_diagnostic()?;
    let remote = match &cli.remote {
        Some(node_id) => parse_node_id(node_id).into_diagnostic()?,
        None => {
            NodeKeys::from_seed(DEFAULT_HOST_SEED)
                .into_diagnostic()?
                .node_key
        }
    };
    let peer = PeerIdentity::new(keys.node_key, remote);
    let request = OpeningRequest {
        secret: keys.peer_secret(&remote),
        refund_key: keys.refund_key(&remote).into_diagnostic()?,
        alias: cli.alias,
    };

    let multiplexer = InMemoryMultiplexer::new();
    let coordinator = HandshakeCoordinator::new(
        peer,
        request,
        registry.clone(),
        Arc::new(multiplexer.clone()),
        ClientHostedChannel::factory(),
    );

    let (observer, outcome) = OneshotObserver::channel();
    let handle = coordinator.start(observer).await;
    let timer = handle.expire_after(Duration::from_secs(cli.timeout_secs));

    ScriptedHost::new(
        multiplexer,
        peer,
        cli.capacity_msat,
        cli.client_balance_msat,
    )
    .play(cli.host_reply)
    .await;

    let outcome = outcome.await.into_diagnostic()?;
    timer.abort();

    let stdout = io::stdout();
    let mut writer = OutcomeWriter::new(stdout.lock());
    writer.write_outcome(&outcome).into_diagnostic()?;
    if cli.list {
        let channels = registry.all_channels().await.into_diagnostic()?;
        writer.write_channels(&channels).into_diagnostic()?;
    }

    Ok(())
}

fn open_registry(db_path: Option<&Path>) -> Result<ChannelRegistryRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let registry = RocksDbChannelRegistry::open(path).into_diagnostic()?;
            Ok(Arc::new(registry))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
            Ok(Arc::new(InMemoryChannelRegistry::new()))
        }
        None => Ok(Arc::new(InMemoryChannelRegistry::new())),
    }
}
