use crate::domain::channel::ChannelState;
use secp256k1::PublicKey;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by the infrastructure around a handshake: storage,
/// serialization and key handling.
#[derive(Error, Debug)]
pub enum HostedError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Invalid key: {0}")]
    KeyError(#[from] secp256k1::Error),
    #[error("Invalid hex: {0}")]
    HexError(#[from] hex::FromHexError),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, HostedError>;

/// A fault reported by a channel state machine while it is exchanging
/// protocol messages with the remote peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelMalfunction {
    #[error("remote peer reported an error: {0}")]
    RemoteError(String),
    #[error("unexpected {message} while {state:?}")]
    UnexpectedMessage {
        message: &'static str,
        state: ChannelState,
    },
    #[error("invalid channel parameters: {0}")]
    InvalidParameters(String),
    #[error("failed to send to peer: {0}")]
    SendFailed(String),
    #[error("failed to persist channel: {0}")]
    PersistFailed(String),
}

/// The error handed to a handshake observer when an attempt fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("a hosted channel with {0} already exists")]
    DuplicateChannel(PublicKey),
    #[error("protocol malfunction: {0}")]
    Malfunction(#[from] ChannelMalfunction),
    #[error("channel registry unavailable: {0}")]
    Registry(String),
    #[error("handshake timed out after {0:?}")]
    TimedOut(Duration),
    #[error("handshake cancelled: {0}")]
    Cancelled(String),
}
