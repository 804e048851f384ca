//! Domain types and the ports the handshake coordinator talks through.

pub mod channel;
pub mod commitments;
pub mod keys;
pub mod message;
pub mod peer;
pub mod ports;
