//! Reference adapters for the domain ports.

pub mod hosted_channel;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
