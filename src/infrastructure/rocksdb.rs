use crate::domain::commitments::HostedChannelRecord;
use crate::domain::peer::ChannelId;
use crate::domain::ports::ChannelRegistry;
use crate::error::{HostedError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use secp256k1::PublicKey;
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing hosted channel records.
pub const CF_HOSTED_CHANNELS: &str = "hosted_channels";

/// A persistent channel registry backed by RocksDB.
///
/// Records live in their own Column Family, keyed by the 33-byte compressed
/// remote node id, with JSON values.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbChannelRegistry {
    db: Arc<DB>,
}

impl RocksDbChannelRegistry {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "hosted_channels" column family exists.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_channels = ColumnFamilyDescriptor::new(CF_HOSTED_CHANNELS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_channels])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn channels_cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_HOSTED_CHANNELS).ok_or_else(|| {
            HostedError::InternalError("Hosted channels column family not found".to_string())
        })
    }
}

#[async_trait]
impl ChannelRegistry for RocksDbChannelRegistry {
    async fn existing_hosted_channel(
        &self,
        remote_node_id: &PublicKey,
    ) -> Result<Option<HostedChannelRecord>> {
        let cf = self.channels_cf()?;
        match self.db.get_cf(cf, remote_node_id.serialize())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, record: HostedChannelRecord) -> Result<HostedChannelRecord> {
        let cf = self.channels_cf()?;
        let key = record.peer.remote_node_id.serialize();
        let value = serde_json::to_vec(&record)?;
        self.db.put_cf(cf, key, value)?;
        Ok(record)
    }

    async fn remove(&self, remote_node_id: &PublicKey, channel_id: &ChannelId) -> Result<bool> {
        let Some(existing) = self.existing_hosted_channel(remote_node_id).await? else {
            return Ok(false);
        };
        if existing.channel_id != *channel_id {
            return Ok(false);
        }
        let cf = self.channels_cf()?;
        self.db.delete_cf(cf, remote_node_id.serialize())?;
        Ok(true)
    }

    async fn all_channels(&self) -> Result<Vec<HostedChannelRecord>> {
        let cf = self.channels_cf()?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}
