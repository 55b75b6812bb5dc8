//! In-Memory Shard Backend
//!
//! Keeps shards, metadata and decoded output in process memory. Used by
//! tests and by benchmark runs that should not touch the disk.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::ports::ShardBackend;
use crate::ec::metadata::RunMetadata;
use crate::error::{Error, Result};

/// Backend statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBackendStats {
    /// Shards currently stored
    pub shard_count: u64,
    /// Bytes written to shards
    pub bytes_written: u64,
    /// Bytes read from shards
    pub bytes_read: u64,
}

/// In-memory backend.
/// Uses DashMap for lock-free per-shard access.
#[derive(Default)]
pub struct InMemoryBackend {
    shards: DashMap<usize, BytesMut>,
    metadata: RwLock<Option<RunMetadata>>,
    pending: RwLock<Option<BytesMut>>,
    decoded: RwLock<Option<Bytes>>,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a shard's contents
    pub fn shard(&self, shard: usize) -> Option<Bytes> {
        self.shards
            .get(&shard)
            .map(|s| Bytes::copy_from_slice(&s))
    }

    /// Replace a shard's contents
    pub fn put_shard(&self, shard: usize, data: Bytes) {
        self.shards.insert(shard, BytesMut::from(&data[..]));
    }

    /// Delete a shard, simulating a lost device
    pub fn remove_shard(&self, shard: usize) -> bool {
        self.shards.remove(&shard).is_some()
    }

    /// The committed decoded output, if any
    pub fn decoded(&self) -> Option<Bytes> {
        self.decoded.read().clone()
    }

    /// Whether uncommitted decoded output exists
    pub fn has_pending_output(&self) -> bool {
        self.pending.read().is_some()
    }

    pub fn stats(&self) -> MemoryBackendStats {
        MemoryBackendStats {
            shard_count: self.shards.len() as u64,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl ShardBackend for InMemoryBackend {
    async fn shard_len(&self, shard: usize) -> Result<Option<u64>> {
        Ok(self.shards.get(&shard).map(|s| s.len() as u64))
    }

    async fn read_shard(&self, shard: usize, offset: u64, buf: &mut [u8]) -> Result<()> {
        let data = self
            .shards
            .get(&shard)
            .ok_or_else(|| Error::Internal(format!("shard {} does not exist", shard)))?;

        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            return Err(Error::Internal(format!(
                "shard {} has {} bytes, read wants {}..{}",
                shard,
                data.len(),
                start,
                end
            )));
        }

        buf.copy_from_slice(&data[start..end]);
        drop(data);
        self.bytes_read.fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn write_shard(&self, shard: usize, data: &[u8], append: bool) -> Result<()> {
        let mut entry = self.shards.entry(shard).or_default();
        if !append {
            entry.clear();
        }
        entry.extend_from_slice(data);

        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn load_metadata(&self) -> Result<RunMetadata> {
        self.metadata
            .read()
            .clone()
            .ok_or_else(|| Error::MetadataNotFound("in-memory backend".to_string()))
    }

    async fn store_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        *self.metadata.write() = Some(metadata.clone());
        Ok(())
    }

    async fn write_decoded(&self, data: &[u8], append: bool) -> Result<()> {
        let mut pending = self.pending.write();
        if append {
            if let Some(buf) = pending.as_mut() {
                buf.extend_from_slice(data);
                return Ok(());
            }
        }
        *pending = Some(BytesMut::from(data));
        Ok(())
    }

    async fn commit_decoded(&self) -> Result<()> {
        let pending = self.pending.write().take().unwrap_or_default();
        *self.decoded.write() = Some(pending.freeze());
        Ok(())
    }

    async fn discard_decoded(&self) -> Result<()> {
        self.pending.write().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read_shard() {
        let backend = InMemoryBackend::new();
        backend.write_shard(2, b"abcd", false).await.unwrap();
        backend.write_shard(2, b"efgh", true).await.unwrap();

        assert_eq!(backend.shard_len(2).await.unwrap(), Some(8));
        assert_eq!(backend.shard_len(3).await.unwrap(), None);

        let mut buf = [0u8; 4];
        backend.read_shard(2, 4, &mut buf).await.unwrap();
        assert_eq!(&buf, b"efgh");
    }

    #[tokio::test]
    async fn test_write_shard_truncates() {
        let backend = InMemoryBackend::new();
        backend.write_shard(0, b"abcdef", false).await.unwrap();
        backend.write_shard(0, b"xy", false).await.unwrap();
        assert_eq!(backend.shard(0).unwrap(), Bytes::from_static(b"xy"));
    }

    #[tokio::test]
    async fn test_short_read_fails() {
        let backend = InMemoryBackend::new();
        backend.write_shard(0, b"abc", false).await.unwrap();
        let mut buf = [0u8; 4];
        assert!(backend.read_shard(0, 0, &mut buf).await.is_err());
        assert!(backend.read_shard(1, 0, &mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_many_appends_keep_order() {
        let backend = InMemoryBackend::new();
        let mut expected = Vec::new();
        for stripe in 0..500u32 {
            let chunk = stripe.to_le_bytes();
            backend.write_shard(4, &chunk, stripe > 0).await.unwrap();
            expected.extend_from_slice(&chunk);
        }
        assert_eq!(backend.shard_len(4).await.unwrap(), Some(2000));

        let snapshot = backend.shard(4).unwrap();
        assert_eq!(&snapshot[..], &expected[..]);

        // snapshots are detached from later writes
        backend.write_shard(4, b"tail", true).await.unwrap();
        assert_eq!(snapshot.len(), 2000);
        assert_eq!(backend.shard_len(4).await.unwrap(), Some(2004));

        let mut buf = [0u8; 4];
        backend.read_shard(4, 2000, &mut buf).await.unwrap();
        assert_eq!(&buf, b"tail");
    }

    #[tokio::test]
    async fn test_remove_shard() {
        let backend = InMemoryBackend::new();
        backend.write_shard(1, b"abc", false).await.unwrap();
        assert!(backend.remove_shard(1));
        assert!(!backend.remove_shard(1));
        assert_eq!(backend.shard_len(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_metadata_missing() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.load_metadata().await,
            Err(Error::MetadataNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_decoded_output_is_staged() {
        let backend = InMemoryBackend::new();
        backend.write_decoded(b"hello ", false).await.unwrap();
        backend.write_decoded(b"world", true).await.unwrap();
        assert!(backend.decoded().is_none());
        assert!(backend.has_pending_output());

        backend.commit_decoded().await.unwrap();
        assert_eq!(backend.decoded().unwrap(), Bytes::from_static(b"hello world"));
        assert!(!backend.has_pending_output());
    }

    #[tokio::test]
    async fn test_discard_leaves_no_output() {
        let backend = InMemoryBackend::new();
        backend.write_decoded(b"partial", false).await.unwrap();
        backend.discard_decoded().await.unwrap();
        assert!(backend.decoded().is_none());
        assert!(!backend.has_pending_output());
    }

    #[tokio::test]
    async fn test_stats() {
        let backend = InMemoryBackend::new();
        backend.write_shard(0, b"abcd", false).await.unwrap();
        let mut buf = [0u8; 2];
        backend.read_shard(0, 1, &mut buf).await.unwrap();

        let stats = backend.stats();
        assert_eq!(stats.shard_count, 1);
        assert_eq!(stats.bytes_written, 4);
        assert_eq!(stats.bytes_read, 2);
    }
}
