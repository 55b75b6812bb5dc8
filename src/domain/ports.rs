//! Domain Ports (Port/Adapter Pattern)
//!
//! The encode and decode pipelines never touch storage directly. Shards,
//! the metadata record and the decoded output all go through
//! [`ShardBackend`], which infrastructure adapters implement.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │                     ShardBackend                     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │     DirectoryBackend     │     InMemoryBackend       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::ec::metadata::RunMetadata;
use crate::error::Result;

// =============================================================================
// Shard Storage Port
// =============================================================================

/// Port for shard, metadata and decoded-output storage of one object.
///
/// Shard ids are `0..k` for data shards and `k..k+m` for parity shards.
/// Decoded output is staged: [`write_decoded`](Self::write_decoded) appends
/// to a pending result that only becomes visible on
/// [`commit_decoded`](Self::commit_decoded); a failed decode calls
/// [`discard_decoded`](Self::discard_decoded) so no partial output remains.
///
/// # Example
///
/// ```ignore
/// struct ObjectStoreBackend { /* ... */ }
///
/// #[async_trait]
/// impl ShardBackend for ObjectStoreBackend {
///     async fn shard_len(&self, shard: usize) -> Result<Option<u64>> {
///         // HEAD the shard object
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait ShardBackend: Send + Sync {
    /// Length of a stored shard, or `None` when it does not exist.
    async fn shard_len(&self, shard: usize) -> Result<Option<u64>>;

    /// Fill `buf` from a shard starting at `offset`.
    ///
    /// Fails if the shard is missing or shorter than `offset + buf.len()`.
    async fn read_shard(&self, shard: usize, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write shard bytes. `append = false` truncates any previous content.
    async fn write_shard(&self, shard: usize, data: &[u8], append: bool) -> Result<()>;

    /// Load the metadata record of the object.
    async fn load_metadata(&self) -> Result<RunMetadata>;

    /// Persist the metadata record of the object.
    async fn store_metadata(&self, metadata: &RunMetadata) -> Result<()>;

    /// Append to (or with `append = false`, restart) the pending decoded output.
    async fn write_decoded(&self, data: &[u8], append: bool) -> Result<()>;

    /// Publish the pending decoded output.
    async fn commit_decoded(&self) -> Result<()>;

    /// Drop the pending decoded output.
    async fn discard_decoded(&self) -> Result<()>;
}
