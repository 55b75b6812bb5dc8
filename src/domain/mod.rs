//! Domain Layer
//!
//! Trait abstractions the coding pipelines depend on.
//!
//! - **Ports** (`ports.rs`) - storage of shards, metadata and decoded output
//!
//! # Usage
//!
//! ```ignore
//! use stripecode::domain::ports::ShardBackend;
//!
//! async fn shard_count<B: ShardBackend + ?Sized>(backend: &B, total: usize) -> Result<usize> {
//!     let mut present = 0;
//!     for shard in 0..total {
//!         if backend.shard_len(shard).await?.is_some() {
//!             present += 1;
//!         }
//!     }
//!     Ok(present)
//! }
//! ```

pub mod ports;

pub use ports::ShardBackend;
