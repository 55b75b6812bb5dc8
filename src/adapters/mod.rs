//! Infrastructure Adapters
//!
//! Implementations of the [`ShardBackend`](crate::domain::ports::ShardBackend)
//! port, following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                ShardBackend (Port Trait)                    │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │     DirectoryBackend (tokio::fs)  │  InMemoryBackend        │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use stripecode::adapters::DirectoryBackend;
//! use stripecode::ec::StripeDecoder;
//!
//! let backend = DirectoryBackend::new("Coding", Path::new("photo.jpg"));
//! let report = StripeDecoder::default().decode(&backend).await?;
//! ```

mod filesystem;
mod memory;

pub use filesystem::{DirectoryBackend, ShardNaming, DEFAULT_CODING_DIR};
pub use memory::{InMemoryBackend, MemoryBackendStats};
