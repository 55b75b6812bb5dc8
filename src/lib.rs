//! stripecode - Stripe-Parallel Reed-Solomon Erasure Coding
//!
//! Splits an object into k data shards and m parity shards, stripe by
//! stripe, and restores it from any k surviving shards. Parity and
//! recovery for each stripe are computed by one worker per destination
//! shard.
//!
//! # Architecture
//!
//! ```text
//! input ─▶ Stripe Encoder ─▶ ShardBackend ─▶ Stripe Decoder ─▶ output
//!              │                                   │
//!              └───── Dot-Product Engine ◀─────────┘
//!                            │
//!                     GF(2^w) kernel
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Directory and in-memory shard backends
//! - [`domain`] - The `ShardBackend` storage port
//! - [`ec`] - Field kernel, planner, classifier and the coding pipelines
//! - [`error`] - Error types
//! - [`metrics`] - Prometheus instruments

pub mod adapters;
pub mod domain;
pub mod ec;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use domain::ShardBackend;
pub use ec::{
    Codec, CodecConfig, DecodeOptions, DecodeReport, EncodeReport, StripeDecoder, StripeEncoder,
    WordSize,
};
pub use error::{Error, Result};
pub use metrics::CodecMetrics;
