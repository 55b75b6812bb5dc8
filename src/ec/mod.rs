//! Erasure Coding Module
//!
//! Stripe-parallel systematic Reed-Solomon coding over GF(2^w).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Erasure Coding Module                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                          │
//! │  ┌──────────────┐    ┌──────────────┐    ┌───────────────────────────┐  │
//! │  │   Stripe     │    │   Stripe     │    │   Run Metadata            │  │
//! │  │   Encoder    │    │   Decoder    │    │   (JSON record)           │  │
//! │  └──────────────┘    └──────────────┘    └───────────────────────────┘  │
//! │         │                   │                                            │
//! │         │            ┌──────┴───────┐                                    │
//! │         │            │   Erasure    │                                    │
//! │         │            │  Classifier  │                                    │
//! │         │            └──────┬───────┘                                    │
//! │         └──────────┬────────┘                                            │
//! │         ┌──────────┴─────────┐    ┌──────────────┐                       │
//! │         │ Parallel Dot-Prod  │    │   Stripe     │                       │
//! │         │      Engine        │    │   Planner    │                       │
//! │         └──────────┬─────────┘    └──────────────┘                       │
//! │         ┌──────────┴─────────┐                                           │
//! │         │ GF(2^w) + Matrices │                                           │
//! │         └────────────────────┘                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - **Field kernel** (`gf.rs`, `matrix.rs`): GF(2^8/16/32) arithmetic,
//!   region operations, the Vandermonde coding matrix and decoding matrices.
//!
//! - **Stripe Planner** (`planner.rs`): padding, stripe and shard sizes,
//!   stripe count and buffer-size alignment.
//!
//! - **Dot-Product Engine** (`dotprod.rs`): one scoped worker per
//!   destination shard, joined per phase.
//!
//! - **Erasure Classifier** (`erasure.rs`): decode strategy selection and
//!   recovery coefficient rows, including the single-erasure shortcut.
//!
//! - **Encoder/Decoder** (`encoder.rs`, `decoder.rs`): per-stripe pipelines
//!   over a [`ShardBackend`](crate::domain::ports::ShardBackend).
//!
//! # Usage
//!
//! ```rust,ignore
//! use stripecode::adapters::InMemoryBackend;
//! use stripecode::ec::{Codec, CodecConfig, StripeDecoder, StripeEncoder, WordSize};
//!
//! let codec = Arc::new(Codec::new(CodecConfig::new(4, 2, WordSize::W8))?);
//! let backend = InMemoryBackend::new();
//!
//! StripeEncoder::new(codec)
//!     .encode_bytes(b"Hello, World!", "hello.txt", Some(&backend))
//!     .await?;
//!
//! backend.remove_shard(0);
//! backend.remove_shard(3);
//!
//! StripeDecoder::default().decode(&backend).await?;
//! assert_eq!(&backend.decoded().unwrap()[..], b"Hello, World!");
//! ```

pub mod config;
pub mod decoder;
pub mod dotprod;
pub mod encoder;
pub mod erasure;
pub mod gf;
pub mod matrix;
pub mod metadata;
pub mod planner;
pub mod report;
pub mod shard;

#[cfg(test)]
mod proptest;

pub use config::{Codec, CodecConfig};
pub use decoder::{DecodeOptions, StripeDecoder};
pub use dotprod::Phase;
pub use encoder::{RandomInput, StripeEncoder};
pub use erasure::{DecodeStrategy, ErasureRecord, RecoveryPlan};
pub use gf::{Galois, WordSize};
pub use matrix::Matrix;
pub use metadata::{CodingTechnique, RunMetadata};
pub use planner::StripePlan;
pub use report::{DecodeReport, EncodeReport};
