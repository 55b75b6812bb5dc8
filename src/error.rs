//! Error types for stripecode

use thiserror::Error;

use crate::ec::dotprod::Phase;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding or decoding striped objects
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata (de)serialization error
    #[error("Metadata serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid codec configuration (k, m, w, packet or buffer size)
    #[error("Invalid codec configuration: {0}")]
    InvalidConfig(String),

    /// Metadata record is present but unusable
    #[error("Malformed metadata: {0}")]
    MalformedMetadata(String),

    /// No metadata record exists for the object
    #[error("Metadata not found: {0}")]
    MetadataNotFound(String),

    // =========================================================================
    // Erasure / Matrix Errors
    // =========================================================================
    /// More shards are missing than the parity count can cover
    #[error("Insufficient shards for reconstruction: {erased} erased, at most {tolerated} tolerated")]
    InsufficientShards { erased: usize, tolerated: usize },

    /// The coding matrix could not be generated
    #[error("Cannot construct coding matrix: {0}")]
    CodingMatrix(String),

    /// The decoding matrix could not be generated for this erasure pattern
    #[error("Cannot construct decoding matrix for erased shards {erased:?}: {reason}")]
    DecodingMatrix { erased: Vec<usize>, reason: String },

    // =========================================================================
    // Worker Lifecycle Errors
    // =========================================================================
    /// A worker thread could not be created
    #[error("Failed to spawn {phase} worker for shard {shard} in stripe {stripe}: {source}")]
    WorkerSpawn {
        phase: Phase,
        shard: usize,
        stripe: u64,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread could not be joined (it panicked)
    #[error("Failed to join {phase} workers in stripe {stripe} (shards {shards:?})")]
    WorkerJoin {
        phase: Phase,
        stripe: u64,
        shards: Vec<usize>,
    },

    // =========================================================================
    // Shard I/O Errors
    // =========================================================================
    /// A shard that was classified as present could not be read
    #[error("Failed to read shard {shard} in stripe {stripe}: {reason}")]
    ShardRead {
        shard: usize,
        stripe: u64,
        reason: String,
    },
}
