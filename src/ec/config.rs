//! Codec Configuration
//!
//! User-facing parameters and the per-run codec built from them.

use tracing::debug;

use super::gf::{Galois, WordSize};
use super::matrix::{build_coding_matrix, Matrix};
use super::planner::{align_buffer_size, alignment_unit, plan, StripePlan};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Parameters of a striped Reed-Solomon code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Number of data shards (k)
    pub data_shards: usize,

    /// Number of parity shards (m)
    pub parity_shards: usize,

    /// Field word width (w)
    pub word_size: WordSize,

    /// Packet size constraint; 0 for none
    pub packet_size: usize,

    /// Target stripe buffer size in bytes; 0 for a single stripe
    pub buffer_size: usize,
}

impl CodecConfig {
    /// Create a configuration without packet or buffer constraints.
    pub fn new(data_shards: usize, parity_shards: usize, word_size: WordSize) -> Self {
        Self {
            data_shards,
            parity_shards,
            word_size,
            packet_size: 0,
            buffer_size: 0,
        }
    }

    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Total number of shards (k + m)
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Validate the configuration and snap the buffer size to the
    /// alignment unit.
    pub fn validate(mut self) -> Result<Self> {
        if self.data_shards == 0 {
            return Err(Error::InvalidConfig(
                "data_shards must be greater than 0".to_string(),
            ));
        }
        if self.total_shards() as u64 > self.word_size.max_shards() {
            return Err(Error::InvalidConfig(format!(
                "k + m = {} exceeds the {} shards representable with w = {}",
                self.total_shards(),
                self.word_size.max_shards(),
                self.word_size
            )));
        }

        if alignment_unit(self.data_shards, self.word_size, self.packet_size).is_none() {
            return Err(Error::InvalidConfig(format!(
                "packet size {} makes the alignment unit overflow",
                self.packet_size
            )));
        }
        let aligned = align_buffer_size(
            self.buffer_size,
            self.data_shards,
            self.word_size,
            self.packet_size,
        )
        .ok_or_else(|| {
            Error::InvalidConfig(format!(
                "buffer size {} cannot be aligned to the stripe unit",
                self.buffer_size
            ))
        })?;
        if aligned != self.buffer_size {
            debug!(
                "Adjusted buffer size from {} to {} bytes",
                self.buffer_size, aligned
            );
            self.buffer_size = aligned;
        }

        Ok(self)
    }

    /// Stripe layout for an object of `original_size` bytes.
    pub fn plan(&self, original_size: u64) -> StripePlan {
        plan(
            original_size,
            self.data_shards,
            self.word_size,
            self.packet_size,
            self.buffer_size,
        )
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::new(4, 2, WordSize::W8)
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Field arithmetic plus the coding matrix, built once per run and shared
/// by every stripe of an encode or decode.
#[derive(Debug, Clone)]
pub struct Codec {
    config: CodecConfig,
    gf: Galois,
    coding: Matrix,
}

impl Codec {
    /// Validate `config` and build the coding matrix.
    pub fn new(config: CodecConfig) -> Result<Self> {
        let config = config.validate()?;
        let gf = Galois::new(config.word_size);
        let coding = build_coding_matrix(&gf, config.data_shards, config.parity_shards)?;

        debug!(
            "Built {}x{} coding matrix over GF(2^{})",
            coding.rows(),
            coding.cols(),
            config.word_size
        );

        Ok(Self { config, gf, coding })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn galois(&self) -> &Galois {
        &self.gf
    }

    pub fn coding_matrix(&self) -> &Matrix {
        &self.coding
    }

    pub fn data_shards(&self) -> usize {
        self.config.data_shards
    }

    pub fn parity_shards(&self) -> usize {
        self.config.parity_shards
    }

    pub fn total_shards(&self) -> usize {
        self.config.total_shards()
    }
}
