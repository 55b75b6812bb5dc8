//! Run Metadata
//!
//! The record persisted next to the shards of an encoded object. It holds
//! exactly what decode needs to rebuild the codec and stripe plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::CodecConfig;
use super::gf::WordSize;
use super::planner::StripePlan;
use crate::error::{Error, Result};

/// Coding technique identifier. Only the Vandermonde construction exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CodingTechnique {
    #[default]
    ReedSolVan,
}

/// Metadata for one encoded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Name of the encoded input
    pub source_name: String,

    /// Size of the input before padding
    pub original_size: u64,

    /// Number of data shards (k)
    pub data_shards: usize,

    /// Number of parity shards (m)
    pub parity_shards: usize,

    /// Field word width (w)
    pub word_size: WordSize,

    /// Packet size; 0 for none
    pub packet_size: usize,

    /// Aligned stripe buffer size; 0 for a single stripe
    pub buffer_size: usize,

    /// Coding technique
    pub technique: CodingTechnique,

    /// Number of stripes written
    pub readins: u64,

    /// When the object was encoded
    pub encoded_at: DateTime<Utc>,
}

impl RunMetadata {
    /// Record the parameters of a finished encode.
    pub fn new(source_name: impl Into<String>, config: &CodecConfig, plan: &StripePlan) -> Self {
        Self {
            source_name: source_name.into(),
            original_size: plan.original_size,
            data_shards: config.data_shards,
            parity_shards: config.parity_shards,
            word_size: config.word_size,
            packet_size: config.packet_size,
            buffer_size: config.buffer_size,
            technique: CodingTechnique::ReedSolVan,
            readins: plan.readins,
            encoded_at: Utc::now(),
        }
    }

    /// Codec parameters described by this record.
    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig::new(self.data_shards, self.parity_shards, self.word_size)
            .with_packet_size(self.packet_size)
            .with_buffer_size(self.buffer_size)
    }

    /// Validate the record and recompute the stripe plan from it.
    ///
    /// The buffer size must already be aligned and the recomputed stripe
    /// count must match the stored one.
    pub fn validate(&self) -> Result<(CodecConfig, StripePlan)> {
        let stored = self.codec_config();
        let config = stored
            .validate()
            .map_err(|e| Error::MalformedMetadata(e.to_string()))?;

        if config.buffer_size != stored.buffer_size {
            return Err(Error::MalformedMetadata(format!(
                "buffer size {} is not aligned (expected {})",
                stored.buffer_size, config.buffer_size
            )));
        }

        let plan = config.plan(self.original_size);
        if plan.readins != self.readins {
            return Err(Error::MalformedMetadata(format!(
                "stripe count {} does not match the {} stripes implied by size {}",
                self.readins, plan.readins, self.original_size
            )));
        }

        Ok((config, plan))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedMetadata(e.to_string()))
    }
}
