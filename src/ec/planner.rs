//! Stripe Planner
//!
//! Derives padded size, per-stripe buffer size, shard size and stripe count
//! ("readins") from the object size and codec parameters. The planner trusts
//! its inputs; validation happens in [`CodecConfig::validate`].
//!
//! [`CodecConfig::validate`]: super::config::CodecConfig::validate

use super::gf::WordSize;

/// Bytes per machine word in the alignment unit.
const LONG_BYTES: usize = 8;

/// Layout of an object across stripes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripePlan {
    /// Size of the input before padding
    pub original_size: u64,

    /// Size after padding to the alignment unit and buffer size
    pub padded_size: u64,

    /// Bytes of (padded) input consumed per stripe
    pub stripe_size: usize,

    /// Bytes per shard per stripe
    pub shard_size: usize,

    /// Number of stripes
    pub readins: u64,
}

impl StripePlan {
    /// Length of every shard blob once all stripes are written.
    pub fn shard_blob_len(&self) -> u64 {
        self.readins * self.shard_size as u64
    }

    /// Byte offset of stripe `n` within each shard blob.
    pub fn shard_offset(&self, stripe: u64) -> u64 {
        stripe * self.shard_size as u64
    }

    /// Bytes of original (unpadded) input that fall into stripe `n`.
    pub fn payload_in_stripe(&self, stripe: u64) -> usize {
        let start = stripe * self.stripe_size as u64;
        let remaining = self.original_size.saturating_sub(start);
        remaining.min(self.stripe_size as u64) as usize
    }
}

/// The size every stripe buffer and the padded object are multiples of:
/// `k * w * 8 * max(packet_size, 1)`. `None` when the product overflows.
pub fn alignment_unit(
    data_shards: usize,
    word_size: WordSize,
    packet_size: usize,
) -> Option<usize> {
    data_shards
        .checked_mul(word_size.bits() as usize)?
        .checked_mul(LONG_BYTES)?
        .checked_mul(packet_size.max(1))
}

/// Snap a requested buffer size to the nearest multiple of the alignment
/// unit. Ties resolve upward; a non-zero request never snaps to zero.
///
/// Returns `None` when the unit or the snapped size does not fit in a
/// `usize`.
pub fn align_buffer_size(
    requested: usize,
    data_shards: usize,
    word_size: WordSize,
    packet_size: usize,
) -> Option<usize> {
    let unit = alignment_unit(data_shards, word_size, packet_size)?;
    if requested == 0 || unit == 0 {
        return Some(requested);
    }
    let below = requested - requested % unit;
    if below == requested {
        return Some(requested);
    }
    let above = below.checked_add(unit);

    match above {
        Some(above) if below == 0 || above - requested <= requested - below => Some(above),
        // rounding up overflows, so only a non-zero multiple below is usable
        None if below > 0 => Some(below),
        None => None,
        Some(_) => Some(below),
    }
}

/// Compute the stripe layout.
///
/// `buffer_size` must already be aligned (see [`align_buffer_size`]); zero
/// means "one stripe for the whole object".
pub fn plan(
    original_size: u64,
    data_shards: usize,
    word_size: WordSize,
    packet_size: usize,
    buffer_size: usize,
) -> StripePlan {
    // validated configurations never overflow the unit
    let unit = alignment_unit(data_shards, word_size, packet_size)
        .map_or(u64::MAX, |unit| unit as u64);
    let mut padded_size = original_size.div_ceil(unit) * unit;
    if buffer_size > 0 {
        padded_size = padded_size.div_ceil(buffer_size as u64) * buffer_size as u64;
    }

    let (stripe_size, readins) = if buffer_size > 0 && original_size > buffer_size as u64 {
        (buffer_size, padded_size / buffer_size as u64)
    } else {
        (padded_size as usize, 1)
    };

    StripePlan {
        original_size,
        padded_size,
        stripe_size,
        shard_size: stripe_size / data_shards,
        readins,
    }
}

// =============================================================================
// Tests
// =============================================================================
