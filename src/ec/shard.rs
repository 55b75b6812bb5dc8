//! Shard Store
//!
//! Owns the shard buffers of a run across stripes and hands out disjoint
//! views: shared sources plus exclusive destinations for one worker group.

use super::dotprod::SourceSet;

// =============================================================================
// Shard Set (decode)
// =============================================================================

/// k data + m parity buffers of one fixed size, reused for every stripe.
///
/// Buffers are allocated on first use, so erased shards only get memory
/// once the decoder asks for a destination.
#[derive(Debug)]
pub struct ShardSet {
    shard_size: usize,
    buffers: Vec<Option<Vec<u8>>>,
}

impl ShardSet {
    pub fn new(total_shards: usize, shard_size: usize) -> Self {
        Self {
            shard_size,
            buffers: vec![None; total_shards],
        }
    }

    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    pub fn total_shards(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_allocated(&self, shard: usize) -> bool {
        self.buffers[shard].is_some()
    }

    /// Buffer of `shard`, allocating a zeroed one on first access.
    pub fn buffer_mut(&mut self, shard: usize) -> &mut [u8] {
        let size = self.shard_size;
        self.buffers[shard].get_or_insert_with(|| vec![0u8; size])
    }

    pub fn get(&self, shard: usize) -> Option<&[u8]> {
        self.buffers.get(shard).and_then(|b| b.as_deref())
    }

    /// Split into exclusive buffers for `targets` (in ascending shard order,
    /// allocated if needed) and a source view of every other shard.
    pub fn split(&mut self, targets: &[usize]) -> (SourceSet<'_>, Vec<(usize, &mut [u8])>) {
        let size = self.shard_size;
        let mut sources = Vec::with_capacity(self.buffers.len());
        let mut dests = Vec::with_capacity(targets.len());

        for (id, slot) in self.buffers.iter_mut().enumerate() {
            if targets.contains(&id) {
                dests.push((id, slot.get_or_insert_with(|| vec![0u8; size]).as_mut_slice()));
                sources.push(None);
            } else {
                let slot: &Option<Vec<u8>> = slot;
                sources.push(slot.as_deref());
            }
        }

        (SourceSet::new(sources), dests)
    }
}

// =============================================================================
// Stripe Buffer (encode)
// =============================================================================

/// One stripe of input plus its parity buffers.
///
/// Data shard j is the slice `[j * shard_size, (j + 1) * shard_size)` of the
/// stripe block; data is never copied into separate shard buffers.
#[derive(Debug)]
pub struct StripeBuffer {
    data_shards: usize,
    shard_size: usize,
    block: Vec<u8>,
    parity: Vec<Vec<u8>>,
}

impl StripeBuffer {
    pub fn new(data_shards: usize, parity_shards: usize, shard_size: usize) -> Self {
        Self {
            data_shards,
            shard_size,
            block: vec![0u8; data_shards * shard_size],
            parity: vec![vec![0u8; shard_size]; parity_shards],
        }
    }

    /// The whole stripe block, for filling from input.
    pub fn block_mut(&mut self) -> &mut [u8] {
        &mut self.block
    }

    /// Zero everything after the first `filled` bytes of the block.
    pub fn pad_from(&mut self, filled: usize) {
        if filled < self.block.len() {
            self.block[filled..].fill(0);
        }
    }

    /// Contents of shard `shard` (data or parity).
    pub fn shard(&self, shard: usize) -> &[u8] {
        if shard < self.data_shards {
            &self.block[shard * self.shard_size..(shard + 1) * self.shard_size]
        } else {
            &self.parity[shard - self.data_shards]
        }
    }

    /// Data shards as sources and parity buffers as destinations.
    pub fn split(&mut self) -> (SourceSet<'_>, Vec<(usize, &mut [u8])>) {
        let k = self.data_shards;
        let size = self.shard_size;
        let block = &self.block;

        let mut sources: Vec<Option<&[u8]>> = (0..k)
            .map(|j| Some(&block[j * size..(j + 1) * size]))
            .collect();
        sources.extend(std::iter::repeat(None).take(self.parity.len()));

        let dests = self
            .parity
            .iter_mut()
            .enumerate()
            .map(|(i, p)| (k + i, p.as_mut_slice()))
            .collect();

        (SourceSet::new(sources), dests)
    }
}
