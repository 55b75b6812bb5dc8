//! Property-Based Tests for Erasure Coding
//!
//! Uses proptest to verify encoder/decoder correctness across word sizes,
//! shard counts, buffer sizes and erasure patterns.
//!
//! # Test Properties
//!
//! 1. **Roundtrip Correctness**: decode(encode(data) minus ≤ m shards) = data
//! 2. **Irrecoverable Loss**: more than m erased shards fails with no output
//! 3. **Path Equivalence**: the single-erasure shortcut and the decoding
//!    matrix rebuild the same bytes
//! 4. **Order Independence**: dot-product terms commute
//! 5. **Minimal Padding**: the padded size is the smallest aligned size

use std::sync::Arc;

use proptest::prelude::*;

use super::config::{Codec, CodecConfig};
use super::decoder::{DecodeOptions, StripeDecoder};
use super::dotprod::{accumulate, SourceSet};
use super::encoder::StripeEncoder;
use super::erasure::{DecodeStrategy, ErasureRecord, RecoveryPlan};
use super::gf::{Galois, WordSize};
use super::planner::{alignment_unit, plan};
use crate::adapters::InMemoryBackend;
use crate::error::Error;

// =============================================================================
// Property Strategies
// =============================================================================

fn word_size_strategy() -> impl Strategy<Value = WordSize> {
    prop_oneof![Just(WordSize::W8), Just(WordSize::W16), Just(WordSize::W32)]
}

/// Small k+m configurations: k 1-6, m 0-3.
fn config_strategy() -> impl Strategy<Value = (usize, usize, WordSize)> {
    (1usize..=6, 0usize..=3, word_size_strategy())
}

fn data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..6000)
}

/// Configuration plus an erasure pattern of at most m shards.
fn erasure_case_strategy() -> impl Strategy<Value = (usize, usize, WordSize, Vec<usize>)> {
    config_strategy().prop_flat_map(|(k, m, w)| {
        let ids: Vec<usize> = (0..k + m).collect();
        (
            Just(k),
            Just(m),
            Just(w),
            prop::sample::subsequence(ids, 0..=m),
        )
    })
}

fn encode_to_memory(config: CodecConfig, data: &[u8]) -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    let codec = Codec::new(config).expect("valid config");
    tokio_test::block_on(
        StripeEncoder::new(Arc::new(codec)).encode_bytes(data, "prop.bin", Some(&backend)),
    )
    .expect("encode");
    backend
}

fn random_shards(k: usize, len: usize, seed: u8) -> Vec<Vec<u8>> {
    (0..k)
        .map(|j| {
            (0..len)
                .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed ^ j as u8))
                .collect()
        })
        .collect()
}

// =============================================================================
// Roundtrip Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Any pattern of at most m erasures decodes to the original bytes.
    #[test]
    fn prop_roundtrip_with_erasures(
        (k, m, w, erased) in erasure_case_strategy(),
        data in data_strategy(),
        buffer_units in 0usize..4,
        fast_path in any::<bool>(),
    ) {
        let unit = alignment_unit(k, w, 0).expect("unit");
        let config = CodecConfig::new(k, m, w).with_buffer_size(unit * buffer_units);
        let backend = encode_to_memory(config, &data);
        for shard in &erased {
            backend.remove_shard(*shard);
        }

        let decoder = StripeDecoder::new(DecodeOptions { fast_path });
        let report = tokio_test::block_on(decoder.decode(&backend)).expect("decode");

        prop_assert_eq!(&report.erased, &erased);
        let decoded = backend.decoded().expect("committed output");
        prop_assert_eq!(&decoded[..], &data[..]);
    }

    /// m + 1 erasures always fail and never leave output behind.
    #[test]
    fn prop_too_many_erasures_fail(
        (k, m, w) in config_strategy(),
        data in prop::collection::vec(any::<u8>(), 1..2000),
        seed in any::<u64>(),
    ) {
        let backend = encode_to_memory(CodecConfig::new(k, m, w), &data);
        let total = k + m;
        let mut ids: Vec<usize> = (0..total).collect();
        ids.rotate_left((seed % total as u64) as usize);
        for shard in ids.iter().take(m + 1) {
            backend.remove_shard(*shard);
        }

        let result = tokio_test::block_on(StripeDecoder::default().decode(&backend));
        let is_insufficient = matches!(result, Err(Error::InsufficientShards { .. }));
        prop_assert!(is_insufficient);
        prop_assert!(backend.decoded().is_none());
        prop_assert!(!backend.has_pending_output());
    }
}

// =============================================================================
// Decoding Path Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The reference-parity row and the decoding-matrix row rebuild the
    /// same data shard.
    #[test]
    fn prop_reference_parity_matches_matrix(
        k in 1usize..=8,
        m in 1usize..=3,
        w in word_size_strategy(),
        lost_seed in any::<usize>(),
        seed in any::<u8>(),
    ) {
        let codec = Codec::new(CodecConfig::new(k, m, w)).expect("valid config");
        let gf = codec.galois();
        let len = w.bytes() * 8;
        let lost = lost_seed % k;

        // data shards followed by the first parity shard
        let mut shards = random_shards(k, len, seed);
        let mut parity = vec![0u8; len];
        {
            let terms: Vec<(u32, &[u8])> = codec
                .coding_matrix()
                .row(0)
                .iter()
                .zip(&shards)
                .map(|(c, s)| (*c, s.as_slice()))
                .collect();
            accumulate(gf, &terms, &mut parity);
        }
        let expected = shards[lost].clone();
        shards.push(parity);
        shards.extend((1..m).map(|_| vec![0u8; len]));

        let mut flags = vec![false; k + m];
        flags[lost] = true;
        let fast = RecoveryPlan::build(
            &codec,
            ErasureRecord::classify(k, m, flags.clone(), true).expect("classify"),
        ).expect("plan");
        let slow = RecoveryPlan::build(
            &codec,
            ErasureRecord::classify(k, m, flags, false).expect("classify"),
        ).expect("plan");
        prop_assert_eq!(slow.record.strategy, DecodeStrategy::DecodingMatrix);

        for recovery in [&fast, &slow] {
            let sources: Vec<Option<&[u8]>> = shards
                .iter()
                .enumerate()
                .map(|(i, s)| if i == lost { None } else { Some(s.as_slice()) })
                .collect();
            let sources = SourceSet::new(sources);
            let mut rebuilt = vec![0u8; len];
            recovery.data_rows[0].job(&mut rebuilt).execute(gf, &sources).expect("execute");
            prop_assert_eq!(&rebuilt, &expected);
        }
    }

    /// Dot-product terms commute.
    #[test]
    fn prop_dot_product_order_independent(
        w in word_size_strategy(),
        coefficients in prop::collection::vec(any::<u32>(), 1..6),
        seed in any::<u8>(),
        rotation in any::<usize>(),
    ) {
        let gf = Galois::new(w);
        let mask = if w == WordSize::W32 { u32::MAX } else { (1u32 << w.bits()) - 1 };
        let len = w.bytes() * 16;
        let shards = random_shards(coefficients.len(), len, seed);

        let mut terms: Vec<(u32, &[u8])> = coefficients
            .iter()
            .zip(&shards)
            .map(|(c, s)| (c & mask, s.as_slice()))
            .collect();

        let mut forward = vec![0xffu8; len];
        accumulate(&gf, &terms, &mut forward);

        let shift = rotation % terms.len();
        terms.rotate_left(shift);
        terms.reverse();
        let mut shuffled = vec![0x11u8; len];
        accumulate(&gf, &terms, &mut shuffled);

        prop_assert_eq!(forward, shuffled);
    }
}

// =============================================================================
// Planner Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Padding is the smallest size aligned to the unit (and to the buffer
    /// size when striping), and stripes tile it exactly.
    #[test]
    fn prop_padding_is_minimal(
        size in 0u64..1_000_000,
        k in 1usize..=12,
        w in word_size_strategy(),
        packet in 0usize..4,
        buffer_units in 0usize..6,
    ) {
        let unit = alignment_unit(k, w, packet).expect("unit");
        let buffer = unit * buffer_units;
        let p = plan(size, k, w, packet, buffer);

        let step = if buffer > 0 { buffer as u64 } else { unit as u64 };
        prop_assert!(p.padded_size >= size);
        prop_assert_eq!(p.padded_size % unit as u64, 0);
        prop_assert_eq!(p.padded_size % step, 0);
        prop_assert!(p.padded_size - size < step);

        prop_assert_eq!(p.readins * p.stripe_size as u64, p.padded_size);
        prop_assert_eq!(p.shard_size * k, p.stripe_size);

        let payload: u64 = (0..p.readins).map(|n| p.payload_in_stripe(n) as u64).sum();
        prop_assert_eq!(payload, size);
    }
}
