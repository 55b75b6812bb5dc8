//! Stripe Encoder
//!
//! Drives `{read stripe → compute parity → write shards}` once per stripe.
//! Parity for each stripe is computed by m concurrent dot-product workers,
//! one per parity shard, joined before the stripe is written.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tracing::{debug, info, instrument};

use super::config::Codec;
use super::dotprod::{run_group, DotProduct, Phase};
use super::metadata::RunMetadata;
use super::report::EncodeReport;
use super::shard::StripeBuffer;
use crate::domain::ports::ShardBackend;
use crate::error::Result;
use crate::metrics::{CodecMetrics, Operation};

// =============================================================================
// Stripe Encoder
// =============================================================================

/// Encodes a byte stream into k data and m parity shards.
#[derive(Debug, Clone)]
pub struct StripeEncoder {
    codec: Arc<Codec>,
    metrics: Option<Arc<CodecMetrics>>,
}

impl StripeEncoder {
    pub fn new(codec: Arc<Codec>) -> Self {
        Self {
            codec,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<CodecMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Encode `original_size` bytes from `input`.
    ///
    /// # Arguments
    /// * `input` - Source of exactly `original_size` bytes
    /// * `original_size` - Size of the object before padding
    /// * `source_name` - Name recorded in the metadata
    /// * `backend` - Shard storage; `None` computes parity and discards it
    ///
    /// Shards are written stripe by stripe (the first stripe truncates, later
    /// stripes append) and the metadata record is stored after the last one.
    #[instrument(skip(self, input, backend), fields(k = self.codec.data_shards(), m = self.codec.parity_shards()))]
    pub async fn encode<R>(
        &self,
        input: &mut R,
        original_size: u64,
        source_name: &str,
        backend: Option<&dyn ShardBackend>,
    ) -> Result<EncodeReport>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();
        let config = *self.codec.config();
        let plan = config.plan(original_size);
        let k = self.codec.data_shards();
        let total = self.codec.total_shards();

        debug!(
            "Stripe plan: padded={} stripe={} shard={} readins={}",
            plan.padded_size, plan.stripe_size, plan.shard_size, plan.readins
        );

        let mut stripe = StripeBuffer::new(k, self.codec.parity_shards(), plan.shard_size);
        let mut coding_time = Duration::ZERO;

        for n in 0..plan.readins {
            let payload = plan.payload_in_stripe(n);
            input.read_exact(&mut stripe.block_mut()[..payload]).await?;
            stripe.pad_from(payload);

            coding_time += self.compute_parity(&mut stripe, n)?;

            if let Some(backend) = backend {
                for shard in 0..total {
                    backend.write_shard(shard, stripe.shard(shard), n > 0).await?;
                }
            }

            if let Some(metrics) = &self.metrics {
                metrics.record_stripe(Operation::Encode, payload);
            }
        }

        if let Some(backend) = backend {
            let metadata = RunMetadata::new(source_name, &config, &plan);
            backend.store_metadata(&metadata).await?;
        }

        let report = EncodeReport {
            source_name: source_name.to_string(),
            plan,
            data_shards: k,
            parity_shards: self.codec.parity_shards(),
            persisted: backend.is_some(),
            coding_time,
            total_time: started.elapsed(),
        };

        info!(
            "Encoded {} bytes in {} stripe(s) ({:.2} MiB/s coding)",
            original_size,
            plan.readins,
            report.coding_throughput()
        );

        Ok(report)
    }

    /// Encode an in-memory buffer.
    pub async fn encode_bytes(
        &self,
        data: &[u8],
        source_name: &str,
        backend: Option<&dyn ShardBackend>,
    ) -> Result<EncodeReport> {
        let mut input = data;
        self.encode(&mut input, data.len() as u64, source_name, backend)
            .await
    }

    /// Run the m parity workers of one stripe.
    fn compute_parity(&self, stripe: &mut StripeBuffer, n: u64) -> Result<Duration> {
        let k = self.codec.data_shards();
        let coding = self.codec.coding_matrix();
        let (sources, dests) = stripe.split();
        let workers = dests.len();

        let jobs = dests
            .into_iter()
            .map(|(target, dest)| DotProduct {
                target,
                row: coding.row(target - k),
                src_ids: None,
                dest,
            })
            .collect();

        let started = Instant::now();
        run_group(self.codec.galois(), Phase::Encode, n, &sources, jobs)?;
        let elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_phase(Phase::Encode, workers, elapsed);
        }
        Ok(elapsed)
    }
}

// =============================================================================
// Random Input
// =============================================================================

/// Reader producing an endless pseudo-random byte stream.
///
/// Seeded runs are reproducible, which lets a test regenerate the exact
/// input of a random-mode encode.
#[derive(Debug)]
pub struct RandomInput {
    rng: StdRng,
}

impl RandomInput {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// The first `len` bytes this reader would produce.
    pub fn generate(seed: u64, len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        StdRng::seed_from_u64(seed).fill_bytes(&mut data);
        data
    }
}

impl AsyncRead for RandomInput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let unfilled = buf.initialize_unfilled();
        let len = unfilled.len();
        self.rng.fill_bytes(unfilled);
        buf.advance(len);
        Poll::Ready(Ok(()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::ec::config::CodecConfig;
    use crate::ec::gf::WordSize;

    fn encoder(k: usize, m: usize, w: WordSize, buffer: usize) -> StripeEncoder {
        let config = CodecConfig::new(k, m, w).with_buffer_size(buffer);
        StripeEncoder::new(Arc::new(Codec::new(config).unwrap()))
    }

    #[tokio::test]
    async fn test_encode_writes_all_shards_and_metadata() {
        let enc = encoder(4, 2, WordSize::W8, 0);
        let backend = InMemoryBackend::new();
        let data = RandomInput::generate(7, 1000);

        let report = enc.encode_bytes(&data, "input.bin", Some(&backend)).await.unwrap();
        assert!(report.persisted);
        assert_eq!(report.plan.readins, 1);
        assert_eq!(report.plan.padded_size, 1024);

        for shard in 0..6 {
            assert_eq!(backend.shard_len(shard).await.unwrap(), Some(256));
        }
        // systematic: data shards are the padded input
        assert_eq!(&backend.shard(0).unwrap()[..], &data[..256]);
        let last = backend.shard(3).unwrap();
        assert_eq!(&last[..232], &data[768..]);
        assert!(last[232..].iter().all(|b| *b == 0));

        let meta = backend.load_metadata().await.unwrap();
        assert_eq!(meta.original_size, 1000);
        assert_eq!(meta.source_name, "input.bin");
    }

    #[tokio::test]
    async fn test_first_parity_is_xor_of_data() {
        let enc = encoder(3, 2, WordSize::W16, 0);
        let backend = InMemoryBackend::new();
        let data = RandomInput::generate(3, 700);
        enc.encode_bytes(&data, "x", Some(&backend)).await.unwrap();

        let shards: Vec<_> = (0..4).map(|i| backend.shard(i).unwrap()).collect();
        for i in 0..shards[0].len() {
            assert_eq!(shards[3][i], shards[0][i] ^ shards[1][i] ^ shards[2][i]);
        }
    }

    #[tokio::test]
    async fn test_multi_stripe_appends() {
        let enc = encoder(2, 1, WordSize::W8, 128);
        let backend = InMemoryBackend::new();
        let data = RandomInput::generate(11, 300);

        let report = enc.encode_bytes(&data, "x", Some(&backend)).await.unwrap();
        assert_eq!(report.plan.readins, 3);
        assert_eq!(report.plan.shard_size, 64);
        assert_eq!(backend.shard_len(0).await.unwrap(), Some(192));
        assert_eq!(backend.shard_len(2).await.unwrap(), Some(192));
        assert_eq!(&backend.shard(1).unwrap()[..64], &data[64..128]);
        assert_eq!(&backend.shard(0).unwrap()[64..128], &data[128..192]);
    }

    #[tokio::test]
    async fn test_encode_without_backend() {
        let enc = encoder(4, 2, WordSize::W32, 0);
        let mut input = RandomInput::new(Some(1));
        let report = enc.encode(&mut input, 5000, "random", None).await.unwrap();
        assert!(!report.persisted);
        assert_eq!(report.plan.original_size, 5000);
    }

    #[tokio::test]
    async fn test_short_input_fails() {
        let enc = encoder(2, 1, WordSize::W8, 0);
        let data = vec![1u8; 10];
        let mut input = data.as_slice();
        assert!(enc.encode(&mut input, 20, "short", None).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let enc = encoder(2, 1, WordSize::W8, 0);
        let backend = InMemoryBackend::new();
        let report = enc.encode_bytes(&[], "empty", Some(&backend)).await.unwrap();
        assert_eq!(report.plan.readins, 1);
        assert_eq!(backend.shard_len(2).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_random_input_is_reproducible() {
        let mut input = RandomInput::new(Some(42));
        let mut buf = vec![0u8; 64];
        input.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, RandomInput::generate(42, 64));
    }
}
