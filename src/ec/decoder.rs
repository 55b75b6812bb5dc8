//! Stripe Decoder
//!
//! Restores the original object from any k of its k + m shards.
//!
//! The erasure pattern is classified once per run, after the first stripe
//! has been read: a shard that cannot be read there counts as erased. Each
//! stripe then goes through read → data recovery → parity recovery → write. Data recovery
//! always finishes before parity recovery starts because rebuilt parity is
//! computed from the (possibly just rebuilt) data shards.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use super::config::Codec;
use super::dotprod::{run_group, Phase};
use super::erasure::{ErasureRecord, RecoveryPlan, RecoveryRow};
use super::planner::StripePlan;
use super::report::DecodeReport;
use super::shard::ShardSet;
use crate::domain::ports::ShardBackend;
use crate::error::{Error, Result};
use crate::metrics::{CodecMetrics, Operation};

/// Decode behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Rebuild a single lost data shard from the first parity shard without
    /// inverting a matrix
    pub fast_path: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { fast_path: true }
    }
}

/// Decodes objects stored behind a [`ShardBackend`].
#[derive(Debug, Clone, Default)]
pub struct StripeDecoder {
    options: DecodeOptions,
    metrics: Option<Arc<CodecMetrics>>,
}

impl StripeDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<CodecMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// Decode the object held by `backend` into its staged output.
    ///
    /// On success the output is committed and is exactly `original_size`
    /// bytes long. On any failure the staged output is discarded.
    #[instrument(skip(self, backend))]
    pub async fn decode(&self, backend: &dyn ShardBackend) -> Result<DecodeReport> {
        let result = self.decode_staged(backend).await;
        match result {
            Ok(report) => {
                backend.commit_decoded().await?;
                info!(
                    "Decoded {} bytes in {} stripe(s) ({:.2} MiB/s coding)",
                    report.plan.original_size,
                    report.plan.readins,
                    report.coding_throughput()
                );
                Ok(report)
            }
            Err(e) => {
                warn!("Decode failed, discarding partial output: {}", e);
                if let Err(discard) = backend.discard_decoded().await {
                    warn!("Failed to discard partial output: {}", discard);
                }
                Err(e)
            }
        }
    }

    async fn decode_staged(&self, backend: &dyn ShardBackend) -> Result<DecodeReport> {
        let started = Instant::now();

        let metadata = backend.load_metadata().await?;
        let (config, plan) = metadata.validate()?;
        let codec = Codec::new(config)?;
        let k = codec.data_shards();
        let total = codec.total_shards();

        let mut erased = survey_shards(backend, total, &plan).await?;
        let mut shards = ShardSet::new(total, plan.shard_size);
        read_first_stripe(backend, &mut shards, &mut erased).await;

        let record =
            ErasureRecord::classify(k, codec.parity_shards(), erased, self.options.fast_path)?;
        let recovery = RecoveryPlan::build(&codec, record)?;
        let erased_ids = recovery.record.erased_ids();

        debug!(
            "Erased shards {:?}: strategy={:?} lastdrive={}",
            erased_ids, recovery.record.strategy, recovery.record.lastdrive
        );

        let mut coding_time = Duration::ZERO;
        backend.write_decoded(&[], false).await?;

        for n in 0..plan.readins {
            let offset = plan.shard_offset(n);
            // stripe 0 is already in memory
            if n > 0 {
                for shard in (0..total).filter(|s| !recovery.record.is_erased(*s)) {
                    backend
                        .read_shard(shard, offset, shards.buffer_mut(shard))
                        .await
                        .map_err(|e| Error::ShardRead {
                            shard,
                            stripe: n,
                            reason: e.to_string(),
                        })?;
                }
            }

            coding_time += self.recover(
                &codec,
                &mut shards,
                &recovery.data_rows,
                Phase::DataRecovery,
                n,
            )?;
            coding_time += self.recover(
                &codec,
                &mut shards,
                &recovery.parity_rows,
                Phase::ParityRecovery,
                n,
            )?;

            let mut remaining = plan.payload_in_stripe(n);
            for shard in 0..k {
                if remaining == 0 {
                    break;
                }
                let data = shards.get(shard).ok_or_else(|| {
                    Error::Internal(format!("data shard {} missing after recovery", shard))
                })?;
                let len = remaining.min(data.len());
                backend.write_decoded(&data[..len], true).await?;
                remaining -= len;
            }

            if let Some(metrics) = &self.metrics {
                metrics.record_stripe(Operation::Decode, plan.payload_in_stripe(n));
                metrics.record_reconstructed(recovery.data_rows.len(), recovery.parity_rows.len());
            }
        }

        Ok(DecodeReport {
            source_name: metadata.source_name,
            plan,
            strategy: recovery.record.strategy,
            erased: erased_ids,
            coding_time,
            total_time: started.elapsed(),
        })
    }

    /// Run one recovery phase: a worker per row, each writing its target.
    fn recover(
        &self,
        codec: &Codec,
        shards: &mut ShardSet,
        rows: &[RecoveryRow],
        phase: Phase,
        stripe: u64,
    ) -> Result<Duration> {
        if rows.is_empty() {
            return Ok(Duration::ZERO);
        }

        let targets: Vec<usize> = rows.iter().map(|r| r.target).collect();
        let (sources, dests) = shards.split(&targets);

        let mut jobs = Vec::with_capacity(rows.len());
        for (target, dest) in dests {
            let row = rows
                .iter()
                .find(|r| r.target == target)
                .ok_or_else(|| Error::Internal(format!("no recovery row for shard {}", target)))?;
            jobs.push(row.job(dest));
        }

        let started = Instant::now();
        run_group(codec.galois(), phase, stripe, &sources, jobs)?;
        let elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_phase(phase, rows.len(), elapsed);
        }
        Ok(elapsed)
    }
}

/// Mark every shard that is missing or has the wrong length as erased.
async fn survey_shards(
    backend: &dyn ShardBackend,
    total: usize,
    plan: &StripePlan,
) -> Result<Vec<bool>> {
    let expected = plan.shard_blob_len();
    let mut erased = Vec::with_capacity(total);

    for shard in 0..total {
        let missing = match backend.shard_len(shard).await? {
            Some(len) if len == expected => false,
            Some(len) => {
                warn!(
                    "Shard {} has {} bytes, expected {}; treating it as erased",
                    shard, len, expected
                );
                true
            }
            None => true,
        };
        erased.push(missing);
    }

    Ok(erased)
}

/// Read stripe 0 of every surviving shard. A shard whose read fails is
/// marked erased; its buffer is rebuilt later like any other erasure.
async fn read_first_stripe(
    backend: &dyn ShardBackend,
    shards: &mut ShardSet,
    erased: &mut [bool],
) {
    for (shard, lost) in erased.iter_mut().enumerate() {
        if *lost {
            continue;
        }
        if let Err(e) = backend.read_shard(shard, 0, shards.buffer_mut(shard)).await {
            warn!("Shard {} unreadable ({}); treating it as erased", shard, e);
            *lost = true;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
