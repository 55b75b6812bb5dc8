//! Metrics module
//!
//! Prometheus instruments for encode and decode runs, kept in a private
//! registry so several codecs (or tests) can coexist in one process.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::ec::dotprod::Phase;
use crate::error::{Error, Result};

/// Run direction, used as the `operation` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encode,
    Decode,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Encode => "encode",
            Operation::Decode => "decode",
        }
    }
}

/// Codec instruments.
#[derive(Clone)]
pub struct CodecMetrics {
    registry: Registry,
    stripes: IntCounterVec,
    bytes: IntCounterVec,
    reconstructed: IntCounterVec,
    workers: IntCounterVec,
    phase_duration: HistogramVec,
}

impl CodecMetrics {
    /// Create and register all instruments.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let stripes = IntCounterVec::new(
            Opts::new("stripecode_stripes_total", "Stripes processed"),
            &["operation"],
        )
        .map_err(metrics_error)?;
        let bytes = IntCounterVec::new(
            Opts::new(
                "stripecode_bytes_total",
                "Bytes of original data encoded or decoded",
            ),
            &["operation"],
        )
        .map_err(metrics_error)?;
        let reconstructed = IntCounterVec::new(
            Opts::new(
                "stripecode_shards_reconstructed_total",
                "Shard stripes rebuilt during decode",
            ),
            &["kind"],
        )
        .map_err(metrics_error)?;
        let workers = IntCounterVec::new(
            Opts::new("stripecode_workers_total", "Dot-product workers spawned"),
            &["phase"],
        )
        .map_err(metrics_error)?;
        let phase_duration = HistogramVec::new(
            HistogramOpts::new(
                "stripecode_phase_duration_seconds",
                "Wall time of one worker group",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["phase"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(stripes.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(bytes.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(reconstructed.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(workers.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(phase_duration.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            stripes,
            bytes,
            reconstructed,
            workers,
            phase_duration,
        })
    }

    /// Count a finished stripe carrying `payload` original bytes.
    pub fn record_stripe(&self, operation: Operation, payload: usize) {
        let label = operation.as_str();
        self.stripes.with_label_values(&[label]).inc();
        self.bytes
            .with_label_values(&[label])
            .inc_by(payload as u64);
    }

    /// Record one worker group.
    pub fn record_phase(&self, phase: Phase, workers: usize, elapsed: Duration) {
        if workers == 0 {
            return;
        }
        let label = phase.as_str();
        self.workers
            .with_label_values(&[label])
            .inc_by(workers as u64);
        self.phase_duration
            .with_label_values(&[label])
            .observe(elapsed.as_secs_f64());
    }

    /// Count rebuilt shard stripes, split by data and parity.
    pub fn record_reconstructed(&self, data: usize, parity: usize) {
        self.reconstructed
            .with_label_values(&["data"])
            .inc_by(data as u64);
        self.reconstructed
            .with_label_values(&["parity"])
            .inc_by(parity as u64);
    }

    /// Prometheus text exposition of every instrument.
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for CodecMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecMetrics").finish_non_exhaustive()
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}
