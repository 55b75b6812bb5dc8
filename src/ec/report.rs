//! Run Reports
//!
//! Timing summaries returned by the encode and decode orchestrators.
//! Coding time covers only the parallel dot-product phases; total time
//! covers the whole run including I/O.

use std::fmt;
use std::time::Duration;

use super::erasure::DecodeStrategy;
use super::planner::StripePlan;

const MIB: f64 = 1024.0 * 1024.0;

/// Throughput in MiB/s; 0 for an empty or instantaneous run.
pub fn mib_per_sec(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 || secs <= 0.0 {
        0.0
    } else {
        bytes as f64 / MIB / secs
    }
}

/// Summary of an encode run.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub source_name: String,
    pub plan: StripePlan,
    pub data_shards: usize,
    pub parity_shards: usize,

    /// Whether shards and metadata were written to a backend
    pub persisted: bool,

    /// Time spent computing parity
    pub coding_time: Duration,

    /// Wall time of the whole run
    pub total_time: Duration,
}

impl EncodeReport {
    pub fn coding_throughput(&self) -> f64 {
        mib_per_sec(self.plan.original_size, self.coding_time)
    }

    pub fn total_throughput(&self) -> f64 {
        mib_per_sec(self.plan.original_size, self.total_time)
    }
}

impl fmt::Display for EncodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Encoded {} ({} bytes) into {}+{} shards of {} bytes over {} stripe(s)",
            self.source_name,
            self.plan.original_size,
            self.data_shards,
            self.parity_shards,
            self.plan.shard_blob_len(),
            self.plan.readins
        )?;
        writeln!(
            f,
            "Encoding (MB/sec): {:.4} ({:.6} s)",
            self.coding_throughput(),
            self.coding_time.as_secs_f64()
        )?;
        write!(
            f,
            "En_Total (MB/sec): {:.4} ({:.6} s)",
            self.total_throughput(),
            self.total_time.as_secs_f64()
        )
    }
}

/// Summary of a decode run.
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub source_name: String,
    pub plan: StripePlan,
    pub strategy: DecodeStrategy,

    /// Erased shard ids
    pub erased: Vec<usize>,

    /// Time spent in the recovery phases
    pub coding_time: Duration,

    /// Wall time of the whole run
    pub total_time: Duration,
}

impl DecodeReport {
    pub fn coding_throughput(&self) -> f64 {
        mib_per_sec(self.plan.original_size, self.coding_time)
    }

    pub fn total_throughput(&self) -> f64 {
        mib_per_sec(self.plan.original_size, self.total_time)
    }
}

impl fmt::Display for DecodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Decoded {} ({} bytes, {} stripe(s)), erased shards {:?}, strategy {:?}",
            self.source_name, self.plan.original_size, self.plan.readins, self.erased, self.strategy
        )?;
        writeln!(
            f,
            "Decoding (MB/sec): {:.4} ({:.6} s)",
            self.coding_throughput(),
            self.coding_time.as_secs_f64()
        )?;
        write!(
            f,
            "De_Total (MB/sec): {:.4} ({:.6} s)",
            self.total_throughput(),
            self.total_time.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mib_per_sec() {
        assert_eq!(mib_per_sec(0, Duration::from_secs(1)), 0.0);
        assert_eq!(mib_per_sec(1024, Duration::ZERO), 0.0);
        let rate = mib_per_sec(4 * 1024 * 1024, Duration::from_secs(2));
        assert!((rate - 2.0).abs() < 1e-9);
    }
}
