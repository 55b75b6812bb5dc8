//! Parallel Dot-Product Engine
//!
//! Computes one shard as a linear combination of other shards and runs a
//! group of such computations concurrently, one scoped thread per
//! destination, joined before the group returns.
//!
//! # Ownership
//!
//! Each worker owns a unique `&mut [u8]` destination. Sources are handed out
//! as a shared [`SourceSet`] that never contains a destination of the same
//! group, so concurrent workers cannot alias and no lock is needed.

use std::fmt;

use tracing::trace;

use super::gf::Galois;
use crate::error::{Error, Result};

// =============================================================================
// Phase
// =============================================================================

/// Which stage of a run a worker group belongs to (for error context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Parity computation during encode
    Encode,
    /// Reconstruction of erased data shards
    DataRecovery,
    /// Recomputation of erased parity shards
    ParityRecovery,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Encode => "encode",
            Phase::DataRecovery => "data-recovery",
            Phase::ParityRecovery => "parity-recovery",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Read-only view of the shard buffers of one stripe, indexed by shard id.
/// `None` marks a shard that is unavailable or is a destination.
#[derive(Debug, Clone, Default)]
pub struct SourceSet<'a> {
    shards: Vec<Option<&'a [u8]>>,
}

impl<'a> SourceSet<'a> {
    pub fn new(shards: Vec<Option<&'a [u8]>>) -> Self {
        Self { shards }
    }

    pub fn get(&self, id: usize) -> Option<&'a [u8]> {
        self.shards.get(id).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

// =============================================================================
// Dot Product
// =============================================================================

/// One unit of work: `dest = Σ row[i] * source[src_ids[i]]`.
#[derive(Debug)]
pub struct DotProduct<'a> {
    /// Shard id being produced
    pub target: usize,

    /// Coefficients, one per column
    pub row: &'a [u32],

    /// Column → shard id; identity when `None`
    pub src_ids: Option<&'a [usize]>,

    /// Exclusive destination buffer
    pub dest: &'a mut [u8],
}

impl DotProduct<'_> {
    /// Run this dot product against `sources`.
    pub fn execute(self, gf: &Galois, sources: &SourceSet<'_>) -> Result<()> {
        let mut terms = Vec::with_capacity(self.row.len());
        for (col, &coefficient) in self.row.iter().enumerate() {
            if coefficient == 0 {
                continue;
            }
            let id = self.src_ids.map_or(col, |ids| ids[col]);
            let src = sources.get(id).ok_or_else(|| {
                Error::Internal(format!(
                    "source shard {} unavailable while computing shard {}",
                    id, self.target
                ))
            })?;
            if src.len() != self.dest.len() {
                return Err(Error::Internal(format!(
                    "source shard {} has {} bytes, destination {} has {}",
                    id,
                    src.len(),
                    self.target,
                    self.dest.len()
                )));
            }
            terms.push((coefficient, src));
        }

        accumulate(gf, &terms, self.dest);
        Ok(())
    }
}

/// Write `Σ c * src` over `terms` into `dest`.
///
/// The first term is written with copy semantics, the rest are XORed in, so
/// `dest` may start with arbitrary contents. The result does not depend on
/// the order of `terms`. With no terms `dest` is zeroed.
pub fn accumulate(gf: &Galois, terms: &[(u32, &[u8])], dest: &mut [u8]) {
    let mut init = false;
    for &(coefficient, src) in terms {
        match coefficient {
            0 => continue,
            1 if !init => dest.copy_from_slice(src),
            1 => Galois::region_xor(src, dest),
            c => gf.region_multiply(src, c, dest, init),
        }
        init = true;
    }
    if !init {
        dest.fill(0);
    }
}

// =============================================================================
// Worker Group
// =============================================================================

/// Run every job on its own scoped thread and join them all.
///
/// Returns the first failure; a worker that cannot be spawned or that
/// panics aborts the group with [`Error::WorkerSpawn`] / [`Error::WorkerJoin`].
pub fn run_group(
    gf: &Galois,
    phase: Phase,
    stripe: u64,
    sources: &SourceSet<'_>,
    jobs: Vec<DotProduct<'_>>,
) -> Result<()> {
    if jobs.is_empty() {
        return Ok(());
    }
    let shards: Vec<usize> = jobs.iter().map(|job| job.target).collect();
    trace!("Dispatching {} {} workers for stripe {}", jobs.len(), phase, stripe);

    let outcome = crossbeam::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let target = job.target;
            let handle = scope
                .builder()
                .name(format!("{}-{}", phase, target))
                .spawn(move |_| job.execute(gf, sources))
                .map_err(|source| Error::WorkerSpawn {
                    phase,
                    shard: target,
                    stripe,
                    source,
                })?;
            handles.push(handle);
        }

        let mut first_error = None;
        for handle in handles {
            let result = handle.join().unwrap_or_else(|_| {
                Err(Error::WorkerJoin {
                    phase,
                    stripe,
                    shards: shards.clone(),
                })
            });
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    });

    outcome.unwrap_or_else(|_| {
        Err(Error::WorkerJoin {
            phase,
            stripe,
            shards,
        })
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::gf::WordSize;

    fn shard(seed: u8, len: usize) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(seed).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Encode.to_string(), "encode");
        assert_eq!(Phase::DataRecovery.to_string(), "data-recovery");
        assert_eq!(Phase::ParityRecovery.to_string(), "parity-recovery");
    }

    #[test]
    fn test_accumulate_copy_then_xor() {
        let gf = Galois::new(WordSize::W8);
        let a = shard(3, 16);
        let b = shard(5, 16);
        let mut dest = vec![0xeeu8; 16];

        accumulate(&gf, &[(1, a.as_slice()), (1, b.as_slice())], &mut dest);

        let expected: Vec<u8> = a.iter().zip(&b).map(|(x, y)| x ^ y).collect();
        assert_eq!(dest, expected);
    }

    #[test]
    fn test_accumulate_no_terms_zeroes() {
        let gf = Galois::new(WordSize::W8);
        let a = shard(3, 8);
        let mut dest = vec![0xffu8; 8];
        accumulate(&gf, &[(0, a.as_slice())], &mut dest);
        assert_eq!(dest, vec![0u8; 8]);
    }

    #[test]
    fn test_accumulate_multiply_first_term_ignores_garbage() {
        let gf = Galois::new(WordSize::W16);
        let a = shard(7, 32);
        let mut clean = vec![0u8; 32];
        let mut dirty = vec![0xa5u8; 32];
        accumulate(&gf, &[(9, a.as_slice())], &mut clean);
        accumulate(&gf, &[(9, a.as_slice())], &mut dirty);
        assert_eq!(clean, dirty);
    }

    #[test]
    fn test_execute_with_remap() {
        let gf = Galois::new(WordSize::W8);
        let s0 = shard(1, 8);
        let s1 = shard(2, 8);
        let s2 = shard(3, 8);
        let sources = SourceSet::new(vec![Some(s0.as_slice()), Some(s1.as_slice()), Some(s2.as_slice())]);

        let mut dest = vec![0u8; 8];
        let ids = [2, 0];
        DotProduct {
            target: 3,
            row: &[1, 1],
            src_ids: Some(&ids[..]),
            dest: &mut dest,
        }
        .execute(&gf, &sources)
        .unwrap();

        let expected: Vec<u8> = s2.iter().zip(&s0).map(|(x, y)| x ^ y).collect();
        assert_eq!(dest, expected);
    }

    #[test]
    fn test_execute_missing_source_fails() {
        let gf = Galois::new(WordSize::W8);
        let s0 = shard(1, 8);
        let sources = SourceSet::new(vec![Some(s0.as_slice()), None]);
        let mut dest = vec![0u8; 8];
        let result = DotProduct {
            target: 2,
            row: &[1, 1],
            src_ids: None,
            dest: &mut dest,
        }
        .execute(&gf, &sources);
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[test]
    fn test_execute_skips_zero_coefficient_for_missing_source() {
        let gf = Galois::new(WordSize::W8);
        let s0 = shard(1, 8);
        let sources = SourceSet::new(vec![Some(s0.as_slice()), None]);
        let mut dest = vec![0u8; 8];
        DotProduct {
            target: 2,
            row: &[1, 0],
            src_ids: None,
            dest: &mut dest,
        }
        .execute(&gf, &sources)
        .unwrap();
        assert_eq!(dest, s0);
    }

    #[test]
    fn test_run_group_parallel_matches_sequential() {
        let gf = Galois::new(WordSize::W8);
        let data: Vec<Vec<u8>> = (1..=4).map(|s| shard(s, 64)).collect();
        let sources = SourceSet::new(data.iter().map(|d| Some(d.as_slice())).collect());
        let rows: Vec<Vec<u32>> = vec![vec![1, 1, 1, 1], vec![1, 2, 3, 4], vec![5, 0, 7, 1]];

        let mut parallel = vec![vec![0u8; 64]; 3];
        let jobs = rows
            .iter()
            .zip(parallel.iter_mut())
            .enumerate()
            .map(|(i, (row, dest))| DotProduct {
                target: 4 + i,
                row,
                src_ids: None,
                dest,
            })
            .collect();
        run_group(&gf, Phase::Encode, 0, &sources, jobs).unwrap();

        for (row, out) in rows.iter().zip(&parallel) {
            let mut expected = vec![0u8; 64];
            DotProduct {
                target: 0,
                row,
                src_ids: None,
                dest: &mut expected,
            }
            .execute(&gf, &sources)
            .unwrap();
            assert_eq!(out, &expected);
        }
    }

    #[test]
    fn test_run_group_empty() {
        let gf = Galois::new(WordSize::W8);
        let sources = SourceSet::default();
        assert!(run_group(&gf, Phase::ParityRecovery, 3, &sources, Vec::new()).is_ok());
    }

    #[test]
    fn test_run_group_reports_worker_error() {
        let gf = Galois::new(WordSize::W8);
        let sources = SourceSet::new(vec![None]);
        let mut dest = vec![0u8; 4];
        let jobs = vec![DotProduct {
            target: 1,
            row: &[1],
            src_ids: None,
            dest: &mut dest,
        }];
        let err = run_group(&gf, Phase::DataRecovery, 0, &sources, jobs).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_run_group_worker_panic_is_join_error() {
        let gf = Galois::new(WordSize::W8);
        let s0 = shard(2, 8);
        let s1 = shard(7, 8);
        let sources = SourceSet::new(vec![Some(s0.as_slice()), Some(s1.as_slice())]);
        let mut dest = vec![0u8; 8];
        // column 1 has no shard id, so the worker indexes past src_ids
        let jobs = vec![DotProduct {
            target: 3,
            row: &[1, 1],
            src_ids: Some(&[0][..]),
            dest: &mut dest,
        }];
        let err = run_group(&gf, Phase::DataRecovery, 5, &sources, jobs).unwrap_err();
        match err {
            Error::WorkerJoin {
                phase,
                stripe,
                shards,
            } => {
                assert_eq!(phase, Phase::DataRecovery);
                assert_eq!(stripe, 5);
                assert_eq!(shards, vec![3]);
            }
            other => panic!("expected a join error, got {:?}", other),
        }
    }
}
