//! Erasure Classifier
//!
//! Splits the missing shards of a run into data and parity erasures, picks a
//! decoding strategy and turns it into one coefficient row per shard that
//! has to be rebuilt.

use tracing::debug;

use super::config::Codec;
use super::dotprod::DotProduct;
use super::matrix::build_decoding_matrix;
use crate::error::{Error, Result};

// =============================================================================
// Classification
// =============================================================================

/// How erased data shards are rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Nothing is missing
    Intact,
    /// Only parity shards are missing; they are recomputed from data
    ParityOnly,
    /// Exactly one data shard is missing and the first parity shard is
    /// present: one dot product over that parity shard and the other data
    /// shards, no matrix inversion
    ReferenceParity,
    /// General case: invert the coding rows of k surviving shards
    DecodingMatrix,
}

/// Erasure pattern of a decode run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasureRecord {
    erased: Vec<bool>,
    data_shards: usize,

    /// Erased data shards (edd)
    pub data_erasures: usize,

    /// Erased parity shards (edp)
    pub parity_erasures: usize,

    /// The lost data shard on the reference-parity path; k otherwise
    pub lastdrive: usize,

    pub strategy: DecodeStrategy,
}

impl ErasureRecord {
    /// Classify an erasure pattern over `data_shards + parity_shards` shards.
    ///
    /// Fails with [`Error::InsufficientShards`] when more than
    /// `parity_shards` shards are erased. `fast_path = false` never selects
    /// [`DecodeStrategy::ReferenceParity`].
    pub fn classify(
        data_shards: usize,
        parity_shards: usize,
        erased: Vec<bool>,
        fast_path: bool,
    ) -> Result<Self> {
        if erased.len() != data_shards + parity_shards {
            return Err(Error::Internal(format!(
                "erasure flags cover {} shards, expected {}",
                erased.len(),
                data_shards + parity_shards
            )));
        }

        let data_erasures = erased[..data_shards].iter().filter(|e| **e).count();
        let parity_erasures = erased[data_shards..].iter().filter(|e| **e).count();
        let num_erased = data_erasures + parity_erasures;

        if num_erased > parity_shards {
            return Err(Error::InsufficientShards {
                erased: num_erased,
                tolerated: parity_shards,
            });
        }

        let reference_present = parity_shards > 0 && !erased[data_shards];
        let mut lastdrive = data_shards;

        let strategy = match data_erasures {
            0 if parity_erasures == 0 => DecodeStrategy::Intact,
            0 => DecodeStrategy::ParityOnly,
            1 if reference_present && fast_path => {
                lastdrive = erased[..data_shards]
                    .iter()
                    .position(|e| *e)
                    .unwrap_or(data_shards);
                DecodeStrategy::ReferenceParity
            }
            _ => DecodeStrategy::DecodingMatrix,
        };

        Ok(Self {
            erased,
            data_shards,
            data_erasures,
            parity_erasures,
            lastdrive,
            strategy,
        })
    }

    pub fn num_erased(&self) -> usize {
        self.data_erasures + self.parity_erasures
    }

    pub fn is_erased(&self, shard: usize) -> bool {
        self.erased.get(shard).copied().unwrap_or(false)
    }

    pub fn erased(&self) -> &[bool] {
        &self.erased
    }

    /// Indices of every erased shard
    pub fn erased_ids(&self) -> Vec<usize> {
        (0..self.erased.len()).filter(|&i| self.erased[i]).collect()
    }

    /// Indices of erased data shards
    pub fn erased_data(&self) -> Vec<usize> {
        (0..self.data_shards).filter(|&i| self.erased[i]).collect()
    }

    /// Indices of erased parity shards
    pub fn erased_parity(&self) -> Vec<usize> {
        (self.data_shards..self.erased.len())
            .filter(|&i| self.erased[i])
            .collect()
    }
}

// =============================================================================
// Recovery Plan
// =============================================================================

/// Coefficients that rebuild one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRow {
    /// Shard id being rebuilt
    pub target: usize,

    /// One coefficient per source column
    pub coefficients: Vec<u32>,

    /// Column → shard id; `None` means columns are data shards 0..k
    pub sources: Option<Vec<usize>>,
}

impl RecoveryRow {
    /// Bind this row to a destination buffer.
    pub fn job<'a>(&'a self, dest: &'a mut [u8]) -> DotProduct<'a> {
        DotProduct {
            target: self.target,
            row: &self.coefficients,
            src_ids: self.sources.as_deref(),
            dest,
        }
    }
}

/// Everything decode needs to rebuild a run's erasures, computed once.
#[derive(Debug, Clone)]
pub struct RecoveryPlan {
    pub record: ErasureRecord,

    /// Rows for erased data shards (data-recovery phase)
    pub data_rows: Vec<RecoveryRow>,

    /// Rows for erased parity shards (parity-recovery phase)
    pub parity_rows: Vec<RecoveryRow>,
}

impl RecoveryPlan {
    /// Derive recovery rows for `record` from the codec's coding matrix.
    pub fn build(codec: &Codec, mut record: ErasureRecord) -> Result<Self> {
        let k = codec.data_shards();
        let gf = codec.galois();
        let coding = codec.coding_matrix();

        let data_rows = match record.strategy {
            DecodeStrategy::Intact | DecodeStrategy::ParityOnly => Vec::new(),
            DecodeStrategy::ReferenceParity => match reference_parity_row(codec, record.lastdrive) {
                Some(row) => vec![row],
                None => {
                    debug!(
                        "Reference parity row cannot isolate shard {}; using decoding matrix",
                        record.lastdrive
                    );
                    record.strategy = DecodeStrategy::DecodingMatrix;
                    record.lastdrive = k;
                    decoding_matrix_rows(codec, &record)?
                }
            },
            DecodeStrategy::DecodingMatrix => decoding_matrix_rows(codec, &record)?,
        };

        let parity_rows = record
            .erased_parity()
            .into_iter()
            .map(|target| RecoveryRow {
                target,
                coefficients: coding.row(target - k).to_vec(),
                sources: None,
            })
            .collect();

        debug!(
            "Recovery plan: strategy={:?} edd={} edp={} (w={})",
            record.strategy,
            record.data_erasures,
            record.parity_erasures,
            gf.word_size()
        );

        Ok(Self {
            record,
            data_rows,
            parity_rows,
        })
    }
}

/// Solve the first parity row for the single lost data shard `lost`.
///
/// With parity row c: P0 = Σ c_j d_j, so
/// d_lost = c_lost⁻¹ · P0 + Σ_{j≠lost} c_lost⁻¹ · c_j · d_j.
/// Columns are the data shards in order with `lost` removed and the first
/// parity shard (id k) appended.
fn reference_parity_row(codec: &Codec, lost: usize) -> Option<RecoveryRow> {
    let k = codec.data_shards();
    let gf = codec.galois();
    let row = codec.coding_matrix().row(0);
    let inv = gf.inverse(row[lost])?;

    let sources: Vec<usize> = (0..k).map(|i| if i < lost { i } else { i + 1 }).collect();
    let coefficients = sources
        .iter()
        .map(|&id| {
            if id == k {
                inv
            } else {
                gf.multiply(row[id], inv)
            }
        })
        .collect();

    Some(RecoveryRow {
        target: lost,
        coefficients,
        sources: Some(sources),
    })
}

fn decoding_matrix_rows(codec: &Codec, record: &ErasureRecord) -> Result<Vec<RecoveryRow>> {
    let dm = build_decoding_matrix(
        codec.galois(),
        codec.data_shards(),
        codec.coding_matrix(),
        record.erased(),
    )?;

    Ok(record
        .erased_data()
        .into_iter()
        .map(|target| RecoveryRow {
            target,
            coefficients: dm.matrix.row(target).to_vec(),
            sources: Some(dm.surviving.clone()),
        })
        .collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::config::CodecConfig;
    use crate::ec::gf::WordSize;
    use assert_matches::assert_matches;

    fn flags(total: usize, erased: &[usize]) -> Vec<bool> {
        (0..total).map(|i| erased.contains(&i)).collect()
    }

    #[test]
    fn test_classify_intact() {
        let r = ErasureRecord::classify(4, 2, flags(6, &[]), true).unwrap();
        assert_eq!(r.strategy, DecodeStrategy::Intact);
        assert_eq!(r.num_erased(), 0);
        assert_eq!(r.lastdrive, 4);
    }

    #[test]
    fn test_classify_parity_only() {
        let r = ErasureRecord::classify(4, 2, flags(6, &[4, 5]), true).unwrap();
        assert_eq!(r.strategy, DecodeStrategy::ParityOnly);
        assert_eq!(r.data_erasures, 0);
        assert_eq!(r.parity_erasures, 2);
        assert_eq!(r.erased_parity(), vec![4, 5]);
    }

    #[test]
    fn test_classify_single_data_with_reference() {
        let r = ErasureRecord::classify(4, 2, flags(6, &[1, 5]), true).unwrap();
        assert_eq!(r.strategy, DecodeStrategy::ReferenceParity);
        assert_eq!(r.lastdrive, 1);
        assert_eq!(r.erased_data(), vec![1]);
        assert_eq!(r.erased_ids(), vec![1, 5]);
    }

    #[test]
    fn test_classify_single_data_reference_erased() {
        let r = ErasureRecord::classify(4, 2, flags(6, &[2, 4]), true).unwrap();
        assert_eq!(r.strategy, DecodeStrategy::DecodingMatrix);
        assert_eq!(r.lastdrive, 4);
    }

    #[test]
    fn test_classify_fast_path_disabled() {
        let r = ErasureRecord::classify(4, 2, flags(6, &[1]), false).unwrap();
        assert_eq!(r.strategy, DecodeStrategy::DecodingMatrix);
    }

    #[test]
    fn test_classify_multiple_data() {
        let r = ErasureRecord::classify(4, 2, flags(6, &[0, 3]), true).unwrap();
        assert_eq!(r.strategy, DecodeStrategy::DecodingMatrix);
        assert_eq!(r.data_erasures, 2);
    }

    #[test]
    fn test_classify_too_many_erasures() {
        let err = ErasureRecord::classify(4, 2, flags(6, &[0, 1, 2, 5]), true).unwrap_err();
        assert_matches!(
            err,
            Error::InsufficientShards {
                erased: 4,
                tolerated: 2
            }
        );
    }

    #[test]
    fn test_classify_no_parity() {
        let r = ErasureRecord::classify(3, 0, flags(3, &[]), true).unwrap();
        assert_eq!(r.strategy, DecodeStrategy::Intact);
        assert!(ErasureRecord::classify(3, 0, flags(3, &[0]), true).is_err());
    }

    #[test]
    fn test_reference_row_uses_first_parity() {
        let codec = Codec::new(CodecConfig::new(4, 2, WordSize::W8)).unwrap();
        let record = ErasureRecord::classify(4, 2, flags(6, &[1]), true).unwrap();
        let plan = RecoveryPlan::build(&codec, record).unwrap();

        assert_eq!(plan.data_rows.len(), 1);
        let row = &plan.data_rows[0];
        assert_eq!(row.target, 1);
        assert_eq!(row.sources.as_deref(), Some(&[0usize, 2, 3, 4][..]));
        // first parity row of reed_sol_van is all ones
        assert_eq!(row.coefficients, vec![1, 1, 1, 1]);
        assert!(plan.parity_rows.is_empty());
    }

    #[test]
    fn test_decoding_matrix_rows_for_each_erased_data_shard() {
        let codec = Codec::new(CodecConfig::new(4, 2, WordSize::W16)).unwrap();
        let record = ErasureRecord::classify(4, 2, flags(6, &[0, 2]), true).unwrap();
        let plan = RecoveryPlan::build(&codec, record).unwrap();

        let targets: Vec<usize> = plan.data_rows.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![0, 2]);
        for row in &plan.data_rows {
            assert_eq!(row.sources.as_deref(), Some(&[1usize, 3, 4, 5][..]));
            assert_eq!(row.coefficients.len(), 4);
        }
    }

    #[test]
    fn test_parity_rows_use_coding_matrix() {
        let codec = Codec::new(CodecConfig::new(3, 3, WordSize::W8)).unwrap();
        let record = ErasureRecord::classify(3, 3, flags(6, &[0, 4, 5]), true).unwrap();
        let plan = RecoveryPlan::build(&codec, record).unwrap();

        assert_eq!(plan.parity_rows.len(), 2);
        assert_eq!(plan.parity_rows[0].target, 4);
        assert_eq!(plan.parity_rows[0].coefficients, codec.coding_matrix().row(1));
        assert_eq!(plan.parity_rows[1].sources, None);
    }
}
