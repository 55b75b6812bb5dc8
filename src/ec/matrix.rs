//! Coding and Decoding Matrices
//!
//! Generates the systematic Vandermonde coding matrix (`reed_sol_van`) and the
//! k×k decoding matrix for a given erasure pattern.

use std::fmt;

use super::gf::Galois;
use crate::error::{Error, Result};

// =============================================================================
// Matrix
// =============================================================================

/// Dense row-major matrix of field elements.
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u32>,
}

impl Matrix {
    /// Zero matrix of the given shape
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: u32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[u32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    fn row_mut(&mut self, row: usize) -> &mut [u32] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for col in 0..self.cols {
            self.data.swap(a * self.cols + col, b * self.cols + col);
        }
    }

    fn scale_row(&mut self, gf: &Galois, row: usize, factor: u32) {
        for v in self.row_mut(row) {
            *v = gf.multiply(*v, factor);
        }
    }

    /// row[dst] ^= factor * row[src]
    fn add_scaled_row(&mut self, gf: &Galois, dst: usize, src: usize, factor: u32) {
        for col in 0..self.cols {
            let v = gf.multiply(factor, self.get(src, col));
            self.data[dst * self.cols + col] ^= v;
        }
    }

    /// Gauss-Jordan inversion. Returns `None` for a singular matrix.
    pub fn invert(&self, gf: &Galois) -> Option<Matrix> {
        debug_assert_eq!(self.rows, self.cols);
        let n = self.rows;
        let mut work = self.clone();
        let mut inv = Matrix::identity(n);

        for col in 0..n {
            let pivot = (col..n).find(|&r| work.get(r, col) != 0)?;
            work.swap_rows(col, pivot);
            inv.swap_rows(col, pivot);

            let scale = gf.inverse(work.get(col, col))?;
            if scale != 1 {
                work.scale_row(gf, col, scale);
                inv.scale_row(gf, col, scale);
            }

            for r in 0..n {
                let factor = work.get(r, col);
                if r != col && factor != 0 {
                    work.add_scaled_row(gf, r, col, factor);
                    inv.add_scaled_row(gf, r, col, factor);
                }
            }
        }

        Some(inv)
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix {}x{} [", self.rows, self.cols)?;
        for r in 0..self.rows {
            writeln!(f, "  {:?}", self.row(r))?;
        }
        write!(f, "]")
    }
}

// =============================================================================
// Coding Matrix
// =============================================================================

/// Build the m×k `reed_sol_van` coding matrix.
///
/// Starts from the (k+m)×k extended Vandermonde matrix, column-reduces it
/// until the top k×k block is the identity, then scales so that the first
/// parity row and the first column of every parity row are all ones. Any k
/// rows of the resulting distribution matrix are linearly independent.
pub fn build_coding_matrix(gf: &Galois, k: usize, m: usize) -> Result<Matrix> {
    if k == 0 {
        return Err(Error::CodingMatrix("k must be greater than 0".to_string()));
    }
    if m == 0 {
        return Ok(Matrix::zeros(0, k));
    }
    let rows = k + m;
    if rows as u64 > gf.word_size().max_shards() {
        return Err(Error::CodingMatrix(format!(
            "k + m = {} exceeds 2^{}",
            rows,
            gf.word_size()
        )));
    }

    let mut dist = extended_vandermonde(gf, rows, k);

    for i in 1..k {
        let pivot = (i..rows).find(|&r| dist.get(r, i) != 0).ok_or_else(|| {
            Error::CodingMatrix(format!("no pivot for column {} of {}x{}", i, rows, k))
        })?;
        dist.swap_rows(i, pivot);

        let diag = dist.get(i, i);
        if diag != 1 {
            let inv = gf
                .inverse(diag)
                .ok_or_else(|| Error::CodingMatrix("zero pivot".to_string()))?;
            for r in 0..rows {
                dist.set(r, i, gf.multiply(inv, dist.get(r, i)));
            }
        }

        // column j += e * column i, for every e = dist[i][j] off the diagonal
        for j in 0..k {
            let e = dist.get(i, j);
            if j != i && e != 0 {
                for r in 0..rows {
                    let v = dist.get(r, j) ^ gf.multiply(e, dist.get(r, i));
                    dist.set(r, j, v);
                }
            }
        }
    }

    // Row k all ones: scale each parity column by 1 / dist[k][j].
    for j in 0..k {
        let e = dist.get(k, j);
        if e != 1 {
            let inv = gf.inverse(e).ok_or_else(|| {
                Error::CodingMatrix(format!("zero in first parity row at column {}", j))
            })?;
            for r in k..rows {
                dist.set(r, j, gf.multiply(inv, dist.get(r, j)));
            }
        }
    }

    // First column ones: scale each remaining parity row by 1 / dist[r][0].
    for r in k + 1..rows {
        let e = dist.get(r, 0);
        if e != 1 {
            let inv = gf.inverse(e).ok_or_else(|| {
                Error::CodingMatrix(format!("zero in first column of row {}", r))
            })?;
            dist.scale_row(gf, r, inv);
        }
    }

    let mut coding = Matrix::zeros(m, k);
    for i in 0..m {
        coding.row_mut(i).copy_from_slice(dist.row(k + i));
    }
    Ok(coding)
}

/// Row 0 = e_0, last row = e_{cols-1}, row i in between = [1, i, i^2, ...].
fn extended_vandermonde(gf: &Galois, rows: usize, cols: usize) -> Matrix {
    let mut vdm = Matrix::zeros(rows, cols);
    vdm.set(0, 0, 1);
    vdm.set(rows - 1, cols - 1, 1);
    for i in 1..rows - 1 {
        let mut acc = 1u32;
        for j in 0..cols {
            vdm.set(i, j, acc);
            acc = gf.multiply(acc, i as u32);
        }
    }
    vdm
}

// =============================================================================
// Decoding Matrix
// =============================================================================

/// Inverse of the coding rows of k surviving shards.
#[derive(Debug, Clone)]
pub struct DecodingMatrix {
    /// k×k matrix: row i rebuilds data shard i from `surviving`
    pub matrix: Matrix,
    /// Shard ids that column j of `matrix` refers to
    pub surviving: Vec<usize>,
}

/// Build the decoding matrix for an erasure pattern over k + m shards.
///
/// Picks the first k non-erased shards, stacks their rows of the
/// distribution matrix (identity rows for data, coding rows for parity)
/// and inverts.
pub fn build_decoding_matrix(
    gf: &Galois,
    k: usize,
    coding: &Matrix,
    erased: &[bool],
) -> Result<DecodingMatrix> {
    let erased_ids: Vec<usize> = erased
        .iter()
        .enumerate()
        .filter(|(_, e)| **e)
        .map(|(i, _)| i)
        .collect();

    let surviving: Vec<usize> = erased
        .iter()
        .enumerate()
        .filter(|(_, e)| !**e)
        .map(|(i, _)| i)
        .take(k)
        .collect();

    if surviving.len() < k {
        return Err(Error::DecodingMatrix {
            erased: erased_ids,
            reason: format!("only {} surviving shards, need {}", surviving.len(), k),
        });
    }

    let mut stacked = Matrix::zeros(k, k);
    for (row, &id) in surviving.iter().enumerate() {
        if id < k {
            stacked.set(row, id, 1);
        } else {
            stacked.row_mut(row).copy_from_slice(coding.row(id - k));
        }
    }

    let matrix = stacked.invert(gf).ok_or_else(|| Error::DecodingMatrix {
        erased: erased_ids,
        reason: "surviving rows are linearly dependent".to_string(),
    })?;

    Ok(DecodingMatrix { matrix, surviving })
}

// =============================================================================
// Tests
// =============================================================================
