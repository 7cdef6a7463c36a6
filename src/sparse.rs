//! Triplet-based sparse matrix storage for mass and stiffness matrices.
//!
//! Entries are kept unique per (row, col): inserting into an existing
//! position adds to the stored value. Conversions to nalgebra-sparse (and
//! optionally sprs) formats feed the solvers.

use std::collections::HashMap;

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

#[cfg(feature = "sprs-backend")]
use sprs::{CsMat, TriMat};

use crate::error::{check_dimension, ReductionError, ReductionResult};
use crate::types::DOF_PER_NODE;

/// Sparse matrix as zero-based (row, col, value) triplets with merge-on-insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SparseMatrixData", into = "SparseMatrixData")]
pub struct SparseMatrixStore {
    nrows: usize,
    ncols: usize,
    triplets: Vec<(usize, usize, f64)>,
    lookup: HashMap<(usize, usize), usize>,
}

/// Persisted layout of a [`SparseMatrixStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SparseMatrixData {
    shape: [usize; 2],
    triplets: Vec<(usize, usize, f64)>,
}

impl TryFrom<SparseMatrixData> for SparseMatrixStore {
    type Error = ReductionError;

    fn try_from(data: SparseMatrixData) -> ReductionResult<Self> {
        SparseMatrixStore::from_triplets(data.shape[0], data.shape[1], data.triplets)
    }
}

impl From<SparseMatrixStore> for SparseMatrixData {
    fn from(store: SparseMatrixStore) -> Self {
        SparseMatrixData {
            shape: [store.nrows, store.ncols],
            triplets: store.triplets,
        }
    }
}

impl PartialEq for SparseMatrixStore {
    fn eq(&self, other: &Self) -> bool {
        self.nrows == other.nrows && self.ncols == other.ncols && self.triplets == other.triplets
    }
}

impl Default for SparseMatrixStore {
    fn default() -> Self {
        SparseMatrixStore::new(0, 0)
    }
}

impl SparseMatrixStore {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            triplets: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Build a store from triplets, merging duplicate positions.
    pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> ReductionResult<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut store = Self::new(nrows, ncols);
        for (row, col, value) in triplets {
            store.add_entry(row, col, value)?;
        }
        Ok(store)
    }

    /// Add `value` at (row, col), merging into an existing entry.
    pub fn add_entry(&mut self, row: usize, col: usize, value: f64) -> ReductionResult<()> {
        if row >= self.nrows {
            return Err(ReductionError::InvalidDimension {
                context: "sparse entry row",
                expected: self.nrows,
                found: row,
            });
        }
        if col >= self.ncols {
            return Err(ReductionError::InvalidDimension {
                context: "sparse entry column",
                expected: self.ncols,
                found: col,
            });
        }
        self.merge(row, col, value);
        Ok(())
    }

    fn merge(&mut self, row: usize, col: usize, value: f64) {
        match self.lookup.get(&(row, col)) {
            Some(&idx) => self.triplets[idx].2 += value,
            None => {
                self.lookup.insert((row, col), self.triplets.len());
                self.triplets.push((row, col, value));
            }
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.triplets.len()
    }

    pub fn triplets(&self) -> &[(usize, usize, f64)] {
        &self.triplets
    }

    /// Stored value at (row, col), zero if absent.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.lookup
            .get(&(row, col))
            .map(|&idx| self.triplets[idx].2)
            .unwrap_or(0.0)
    }

    /// Multiply every stored value by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for entry in &mut self.triplets {
            entry.2 *= factor;
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut mat = DMatrix::<f64>::zeros(self.nrows, self.ncols);
        for &(row, col, value) in &self.triplets {
            mat[(row, col)] += value;
        }
        mat
    }

    fn to_coo(&self) -> CooMatrix<f64> {
        let mut coo = CooMatrix::new(self.nrows, self.ncols);
        for &(row, col, value) in &self.triplets {
            coo.push(row, col, value);
        }
        coo
    }

    pub fn to_csr(&self) -> CsrMatrix<f64> {
        CsrMatrix::from(&self.to_coo())
    }

    pub fn to_csc(&self) -> CscMatrix<f64> {
        CscMatrix::from(&self.to_coo())
    }

    /// Convert to a sprs CSR matrix.
    #[cfg(feature = "sprs-backend")]
    pub fn to_sprs(&self) -> CsMat<f64> {
        let mut tri = TriMat::new((self.nrows, self.ncols));
        for &(row, col, value) in &self.triplets {
            tri.add_triplet(row, col, value);
        }
        tri.to_csr()
    }

    /// Renumber rows and columns with `permutation[old] = new`.
    ///
    /// The matrix must be square and the permutation a bijection whose length
    /// equals the dimension and is a multiple of 3.
    pub fn remap_indices(&mut self, permutation: &[usize]) -> ReductionResult<()> {
        check_dimension("remap square matrix", self.nrows, self.ncols)?;
        check_dimension("remap permutation length", self.nrows, permutation.len())?;
        validate_permutation(permutation)?;

        let old = std::mem::take(&mut self.triplets);
        self.lookup.clear();
        for (row, col, value) in old {
            self.merge(permutation[row], permutation[col], value);
        }
        Ok(())
    }
}

fn validate_permutation(permutation: &[usize]) -> ReductionResult<()> {
    let n = permutation.len();
    if n % DOF_PER_NODE != 0 {
        return Err(ReductionError::InvalidDimension {
            context: "permutation length (multiple of 3)",
            expected: n - n % DOF_PER_NODE,
            found: n,
        });
    }
    let mut seen = vec![false; n];
    for &target in permutation {
        if target >= n || seen[target] {
            return Err(ReductionError::InvalidDimension {
                context: "permutation target",
                expected: n,
                found: target,
            });
        }
        seen[target] = true;
    }
    Ok(())
}

/// Permutation mapping XXX..YYY..ZZZ coordinate ordering to XYZXYZ.. ordering.
pub fn xxxyyyzzz_to_xyz_permutation(n: usize) -> ReductionResult<Vec<usize>> {
    if n % DOF_PER_NODE != 0 {
        return Err(ReductionError::InvalidDimension {
            context: "XXXYYYZZZ length (multiple of 3)",
            expected: n - n % DOF_PER_NODE,
            found: n,
        });
    }
    let num_nodes = n / DOF_PER_NODE;
    Ok((0..n)
        .map(|old| {
            let component = old / num_nodes;
            let node = old % num_nodes;
            node * DOF_PER_NODE + component
        })
        .collect())
}

/// Resort a vector from XXX..YYY..ZZZ to XYZXYZ.. ordering.
pub fn resort_xxxyyyzzz_vector(values: &[f64]) -> ReductionResult<Vec<f64>> {
    let permutation = xxxyyyzzz_to_xyz_permutation(values.len())?;
    let mut out = vec![0.0; values.len()];
    for (old, &new) in permutation.iter().enumerate() {
        out[new] = values[old];
    }
    Ok(out)
}
