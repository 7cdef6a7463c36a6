//! Static condensation of the internal DOF onto interface motions.

use nalgebra::DMatrix;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use tracing::{debug, warn};

use crate::error::{check_dimension, ReductionError, ReductionResult};
use crate::types::SINGULAR_PIVOT_TOL;

/// Sparse Cholesky factor of Kii, computed once and reused for every load case.
pub struct StaticCondensation {
    n_internal: usize,
    factor: Option<CscCholesky<f64>>,
    min_relative_pivot: f64,
}

impl std::fmt::Debug for StaticCondensation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCondensation")
            .field("n_internal", &self.n_internal)
            .field("min_relative_pivot", &self.min_relative_pivot)
            .finish()
    }
}

impl StaticCondensation {
    /// Factorize the internal stiffness block.
    ///
    /// Fails with `SingularCondensation` if Kii is not positive definite or a
    /// pivot falls below `SINGULAR_PIVOT_TOL` times its largest diagonal entry.
    pub fn factorize(kii: &CsrMatrix<f64>) -> ReductionResult<Self> {
        let n = kii.nrows();
        check_dimension("internal stiffness columns", n, kii.ncols())?;
        if n == 0 {
            return Ok(Self {
                n_internal: 0,
                factor: None,
                min_relative_pivot: 1.0,
            });
        }

        let max_diag = kii
            .triplet_iter()
            .filter(|(i, j, _)| i == j)
            .map(|(_, _, v)| v.abs())
            .fold(0.0_f64, f64::max);
        if max_diag == 0.0 {
            return Err(ReductionError::SingularCondensation { min_pivot: 0.0 });
        }

        let csc = CscMatrix::from(kii);
        let factor = CscCholesky::factor(&csc)
            .map_err(|_| ReductionError::SingularCondensation { min_pivot: 0.0 })?;

        // pivots of K = L L^T are the squared diagonal entries of L
        let min_pivot = factor
            .l()
            .triplet_iter()
            .filter(|(i, j, _)| i == j)
            .map(|(_, _, v)| v * v)
            .fold(f64::INFINITY, f64::min);
        let min_relative_pivot = min_pivot / max_diag;

        if !min_relative_pivot.is_finite() || min_relative_pivot < SINGULAR_PIVOT_TOL {
            warn!(min_relative_pivot, "internal stiffness block is numerically singular");
            return Err(ReductionError::SingularCondensation {
                min_pivot: if min_relative_pivot.is_finite() {
                    min_relative_pivot
                } else {
                    0.0
                },
            });
        }

        debug!(n_internal = n, nnz = kii.nnz(), min_relative_pivot, "factorized Kii");

        Ok(Self {
            n_internal: n,
            factor: Some(factor),
            min_relative_pivot,
        })
    }

    pub fn n_internal(&self) -> usize {
        self.n_internal
    }

    /// Smallest Cholesky pivot relative to the largest diagonal entry of Kii.
    pub fn min_relative_pivot(&self) -> f64 {
        self.min_relative_pivot
    }

    /// Solve Kii X = B for every column of `rhs`.
    pub fn solve(&self, rhs: &DMatrix<f64>) -> ReductionResult<DMatrix<f64>> {
        check_dimension("condensation right-hand side rows", self.n_internal, rhs.nrows())?;
        Ok(match &self.factor {
            Some(factor) => factor.solve(rhs),
            None => DMatrix::zeros(0, rhs.ncols()),
        })
    }

    /// Static modes `-Kii^-1 * (Kib * T)` for the boundary map `boundary_map` (T).
    pub fn solve_static_modes(
        &self,
        kib: &CsrMatrix<f64>,
        boundary_map: &DMatrix<f64>,
    ) -> ReductionResult<DMatrix<f64>> {
        check_dimension("Kib rows", self.n_internal, kib.nrows())?;
        check_dimension("boundary map rows", kib.ncols(), boundary_map.nrows())?;

        let rhs: DMatrix<f64> = kib * boundary_map;
        let mut modes = self.solve(&rhs)?;
        modes.neg_mut();
        Ok(modes)
    }
}
