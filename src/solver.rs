//! Generalized symmetric eigenvalue solvers (K v = λ M v).
//!
//! This module provides a dense solver for small systems and a shift-invert
//! Lanczos solver for large sparse systems. Both return eigenvalues sorted by
//! magnitude with mass-normalized eigenvectors.

use nalgebra::linalg::SymmetricEigen;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use tracing::debug;

#[cfg(feature = "sprs-backend")]
use sprs::{CsMat, TriMat};

use crate::error::{check_dimension, ReductionError, ReductionResult};
use crate::types::{
    EigenSolver, SparseBackend, CAMPBELL_UNIQUE_TOL, LANCZOS_TOL, MAX_LANCZOS_ITER, SHIFT_FACTOR,
};

/// Eigenvalues (|λ|, ascending) and matching eigenvectors as columns.
#[derive(Debug, Clone)]
pub struct EigenModes {
    pub eigenvalues: Vec<f64>,
    pub eigenvectors: DMatrix<f64>,
}

impl EigenModes {
    pub fn empty(n: usize) -> Self {
        Self {
            eigenvalues: Vec::new(),
            eigenvectors: DMatrix::zeros(n, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert eigenvalues (ω²) to frequencies in Hz.
pub fn eigen_frequencies_hz(eigenvalues: &[f64]) -> Vec<f64> {
    eigenvalues
        .iter()
        .map(|&lambda| lambda.abs().sqrt() / (2.0 * std::f64::consts::PI))
        .collect()
}

/// Sparse matrix-vector product: y = A * x
/// Uses nalgebra-sparse's optimized implementation.
#[inline(always)]
fn spmv(a: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    a * x
}

fn csr_to_dense(a: &CsrMatrix<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(a.nrows(), a.ncols());
    for (i, row) in a.row_iter().enumerate() {
        for (&col, &val) in row.col_indices().iter().zip(row.values().iter()) {
            dense[(i, col)] += val;
        }
    }
    dense
}

fn mean_diagonal(a: &CsrMatrix<f64>) -> f64 {
    let n = a.nrows();
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .triplet_iter()
        .filter(|(i, j, _)| i == j)
        .map(|(_, _, v)| *v)
        .sum();
    sum / n as f64
}

/// Negative shift placing σ just below the spectrum so K - σM stays positive definite.
fn default_shift(k: &CsrMatrix<f64>, m: &CsrMatrix<f64>) -> ReductionResult<f64> {
    let m_mean = mean_diagonal(m);
    let k_mean = mean_diagonal(k);
    if m_mean <= 0.0 || k_mean < 0.0 {
        return Err(ReductionError::EigenSolverFailed(format!(
            "cannot derive shift from mean diagonals (K: {k_mean:e}, M: {m_mean:e})"
        )));
    }
    let scale = if k_mean > 0.0 { k_mean / m_mean } else { 1.0 };
    Ok(-SHIFT_FACTOR * scale)
}

/// Build and factor the shifted matrix (K - sigma * M) with a sparse Cholesky.
fn factor_shifted<I, J>(n: usize, k_entries: I, m_entries: J, sigma: f64) -> ReductionResult<CscCholesky<f64>>
where
    I: Iterator<Item = (usize, usize, f64)>,
    J: Iterator<Item = (usize, usize, f64)>,
{
    let mut coo = CooMatrix::new(n, n);
    for (i, j, v) in k_entries {
        coo.push(i, j, v);
    }
    for (i, j, v) in m_entries {
        coo.push(i, j, -sigma * v);
    }
    let shifted = CscMatrix::from(&coo);
    CscCholesky::factor(&shifted).map_err(|err| {
        ReductionError::EigenSolverFailed(format!(
            "factorization of K - sigma*M failed (sigma = {sigma:e}): {err:?}"
        ))
    })
}

fn cholesky_solve(chol: &CscCholesky<f64>, rhs: &DVector<f64>) -> DVector<f64> {
    let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
    let x = chol.solve(&b);
    x.column(0).into_owned()
}

/// Sort eigenpairs by |λ|, drop the excluded leading pairs and keep `num_modes`.
fn select_modes(
    mut pairs: Vec<(f64, DVector<f64>)>,
    n: usize,
    num_modes: usize,
    exclude_rigid_body_modes: usize,
) -> EigenModes {
    pairs.sort_by(|a, b| a.0.abs().total_cmp(&b.0.abs()));

    let selected: Vec<(f64, DVector<f64>)> = pairs
        .into_iter()
        .skip(exclude_rigid_body_modes)
        .take(num_modes)
        .collect();

    let mut eigenvectors = DMatrix::zeros(n, selected.len());
    for (i, (_, v)) in selected.iter().enumerate() {
        eigenvectors.set_column(i, v);
    }

    EigenModes {
        eigenvalues: selected.iter().map(|(l, _)| l.abs()).collect(),
        eigenvectors,
    }
}

fn krylov_dimension(n: usize, num_pairs: usize) -> usize {
    (2 * num_pairs + 20).min(n).min(MAX_LANCZOS_ITER.max(num_pairs))
}

// ============================================================================
// Dense Solver
// ============================================================================

/// Solve the full dense generalized eigenproblem.
///
/// Returns all eigenpairs, eigenvectors normalized so that vᵀ M v = 1.
pub fn solve_dense(k: &DMatrix<f64>, m: &DMatrix<f64>) -> ReductionResult<Vec<(f64, DVector<f64>)>> {
    let n = k.nrows();
    let Some(chol) = m.clone().cholesky() else {
        return Err(ReductionError::EigenSolverFailed(
            "mass matrix is not positive definite".to_string(),
        ));
    };
    let Some(l_inv) = chol.l().try_inverse() else {
        return Err(ReductionError::EigenSolverFailed(
            "Cholesky factor of mass matrix is not invertible".to_string(),
        ));
    };
    let l_inv_t = l_inv.transpose();
    let a = &l_inv * k * &l_inv_t;
    let a = 0.5 * (&a + a.transpose());

    let eig = SymmetricEigen::new(a);
    let mut pairs = Vec::with_capacity(n);
    for i in 0..n {
        let y = eig.eigenvectors.column(i);
        pairs.push((eig.eigenvalues[i], &l_inv_t * y));
    }
    Ok(pairs)
}

// ============================================================================
// Campbell Diagram
// ============================================================================

/// Eigenfrequencies of M q̈ + Ω G q̇ + K q = 0 over a sweep of rotor speeds.
///
/// The rotor frequency runs from 0 to `terminal_frequency` (Hz) in
/// `frequency_steps` increments. For each speed the first-order state matrix
/// [[0, I], [-M⁻¹K, -Ω M⁻¹G]] is solved with a dense Schur decomposition and
/// the distinct values |Im s| / 2π are kept, ascending, at most
/// `n_eigenfrequencies + 1` of them (the extra one is the rigid body mode 0
/// for free bodies).
///
/// Returns the rotor frequencies in Hz and one frequency list per rotor frequency.
pub fn campbell_frequencies(
    m: &DMatrix<f64>,
    k: &DMatrix<f64>,
    g: &DMatrix<f64>,
    terminal_frequency: f64,
    n_eigenfrequencies: usize,
    frequency_steps: usize,
) -> ReductionResult<(Vec<f64>, Vec<Vec<f64>>)> {
    let n = m.nrows();
    check_dimension("Campbell mass matrix columns", n, m.ncols())?;
    check_dimension("Campbell stiffness matrix rows", n, k.nrows())?;
    check_dimension("Campbell stiffness matrix columns", n, k.ncols())?;
    check_dimension("Campbell gyroscopic matrix rows", n, g.nrows())?;
    check_dimension("Campbell gyroscopic matrix columns", n, g.ncols())?;
    if frequency_steps == 0 {
        return Err(ReductionError::InvalidDimension {
            context: "Campbell frequency steps (at least 1)",
            expected: 1,
            found: 0,
        });
    }

    let Some(chol) = m.clone().cholesky() else {
        return Err(ReductionError::EigenSolverFailed(
            "mass matrix is not positive definite".to_string(),
        ));
    };
    let m_inv_k = chol.solve(k);
    let m_inv_g = chol.solve(g);

    let mut state = DMatrix::<f64>::zeros(2 * n, 2 * n);
    state.view_mut((0, n), (n, n)).fill_with_identity();
    state.view_mut((n, 0), (n, n)).copy_from(&(-m_inv_k));

    let mut rotor_frequencies = Vec::with_capacity(frequency_steps + 1);
    let mut campbell = Vec::with_capacity(frequency_steps + 1);
    for step in 0..=frequency_steps {
        let rotor_frequency = step as f64 * terminal_frequency / frequency_steps as f64;
        let omega = 2.0 * std::f64::consts::PI * rotor_frequency;
        state.view_mut((n, n), (n, n)).copy_from(&(&m_inv_g * (-omega)));

        let mut frequencies: Vec<f64> = state
            .complex_eigenvalues()
            .iter()
            .map(|s| s.im.abs() / (2.0 * std::f64::consts::PI))
            .collect();
        frequencies.sort_by(|a, b| a.total_cmp(b));
        let scale = frequencies.last().copied().unwrap_or(0.0);
        frequencies.dedup_by(|next, kept| (*next - *kept).abs() <= CAMPBELL_UNIQUE_TOL * scale);
        frequencies.truncate(n_eigenfrequencies + 1);

        debug!(rotor_frequency, n_frequencies = frequencies.len(), "Campbell step");
        rotor_frequencies.push(rotor_frequency);
        campbell.push(frequencies);
    }
    Ok((rotor_frequencies, campbell))
}

// ============================================================================
// Sparse Eigenvalue Solver (Shift-Invert Lanczos)
// ============================================================================

/// Lanczos iteration on the operator (K - σM)^(-1) M in the M-inner product.
///
/// The start vector is a fixed sequence, so repeated runs give identical results.
fn lanczos_core<FM, FS>(
    n: usize,
    num_lanczos: usize,
    sigma: f64,
    apply_m: FM,
    solve_shifted: FS,
) -> ReductionResult<Vec<(f64, DVector<f64>)>>
where
    FM: Fn(&DVector<f64>) -> DVector<f64>,
    FS: Fn(&DVector<f64>) -> DVector<f64>,
{
    // Initialize Lanczos vectors
    let mut v_prev = DVector::zeros(n);
    let mut v_curr = DVector::from_fn(n, |i, _| ((i * 7 + 13) % 101) as f64 / 100.0 - 0.5);

    // M-orthonormalize initial vector
    let mv = apply_m(&v_curr);
    let norm = v_curr.dot(&mv).sqrt();
    if !(norm > 1e-14) {
        return Err(ReductionError::EigenSolverFailed(
            "start vector has zero mass norm".to_string(),
        ));
    }
    v_curr /= norm;

    let mut v_matrix = DMatrix::zeros(n, num_lanczos);
    // Cache M*v products to avoid recomputing during reorthogonalization
    let mut mv_matrix = DMatrix::zeros(n, num_lanczos);
    let mut alpha = Vec::with_capacity(num_lanczos);
    let mut beta: Vec<f64> = Vec::with_capacity(num_lanczos);
    let mut theta_scale: f64 = 0.0;

    for j in 0..num_lanczos {
        v_matrix.set_column(j, &v_curr);

        // w = (K - sigma*M)^(-1) * M * v_curr
        let mv_curr = apply_m(&v_curr);
        mv_matrix.set_column(j, &mv_curr);
        let w = solve_shifted(&mv_curr);

        // alpha_j = w^T * M * v_curr
        let alpha_j = w.dot(&mv_curr);
        alpha.push(alpha_j);
        theta_scale = theta_scale.max(alpha_j.abs());

        let mut w_orth = w - alpha_j * &v_curr;
        if j > 0 {
            w_orth -= beta[j - 1] * &v_prev;
        }

        // Full reorthogonalization (two passes) using cached M*v products
        for _ in 0..2 {
            for k in 0..=j {
                let coeff = w_orth.dot(&mv_matrix.column(k));
                w_orth -= coeff * v_matrix.column(k);
            }
        }

        // beta_j = ||w||_M
        let mw_orth = apply_m(&w_orth);
        let beta_j = w_orth.dot(&mw_orth).max(0.0).sqrt();

        if beta_j <= LANCZOS_TOL * theta_scale.max(f64::MIN_POSITIVE) || j + 1 == num_lanczos {
            // Invariant subspace found or Krylov space exhausted
            break;
        }

        beta.push(beta_j);
        v_prev = v_curr;
        v_curr = w_orth / beta_j;
    }

    let m_lanczos = alpha.len();

    // Build tridiagonal matrix T
    let mut t_mat = DMatrix::zeros(m_lanczos, m_lanczos);
    for i in 0..m_lanczos {
        t_mat[(i, i)] = alpha[i];
        if i + 1 < m_lanczos {
            t_mat[(i, i + 1)] = beta[i];
            t_mat[(i + 1, i)] = beta[i];
        }
    }

    let eig = SymmetricEigen::new(t_mat);
    let theta = eig.eigenvalues;
    let s = eig.eigenvectors;
    let basis = v_matrix.columns(0, m_lanczos);

    // Convert theta back to lambda: lambda = sigma + 1/theta
    let mut eigen_pairs = Vec::with_capacity(m_lanczos);
    for i in 0..m_lanczos {
        if theta[i].abs() > 1e-14 * theta_scale.max(f64::MIN_POSITIVE) {
            let lambda = sigma + 1.0 / theta[i];
            let y = &basis * s.column(i);
            eigen_pairs.push((lambda, y));
        }
    }

    if eigen_pairs.is_empty() {
        return Err(ReductionError::EigenSolverFailed(
            "Lanczos iteration produced no Ritz pairs".to_string(),
        ));
    }
    Ok(eigen_pairs)
}

/// Shift-invert Lanczos algorithm for generalized eigenvalue problem K*x = λ*M*x.
///
/// Uses shift-invert transformation: (K - σM)^(-1) * M * x = θ * x
/// where θ = 1/(λ - σ), so eigenvalues near σ become largest.
/// Returns all Ritz pairs of a Krylov space large enough for `num_pairs`.
pub fn lanczos_shift_invert(
    k: &CsrMatrix<f64>,
    m: &CsrMatrix<f64>,
    num_pairs: usize,
    sigma: f64,
) -> ReductionResult<Vec<(f64, DVector<f64>)>> {
    let n = k.nrows();
    let num_lanczos = krylov_dimension(n, num_pairs);
    debug!(n, num_pairs, num_lanczos, sigma, "shift-invert Lanczos");

    let chol = factor_shifted(
        n,
        k.triplet_iter().map(|(i, j, v)| (i, j, *v)),
        m.triplet_iter().map(|(i, j, v)| (i, j, *v)),
        sigma,
    )?;

    lanczos_core(n, num_lanczos, sigma, |x| spmv(m, x), |b| cholesky_solve(&chol, b))
}

// ============================================================================
// Public Entry Points
// ============================================================================

/// Compute the `num_modes` eigenpairs with smallest |λ| after skipping
/// `exclude_rigid_body_modes` pairs.
pub fn compute_eigenmodes(
    k: &CsrMatrix<f64>,
    m: &CsrMatrix<f64>,
    num_modes: usize,
    exclude_rigid_body_modes: usize,
    solver: EigenSolver,
) -> ReductionResult<EigenModes> {
    compute_eigenmodes_full(
        k,
        m,
        num_modes,
        exclude_rigid_body_modes,
        solver,
        SparseBackend::default(),
    )
}

/// Compute eigenmodes with configurable solver and sparse backend.
pub fn compute_eigenmodes_full(
    k: &CsrMatrix<f64>,
    m: &CsrMatrix<f64>,
    num_modes: usize,
    exclude_rigid_body_modes: usize,
    solver: EigenSolver,
    backend: SparseBackend,
) -> ReductionResult<EigenModes> {
    let n = k.nrows();
    check_dimension("stiffness matrix columns", n, k.ncols())?;
    check_dimension("mass matrix rows", n, m.nrows())?;
    check_dimension("mass matrix columns", n, m.ncols())?;

    let num_pairs = num_modes + exclude_rigid_body_modes;
    if num_pairs > n {
        return Err(ReductionError::InvalidDimension {
            context: "requested eigenmodes",
            expected: n,
            found: num_pairs,
        });
    }
    if num_modes == 0 {
        return Ok(EigenModes::empty(n));
    }

    let pairs = if solver.use_sparse(n) {
        let sigma = default_shift(k, m)?;
        match backend {
            SparseBackend::NalgebraSparse => lanczos_shift_invert(k, m, num_pairs, sigma)?,
            #[cfg(feature = "sprs-backend")]
            SparseBackend::Sprs => {
                lanczos_shift_invert_sprs(&csr_to_sprs(k), &csr_to_sprs(m), num_pairs, sigma)?
            }
        }
    } else {
        debug!(n, num_pairs, "dense generalized eigenproblem");
        solve_dense(&csr_to_dense(k), &csr_to_dense(m))?
    };

    let modes = select_modes(pairs, n, num_modes, exclude_rigid_body_modes);
    if modes.len() < num_modes {
        return Err(ReductionError::EigenSolverFailed(format!(
            "requested {num_modes} eigenmodes, found {}",
            modes.len()
        )));
    }
    Ok(modes)
}

// ============================================================================
// SPRS Backend (optional, requires "sprs-backend" feature)
// ============================================================================

#[cfg(feature = "sprs-backend")]
fn csr_to_sprs(a: &CsrMatrix<f64>) -> CsMat<f64> {
    let mut tri = TriMat::new((a.nrows(), a.ncols()));
    for (i, j, v) in a.triplet_iter() {
        tri.add_triplet(i, j, *v);
    }
    tri.to_csr()
}

/// Sparse matrix-vector product using sprs: y = A * x
/// Uses sprs's optimized mul_acc_mat_vec_csr for better performance.
#[cfg(feature = "sprs-backend")]
#[inline(always)]
fn spmv_sprs(a: &CsMat<f64>, x: &DVector<f64>) -> DVector<f64> {
    let n = a.rows();
    let mut y = DVector::zeros(n);
    sprs::prod::mul_acc_mat_vec_csr(a.view(), x.as_slice(), y.as_mut_slice());
    y
}

/// Shift-invert Lanczos using sprs matrices for the mass products.
#[cfg(feature = "sprs-backend")]
pub fn lanczos_shift_invert_sprs(
    k: &CsMat<f64>,
    m: &CsMat<f64>,
    num_pairs: usize,
    sigma: f64,
) -> ReductionResult<Vec<(f64, DVector<f64>)>> {
    let n = k.rows();
    let num_lanczos = krylov_dimension(n, num_pairs);
    debug!(n, num_pairs, num_lanczos, sigma, "shift-invert Lanczos (sprs)");

    let chol = factor_shifted(
        n,
        k.iter().map(|(v, (i, j))| (i, j, *v)),
        m.iter().map(|(v, (i, j))| (i, j, *v)),
        sigma,
    )?;

    lanczos_core(n, num_lanczos, sigma, |x| spmv_sprs(m, x), |b| cholesky_solve(&chol, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseMatrixStore;
    use crate::types::LAMBDA_TOL;

    const REL_TOL: f64 = 1e-6;

    /// Fixed-free chain of 3 unit masses with springs of stiffness `k` along x.
    fn chain_1d(k: f64) -> (CsrMatrix<f64>, CsrMatrix<f64>) {
        let kt = [
            (0, 0, 2.0 * k),
            (0, 1, -k),
            (1, 0, -k),
            (1, 1, 2.0 * k),
            (1, 2, -k),
            (2, 1, -k),
            (2, 2, k),
        ];
        let mt = [(0, 0, 1.0), (1, 1, 1.0), (2, 2, 1.0)];
        (
            SparseMatrixStore::from_triplets(3, 3, kt).unwrap().to_csr(),
            SparseMatrixStore::from_triplets(3, 3, mt).unwrap().to_csr(),
        )
    }

    #[test]
    fn dense_solver_matches_analytic_chain() {
        let (k, m) = chain_1d(1.0);
        let modes = compute_eigenmodes(&k, &m, 3, 0, EigenSolver::Dense).unwrap();
        for (j, lambda) in modes.eigenvalues.iter().enumerate() {
            let expected =
                2.0 - 2.0 * ((2 * j + 1) as f64 * std::f64::consts::PI / 7.0).cos();
            assert!((lambda - expected).abs() < 1e-12 * expected.max(1.0));
        }
        for pair in modes.eigenvalues.windows(2) {
            assert!(pair[0] <= pair[1] + LAMBDA_TOL);
        }
    }

    #[test]
    fn eigenvectors_are_mass_normalized() {
        let (k, _) = chain_1d(3.0);
        let m = SparseMatrixStore::from_triplets(3, 3, [(0, 0, 2.0), (1, 1, 1.0), (2, 2, 0.5)])
            .unwrap()
            .to_csr();
        for solver in [EigenSolver::Dense, EigenSolver::Sparse] {
            let modes = compute_eigenmodes(&k, &m, 3, 0, solver).unwrap();
            let md = csr_to_dense(&m);
            let gram = modes.eigenvectors.transpose() * &md * &modes.eigenvectors;
            for i in 0..3 {
                for j in 0..3 {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!((gram[(i, j)] - expected).abs() < 1e-8, "{solver:?} gram {gram}");
                }
            }
        }
    }

    #[test]
    fn rigid_body_modes_are_excluded() {
        // Free-free chain: one zero eigenvalue
        let kt = [(0, 0, 1.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 1.0)];
        let k = SparseMatrixStore::from_triplets(2, 2, kt).unwrap().to_csr();
        let m = SparseMatrixStore::from_triplets(2, 2, [(0, 0, 1.0), (1, 1, 1.0)])
            .unwrap()
            .to_csr();

        for solver in [EigenSolver::Dense, EigenSolver::Sparse] {
            let modes = compute_eigenmodes(&k, &m, 1, 1, solver).unwrap();
            assert_eq!(modes.len(), 1);
            assert!((modes.eigenvalues[0] - 2.0).abs() < REL_TOL * 2.0, "{solver:?}");
        }
    }

    #[test]
    fn sparse_solver_is_deterministic() {
        let (k, m) = chain_1d(5.0);
        let a = compute_eigenmodes(&k, &m, 2, 0, EigenSolver::Sparse).unwrap();
        let b = compute_eigenmodes(&k, &m, 2, 0, EigenSolver::Sparse).unwrap();
        assert_eq!(a.eigenvalues, b.eigenvalues);
        assert_eq!(a.eigenvectors, b.eigenvectors);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let (k, _) = chain_1d(1.0);
        let m = SparseMatrixStore::from_triplets(2, 2, [(0, 0, 1.0), (1, 1, 1.0)])
            .unwrap()
            .to_csr();
        assert!(matches!(
            compute_eigenmodes(&k, &m, 1, 0, EigenSolver::Dense),
            Err(ReductionError::InvalidDimension { .. })
        ));

        let (k, m) = chain_1d(1.0);
        assert!(matches!(
            compute_eigenmodes(&k, &m, 3, 1, EigenSolver::Dense),
            Err(ReductionError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn frequencies_in_hz() {
        let two_pi = 2.0 * std::f64::consts::PI;
        let f = eigen_frequencies_hz(&[two_pi * two_pi, 0.0]);
        assert!((f[0] - 1.0).abs() < 1e-12);
        assert_eq!(f[1], 0.0);
    }

    #[cfg(feature = "sprs-backend")]
    #[test]
    fn sprs_and_nalgebra_sparse_agree() {
        let (k, m) = chain_1d(2.0);
        let a = compute_eigenmodes_full(&k, &m, 2, 0, EigenSolver::Sparse, SparseBackend::NalgebraSparse)
            .unwrap();
        let b = compute_eigenmodes_full(&k, &m, 2, 0, EigenSolver::Sparse, SparseBackend::Sprs)
            .unwrap();
        for (x, y) in a.eigenvalues.iter().zip(b.eigenvalues.iter()) {
            assert!((x - y).abs() < REL_TOL * x);
        }
    }
}
