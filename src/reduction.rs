//! Projection of the full model onto a mode basis.
//!
//! Builds the reduced mass/stiffness/damping matrices and the constant
//! inertia tensors of the reduced floating frame of reference formulation.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cms::ModeBasis;
use crate::error::{check_dimension, ReductionResult};
use crate::rotation::skew;
use crate::sparse::SparseMatrixStore;
use crate::types::{DOF_PER_NODE, ROUND_MATRIX_TOL};

/// Rayleigh damping factors: Dr = α·Mr + β·Kr.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RayleighDamping {
    /// Mass proportional factor α
    pub mass_proportional: f64,
    /// Stiffness proportional factor β
    pub stiffness_proportional: f64,
}

impl RayleighDamping {
    pub fn new(mass_proportional: f64, stiffness_proportional: f64) -> Self {
        Self {
            mass_proportional,
            stiffness_proportional,
        }
    }
}

/// Reduced model: reduced matrices plus the constant FFRF tensors.
///
/// Naming follows the reduced FFRF literature: Ψ is the mode basis, Φt the
/// stacked 3×3 identities, x̄ the reference positions and a tilde denotes
/// the node-wise stacked skew matrix (per column for Ψ̃).
#[derive(Debug, Clone)]
pub struct ReducedModel {
    n_nodes: usize,
    reference_positions: Vec<Vector3<f64>>,
    mode_basis: ModeBasis,
    mass_reduced: DMatrix<f64>,
    stiffness_reduced: DMatrix<f64>,
    damping_reduced: DMatrix<f64>,
    pub(crate) phit: DMatrix<f64>,
    pub(crate) phit_t_m: Matrix3xX<f64>,
    pub(crate) x_ref: DVector<f64>,
    pub(crate) x_ref_tilde: DMatrix<f64>,
    pub(crate) mtt: Matrix3<f64>,
    pub(crate) total_mass: f64,
    pub(crate) center_of_mass: Vector3<f64>,
    pub(crate) inertia_local: Matrix3<f64>,
    pub(crate) psi_tilde: DMatrix<f64>,
    pub(crate) m_psi_tilde_psi: DMatrix<f64>,
    pub(crate) m_psi_tilde_psi_tilde: DMatrix<f64>,
    pub(crate) m_phit_t_psi: Matrix3xX<f64>,
    pub(crate) m_phit_t_psi_tilde: Matrix3xX<f64>,
    pub(crate) m_x_ref_tilde_psi: Matrix3xX<f64>,
    pub(crate) m_x_ref_tilde_psi_tilde: Matrix3xX<f64>,
}

/// Node-wise stacked skew matrices of a 3n vector: (3n × 3).
pub fn stacked_skew(v: &[f64]) -> DMatrix<f64> {
    let n_nodes = v.len() / DOF_PER_NODE;
    let mut out = DMatrix::zeros(DOF_PER_NODE * n_nodes, 3);
    for i in 0..n_nodes {
        let p = Vector3::new(v[3 * i], v[3 * i + 1], v[3 * i + 2]);
        out.fixed_view_mut::<3, 3>(3 * i, 0).copy_from(&skew(&p));
    }
    out
}

/// Column-wise stacked skew matrices of a (3n × m) matrix: (3n × 3m).
pub fn stacked_skew_columns(basis: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(basis.nrows(), 3 * basis.ncols());
    for (j, column) in basis.column_iter().enumerate() {
        let block = stacked_skew(column.as_slice());
        out.view_mut((0, 3 * j), (block.nrows(), 3)).copy_from(&block);
    }
    out
}

/// Zero all entries with |a_ij| < tol·max|a|.
pub fn round_matrix(matrix: &mut DMatrix<f64>, relative_tolerance: f64) {
    let threshold = relative_tolerance * matrix.amax();
    for value in matrix.iter_mut() {
        if value.abs() < threshold {
            *value = 0.0;
        }
    }
}

fn to_rows3(m: &DMatrix<f64>) -> Matrix3xX<f64> {
    Matrix3xX::from_fn(m.ncols(), |i, j| m[(i, j)])
}

fn to_matrix3(m: &DMatrix<f64>) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| m[(i, j)])
}

impl ReducedModel {
    /// Project `mass` and `stiffness` onto `mode_basis`.
    ///
    /// All sizes must equal 3·positions.len().
    pub fn new(
        positions: &[Vector3<f64>],
        mass: &SparseMatrixStore,
        stiffness: &SparseMatrixStore,
        mode_basis: &ModeBasis,
        damping: RayleighDamping,
    ) -> ReductionResult<Self> {
        let n_nodes = positions.len();
        let n = DOF_PER_NODE * n_nodes;
        check_dimension("mass matrix rows", n, mass.nrows())?;
        check_dimension("mass matrix columns", n, mass.ncols())?;
        check_dimension("stiffness matrix rows", n, stiffness.nrows())?;
        check_dimension("stiffness matrix columns", n, stiffness.ncols())?;
        check_dimension("mode basis rows", n, mode_basis.n_dofs())?;

        let psi = &mode_basis.matrix;
        let n_modes = psi.ncols();
        info!(n_nodes, n_modes, "building reduced model");

        let x_ref = DVector::from_iterator(n, positions.iter().flat_map(|p| p.iter().copied()));
        let x_ref_tilde = stacked_skew(x_ref.as_slice());
        let psi_tilde = stacked_skew_columns(psi);
        let mut phit = DMatrix::zeros(n, 3);
        for i in 0..n_nodes {
            phit.fixed_view_mut::<3, 3>(3 * i, 0).copy_from(&Matrix3::identity());
        }

        // apply M once to [Ψ | Ψ̃ | Φt | x̃]
        let n_cols = n_modes + 3 * n_modes + 3 + 3;
        let mut stacked = DMatrix::zeros(n, n_cols);
        stacked.columns_mut(0, n_modes).copy_from(psi);
        stacked.columns_mut(n_modes, 3 * n_modes).copy_from(&psi_tilde);
        stacked.columns_mut(4 * n_modes, 3).copy_from(&phit);
        stacked.columns_mut(4 * n_modes + 3, 3).copy_from(&x_ref_tilde);

        let m_csr = mass.to_csr();
        let m_stacked: DMatrix<f64> = &m_csr * &stacked;
        let m_psi = m_stacked.columns(0, n_modes);
        let m_psi_tilde = m_stacked.columns(n_modes, 3 * n_modes);
        let m_phit = m_stacked.columns(4 * n_modes, 3);
        let m_x_ref_tilde = m_stacked.columns(4 * n_modes + 3, 3);

        let mut mass_reduced = psi.transpose() * m_psi;
        let k_psi: DMatrix<f64> = &stiffness.to_csr() * psi;
        let mut stiffness_reduced = psi.transpose() * k_psi;
        round_matrix(&mut mass_reduced, ROUND_MATRIX_TOL);
        round_matrix(&mut stiffness_reduced, ROUND_MATRIX_TOL);
        let damping_reduced = &mass_reduced * damping.mass_proportional
            + &stiffness_reduced * damping.stiffness_proportional;

        let phit_t_m = to_rows3(&m_phit.transpose());
        let mtt = to_matrix3(&(phit.transpose() * m_phit));
        let total_mass = mtt[(0, 0)];
        let first_moment: Vector3<f64> = &phit_t_m * &x_ref;
        let center_of_mass = if total_mass != 0.0 {
            first_moment / total_mass
        } else {
            Vector3::zeros()
        };
        let inertia_local = to_matrix3(&(x_ref_tilde.transpose() * m_x_ref_tilde));

        let m_psi_tilde_psi = psi_tilde.transpose() * m_psi;
        let m_psi_tilde_psi_tilde = psi_tilde.transpose() * m_psi_tilde;
        let m_phit_t_psi = to_rows3(&(phit.transpose() * m_psi));
        let m_phit_t_psi_tilde = to_rows3(&(phit.transpose() * m_psi_tilde));
        let m_x_ref_tilde_psi = to_rows3(&(x_ref_tilde.transpose() * m_psi));
        let m_x_ref_tilde_psi_tilde = to_rows3(&(x_ref_tilde.transpose() * m_psi_tilde));

        debug!(total_mass, ?center_of_mass, "reduced model tensors");

        Ok(Self {
            n_nodes,
            reference_positions: positions.to_vec(),
            mode_basis: mode_basis.clone(),
            mass_reduced,
            stiffness_reduced,
            damping_reduced,
            phit,
            phit_t_m,
            x_ref,
            x_ref_tilde,
            mtt,
            total_mass,
            center_of_mass,
            inertia_local,
            psi_tilde,
            m_psi_tilde_psi,
            m_psi_tilde_psi_tilde,
            m_phit_t_psi,
            m_phit_t_psi_tilde,
            m_x_ref_tilde_psi,
            m_x_ref_tilde_psi_tilde,
        })
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn n_modes(&self) -> usize {
        self.mode_basis.n_modes()
    }

    pub fn reference_positions(&self) -> &[Vector3<f64>] {
        &self.reference_positions
    }

    pub fn mode_basis(&self) -> &ModeBasis {
        &self.mode_basis
    }

    /// Ψᵀ M Ψ (rounded).
    pub fn mass_reduced(&self) -> &DMatrix<f64> {
        &self.mass_reduced
    }

    /// Ψᵀ K Ψ (rounded).
    pub fn stiffness_reduced(&self) -> &DMatrix<f64> {
        &self.stiffness_reduced
    }

    pub fn damping_reduced(&self) -> &DMatrix<f64> {
        &self.damping_reduced
    }

    pub fn total_mass(&self) -> f64 {
        self.total_mass
    }

    /// Center of mass of the undeformed body in the local frame.
    pub fn center_of_mass(&self) -> &Vector3<f64> {
        &self.center_of_mass
    }

    /// x̃ᵀ M x̃: inertia tensor of the undeformed body about the local origin.
    pub fn inertia_local(&self) -> &Matrix3<f64> {
        &self.inertia_local
    }

    pub fn translational_mass(&self) -> &Matrix3<f64> {
        &self.mtt
    }

    pub fn phit(&self) -> &DMatrix<f64> {
        &self.phit
    }

    pub fn phit_t_m(&self) -> &Matrix3xX<f64> {
        &self.phit_t_m
    }

    pub fn x_ref(&self) -> &DVector<f64> {
        &self.x_ref
    }

    pub fn x_ref_tilde(&self) -> &DMatrix<f64> {
        &self.x_ref_tilde
    }

    pub fn psi_tilde(&self) -> &DMatrix<f64> {
        &self.psi_tilde
    }

    pub fn m_psi_tilde_psi(&self) -> &DMatrix<f64> {
        &self.m_psi_tilde_psi
    }

    pub fn m_psi_tilde_psi_tilde(&self) -> &DMatrix<f64> {
        &self.m_psi_tilde_psi_tilde
    }

    pub fn m_phit_t_psi(&self) -> &Matrix3xX<f64> {
        &self.m_phit_t_psi
    }

    pub fn m_phit_t_psi_tilde(&self) -> &Matrix3xX<f64> {
        &self.m_phit_t_psi_tilde
    }

    pub fn m_x_ref_tilde_psi(&self) -> &Matrix3xX<f64> {
        &self.m_x_ref_tilde_psi
    }

    pub fn m_x_ref_tilde_psi_tilde(&self) -> &Matrix3xX<f64> {
        &self.m_x_ref_tilde_psi_tilde
    }
}
