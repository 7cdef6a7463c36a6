//! Reduced floating frame of reference (FFRF) dynamics.
//!
//! Generalized coordinates are ordered [translation(3), rotation(nRot),
//! modal(nModes)]. Mass matrix and force vector derive from the same
//! Lagrangian; the force vector contains quadratic velocity terms, elastic
//! and damping forces and gravity. Nothing here validates sizes: NaN/Inf
//! and mismatched states propagate.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Vector3};

use crate::error::{check_dimension, ReductionError, ReductionResult};
use crate::reduction::ReducedModel;
use crate::rotation::{skew, RotationParameterization, RotationState};

/// Rotation state and modal coordinates of the reduced body.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeState {
    pub rotation: RotationState,
    /// Modal coordinates q (ζ)
    pub modal: DVector<f64>,
    /// Modal velocities q̇
    pub modal_t: DVector<f64>,
}

impl RuntimeState {
    pub fn new(rotation: RotationState, modal: DVector<f64>, modal_t: DVector<f64>) -> Self {
        Self {
            rotation,
            modal,
            modal_t,
        }
    }

    /// Undeformed body at rest with identity rotation.
    pub fn at_rest(parameterization: RotationParameterization, n_modes: usize) -> Self {
        Self::new(
            RotationState::identity(parameterization),
            DVector::zeros(n_modes),
            DVector::zeros(n_modes),
        )
    }

    /// Split full coordinate and velocity vectors [translation, rotation, modal].
    pub fn from_coordinates(
        parameterization: RotationParameterization,
        coordinates: &[f64],
        velocities: &[f64],
    ) -> ReductionResult<Self> {
        let n_rot = parameterization.n_params();
        let split = 3 + n_rot;
        check_dimension("generalized velocities", coordinates.len(), velocities.len())?;
        if coordinates.len() < split {
            return Err(ReductionError::InvalidDimension {
                context: "generalized coordinates",
                expected: split,
                found: coordinates.len(),
            });
        }
        let rotation = RotationState::from_coordinates(
            parameterization,
            &coordinates[3..split],
            &velocities[3..split],
        )?;
        Ok(Self::new(
            rotation,
            DVector::from_column_slice(&coordinates[split..]),
            DVector::from_column_slice(&velocities[split..]),
        ))
    }
}

/// Size of the reduced FFRF coordinate vector.
pub fn coordinate_count(parameterization: RotationParameterization, n_modes: usize) -> usize {
    3 + parameterization.n_params() + n_modes
}

/// X·ζ = Σ_i q_i X[:, 3i..3i+3] for a 3 × 3m tensor X.
fn contract_right(x: &Matrix3xX<f64>, q: &DVector<f64>) -> Matrix3<f64> {
    let mut out = Matrix3::zeros();
    for (i, &qi) in q.iter().enumerate() {
        out += x.fixed_view::<3, 3>(0, 3 * i) * qi;
    }
    out
}

/// ζᵀ·Y = Σ_i q_i Y[3i..3i+3, :] for a 3m × k tensor Y.
fn contract_left(y: &DMatrix<f64>, q: &DVector<f64>) -> Matrix3xX<f64> {
    let mut out = Matrix3xX::zeros(y.ncols());
    for (i, &qi) in q.iter().enumerate() {
        out += y.fixed_rows::<3>(3 * i) * qi;
    }
    out
}

/// ζ·w = kron(q, w).
fn kron_vector(q: &DVector<f64>, w: &Vector3<f64>) -> DVector<f64> {
    DVector::from_fn(3 * q.len(), |k, _| q[k / 3] * w[k % 3])
}

/// Configuration dependent blocks shared by mass matrix and force vector.
struct Kinematics {
    a: Matrix3<f64>,
    g: Matrix3xX<f64>,
    /// m·χ̃ + mΦtᵀΨ̃·ζ
    coupling: Matrix3<f64>,
    /// Θ + mx̃ᵀΨ̃·ζ + ζᵀ·(mx̃ᵀΨ̃)ᵀ + ζᵀ·mΨ̃ᵀΨ̃·ζ
    inertia: Matrix3<f64>,
    /// ζᵀ·mΨ̃ᵀΨ̃ (3 × 3m)
    zeta_psi_tilde_psi_tilde: Matrix3xX<f64>,
}

impl Kinematics {
    fn new(model: &ReducedModel, state: &RuntimeState) -> Self {
        let q = &state.modal;
        let a = state.rotation.rotation_matrix();
        let g = state.rotation.g_local();

        let coupling = skew(&model.center_of_mass) * model.total_mass
            + contract_right(&model.m_phit_t_psi_tilde, q);

        let x_psi_zeta = contract_right(&model.m_x_ref_tilde_psi_tilde, q);
        let zeta_psi_tilde_psi_tilde = contract_left(&model.m_psi_tilde_psi_tilde, q);
        let inertia = model.inertia_local
            + x_psi_zeta
            + x_psi_zeta.transpose()
            + contract_right(&zeta_psi_tilde_psi_tilde, q);

        Self {
            a,
            g,
            coupling,
            inertia,
            zeta_psi_tilde_psi_tilde,
        }
    }
}

fn fill_constant_blocks(model: &ReducedModel, n_rot: usize, out: &mut DMatrix<f64>) {
    let n_modes = model.n_modes();
    let rigid = 3 + n_rot;
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&model.mtt);
    out.view_mut((rigid, rigid), (n_modes, n_modes))
        .copy_from(model.mass_reduced());
}

fn fill_variable_blocks(model: &ReducedModel, state: &RuntimeState, out: &mut DMatrix<f64>) {
    let n_rot = state.rotation.n_params();
    let n_modes = model.n_modes();
    let rigid = 3 + n_rot;
    let kin = Kinematics::new(model, state);
    let g_t = kin.g.transpose();

    let mtr = -(kin.a * kin.coupling) * &kin.g;
    out.view_mut((0, 3), (3, n_rot)).copy_from(&mtr);
    out.view_mut((3, 0), (n_rot, 3)).copy_from(&mtr.transpose());

    let mtf = kin.a * &model.m_phit_t_psi;
    out.view_mut((0, rigid), (3, n_modes)).copy_from(&mtf);
    out.view_mut((rigid, 0), (n_modes, 3)).copy_from(&mtf.transpose());

    let zeta_psi_tilde_psi = contract_left(&model.m_psi_tilde_psi, &state.modal);
    let mrf = -(&g_t * (&model.m_x_ref_tilde_psi + zeta_psi_tilde_psi));
    out.view_mut((3, rigid), (n_rot, n_modes)).copy_from(&mrf);
    out.view_mut((rigid, 3), (n_modes, n_rot)).copy_from(&mrf.transpose());

    let mrr = &g_t * kin.inertia * &kin.g;
    out.view_mut((3, 3), (n_rot, n_rot)).copy_from(&mrr);
}

/// Configuration dependent mass matrix of size 3 + nRot + nModes.
pub fn compute_mass_matrix(model: &ReducedModel, state: &RuntimeState) -> DMatrix<f64> {
    let n_rot = state.rotation.n_params();
    let n = 3 + n_rot + model.n_modes();
    let mut out = DMatrix::zeros(n, n);
    fill_constant_blocks(model, n_rot, &mut out);
    fill_variable_blocks(model, state, &mut out);
    out
}

/// Generalized force vector: quadratic velocity, elastic, damping and gravity
/// terms (`gravity` in global coordinates).
///
/// The gravity torque acts on the deformed first moment mχ + mPhitTPsi·q, not
/// on the undeformed mχ alone.
pub fn compute_force_vector(model: &ReducedModel, state: &RuntimeState, gravity: &Vector3<f64>) -> DVector<f64> {
    let n_rot = state.rotation.n_params();
    let n_modes = model.n_modes();
    let rigid = 3 + n_rot;
    let q = &state.modal;
    let q_t = &state.modal_t;

    let kin = Kinematics::new(model, state);
    let g_t = kin.g.transpose();
    let omega = state.rotation.angular_velocity_local();
    let omega_tilde = skew(&omega);

    let zeta_t_omega = kron_vector(q_t, &omega);

    // translation
    let mut f_t = kin.a * omega_tilde * kin.coupling * omega
        + kin.a * (&model.m_phit_t_psi_tilde * &zeta_t_omega) * 2.0;

    // rotation
    let coriolis = contract_right(&model.m_x_ref_tilde_psi_tilde, q_t)
        + contract_right(&kin.zeta_psi_tilde_psi_tilde, q_t);
    let mut f_r = -(&g_t * (omega_tilde * kin.inertia * omega)) - (&g_t * (coriolis * omega)) * 2.0;

    // modal
    let centrifugal: DVector<f64> =
        model.m_x_ref_tilde_psi_tilde.transpose() * omega + &model.m_psi_tilde_psi_tilde * kron_vector(q, &omega);
    let mut f_f = DVector::from_fn(n_modes, |i, _| {
        omega.dot(&centrifugal.fixed_rows::<3>(3 * i))
    });
    f_f += model.m_psi_tilde_psi.transpose() * &zeta_t_omega * 2.0;
    f_f -= model.stiffness_reduced() * q;
    f_f -= model.damping_reduced() * q_t;

    if let Some(g_t_rates) = state.rotation.g_local_t_rates() {
        f_t += kin.a * kin.coupling * g_t_rates;
        f_r -= &g_t * (kin.inertia * g_t_rates);
        f_f += model.m_x_ref_tilde_psi.transpose() * g_t_rates
            + model.m_psi_tilde_psi.transpose() * kron_vector(q, &g_t_rates);
    }

    // gravity, using the first moment of the deformed body
    let gravity_local = kin.a.transpose() * gravity;
    let first_moment = model.center_of_mass * model.total_mass + &model.m_phit_t_psi * q;
    f_t += gravity * model.total_mass;
    f_r += &g_t * (skew(&first_moment) * gravity_local);
    f_f += model.m_phit_t_psi.transpose() * gravity_local;

    let mut force = DVector::zeros(rigid + n_modes);
    force.fixed_rows_mut::<3>(0).copy_from(&f_t);
    force.rows_mut(3, n_rot).copy_from(&f_r);
    force.rows_mut(rigid, n_modes).copy_from(&f_f);
    force
}

/// Mass matrix and force evaluation with a preallocated mass matrix buffer.
///
/// Constant blocks (Mtt, Mr) are written once at construction.
#[derive(Debug, Clone)]
pub struct FfrfEvaluator<'a> {
    model: &'a ReducedModel,
    parameterization: RotationParameterization,
    gravity: Vector3<f64>,
    mass_matrix: DMatrix<f64>,
}

impl<'a> FfrfEvaluator<'a> {
    pub fn new(model: &'a ReducedModel, parameterization: RotationParameterization, gravity: Vector3<f64>) -> Self {
        let n = coordinate_count(parameterization, model.n_modes());
        let mut mass_matrix = DMatrix::zeros(n, n);
        fill_constant_blocks(model, parameterization.n_params(), &mut mass_matrix);
        Self {
            model,
            parameterization,
            gravity,
            mass_matrix,
        }
    }

    pub fn model(&self) -> &ReducedModel {
        self.model
    }

    pub fn parameterization(&self) -> RotationParameterization {
        self.parameterization
    }

    pub fn gravity(&self) -> &Vector3<f64> {
        &self.gravity
    }

    pub fn coordinate_count(&self) -> usize {
        self.mass_matrix.nrows()
    }

    /// Update the configuration dependent blocks and return the mass matrix.
    pub fn compute_mass_matrix(&mut self, state: &RuntimeState) -> &DMatrix<f64> {
        debug_assert_eq!(state.rotation.parameterization(), self.parameterization);
        fill_variable_blocks(self.model, state, &mut self.mass_matrix);
        &self.mass_matrix
    }

    /// Force vector at time `_time`; the reduced body has no explicit time dependence.
    pub fn compute_force_vector(&self, state: &RuntimeState, _time: f64) -> DVector<f64> {
        compute_force_vector(self.model, state, &self.gravity)
    }
}
