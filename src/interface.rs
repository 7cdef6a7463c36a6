//! Rigid (RBE2-like) interface kinematics.
//!
//! Maps 3 translations and 3 small rotations of an interface reference point
//! to the displacements of the interface nodes.

use nalgebra::{DMatrix, Vector3};

use crate::error::{ReductionError, ReductionResult};
use crate::types::{COLLINEAR_TOL, DOF_PER_NODE, RIGID_INTERFACE_DOF};

/// Rigid-motion projector T (3·nNodes × 6) of one interface.
#[derive(Debug, Clone)]
pub struct RigidInterfaceProjector {
    interface_index: usize,
    reference_point: Vector3<f64>,
    matrix: DMatrix<f64>,
}

impl RigidInterfaceProjector {
    /// Build the projector from the interface node positions.
    ///
    /// The reference point is the arithmetic mean of the positions. Columns
    /// 0..3 are unit translations, columns 3..6 unit rotations about the
    /// reference point: `skew(e_k) * (p_j - reference)`.
    pub fn new(interface_index: usize, positions: &[Vector3<f64>]) -> ReductionResult<Self> {
        let count = positions.len();
        if count < 3 || is_collinear(positions) {
            return Err(ReductionError::InsufficientInterfaceNodes {
                interface: interface_index,
                count,
            });
        }

        let reference_point = positions.iter().sum::<Vector3<f64>>() / count as f64;

        let mut matrix = DMatrix::zeros(DOF_PER_NODE * count, RIGID_INTERFACE_DOF);
        for (j, p) in positions.iter().enumerate() {
            let row = DOF_PER_NODE * j;
            let r = p - reference_point;
            for k in 0..3 {
                matrix[(row + k, k)] = 1.0;
                let rotated = Vector3::ith(k, 1.0).cross(&r);
                matrix.fixed_view_mut::<3, 1>(row, 3 + k).copy_from(&rotated);
            }
        }

        Ok(Self {
            interface_index,
            reference_point,
            matrix,
        })
    }

    pub fn interface_index(&self) -> usize {
        self.interface_index
    }

    pub fn reference_point(&self) -> &Vector3<f64> {
        &self.reference_point
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }
}

/// True if all points lie (within a relative tolerance) on one line.
fn is_collinear(positions: &[Vector3<f64>]) -> bool {
    let origin = positions[0];
    let Some(axis) = positions
        .iter()
        .map(|p| p - origin)
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))
    else {
        return true;
    };
    let length_sq = axis.norm_squared();
    if length_sq == 0.0 {
        return true;
    }
    positions
        .iter()
        .all(|p| axis.cross(&(p - origin)).norm() <= COLLINEAR_TOL * length_sq)
}
