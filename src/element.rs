//! Linear solid finite elements (Hex8, Tet4) and isotropic material.
//!
//! This module provides shape functions, strain-displacement operators,
//! element matrices and nodal strain recovery. Strain vectors use Voigt order
//! (xx, yy, zz, yz, xz, xy) with engineering shear strains.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::types::{
    Matrix12x12, Matrix24x24, Matrix3x24, Matrix3x8, Matrix6, Matrix6x12, Matrix6x24, NodeCoords,
    GAUSS_G, MIN_DET_J,
};

pub type Matrix3x4 = SMatrix<f64, 3, 4>;
pub type TetCoords = SMatrix<f64, 4, 3>;

/// Natural coordinates of the Hex8 corner nodes (same ordering as the shape functions).
pub const HEX8_CORNERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Linear elastic isotropic (Kirchhoff) material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub youngs_modulus: f64,
    pub poissons_ratio: f64,
    pub density: f64,
}

impl Material {
    pub fn new(youngs_modulus: f64, poissons_ratio: f64, density: f64) -> Self {
        Self {
            youngs_modulus,
            poissons_ratio,
            density,
        }
    }

    pub fn elasticity_matrix(&self) -> Matrix6 {
        elasticity_matrix_3d(self.youngs_modulus, self.poissons_ratio)
    }

    /// Stress vector from a Voigt strain vector.
    pub fn strain_to_stress(&self, strain: &Vector6<f64>) -> Vector6<f64> {
        self.elasticity_matrix() * strain
    }
}

impl Default for Material {
    /// Unit modulus, zero Poisson ratio, unit density.
    fn default() -> Self {
        Self::new(1.0, 0.0, 1.0)
    }
}

/// Return 2×2×2 Gauss points and weights.
pub fn gauss_points_3d() -> ([Vector3<f64>; 8], SVector<f64, 8>) {
    let points = [
        Vector3::new(-GAUSS_G, -GAUSS_G, -GAUSS_G),
        Vector3::new(GAUSS_G, -GAUSS_G, -GAUSS_G),
        Vector3::new(GAUSS_G, GAUSS_G, -GAUSS_G),
        Vector3::new(-GAUSS_G, GAUSS_G, -GAUSS_G),
        Vector3::new(-GAUSS_G, -GAUSS_G, GAUSS_G),
        Vector3::new(GAUSS_G, -GAUSS_G, GAUSS_G),
        Vector3::new(GAUSS_G, GAUSS_G, GAUSS_G),
        Vector3::new(-GAUSS_G, GAUSS_G, GAUSS_G),
    ];
    let weights = SVector::<f64, 8>::from_element(1.0);
    (points, weights)
}

/// Hex8 shape functions at (xi, eta, zeta).
pub fn shape_functions_hex8(xi: f64, eta: f64, zeta: f64) -> SVector<f64, 8> {
    SVector::<f64, 8>::from_row_slice(&[
        (1.0 - xi) * (1.0 - eta) * (1.0 - zeta),
        (1.0 + xi) * (1.0 - eta) * (1.0 - zeta),
        (1.0 + xi) * (1.0 + eta) * (1.0 - zeta),
        (1.0 - xi) * (1.0 + eta) * (1.0 - zeta),
        (1.0 - xi) * (1.0 - eta) * (1.0 + zeta),
        (1.0 + xi) * (1.0 - eta) * (1.0 + zeta),
        (1.0 + xi) * (1.0 + eta) * (1.0 + zeta),
        (1.0 - xi) * (1.0 + eta) * (1.0 + zeta),
    ]) * 0.125
}

/// Shape function derivatives w.r.t. natural coordinates.
pub fn shape_function_derivatives_hex8(xi: f64, eta: f64, zeta: f64) -> Matrix3x8 {
    let mut d_n = Matrix3x8::zeros();

    for (i, corner) in HEX8_CORNERS.iter().enumerate() {
        let (a, b, c) = (corner[0], corner[1], corner[2]);
        d_n[(0, i)] = 0.125 * a * (1.0 + b * eta) * (1.0 + c * zeta);
        d_n[(1, i)] = 0.125 * b * (1.0 + a * xi) * (1.0 + c * zeta);
        d_n[(2, i)] = 0.125 * c * (1.0 + a * xi) * (1.0 + b * eta);
    }

    d_n
}

/// Constant natural-coordinate derivatives of the Tet4 shape functions
/// N = (1 - ξ - η - ζ, ξ, η, ζ).
pub fn shape_function_derivatives_tet4() -> Matrix3x4 {
    Matrix3x4::new(
        -1.0, 1.0, 0.0, 0.0, //
        -1.0, 0.0, 1.0, 0.0, //
        -1.0, 0.0, 0.0, 1.0,
    )
}

/// 3D isotropic elasticity matrix (6×6).
pub fn elasticity_matrix_3d(e: f64, nu: f64) -> Matrix6 {
    let factor = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let mut d = Matrix6::zeros();

    for i in 0..3 {
        for j in 0..3 {
            d[(i, j)] = if i == j { factor * (1.0 - nu) } else { factor * nu };
        }
    }

    let shear = factor * (1.0 - 2.0 * nu) / 2.0;
    d[(3, 3)] = shear;
    d[(4, 4)] = shear;
    d[(5, 5)] = shear;

    d
}

/// Strain-displacement operator from physical shape function gradients.
///
/// `M` must equal `3 * N`.
pub fn strain_operator<const N: usize, const M: usize>(
    d_n_phys: &SMatrix<f64, 3, N>,
) -> SMatrix<f64, 6, M> {
    debug_assert_eq!(M, 3 * N);
    let mut b = SMatrix::<f64, 6, M>::zeros();
    for i in 0..N {
        let col = 3 * i;
        let dndx = d_n_phys[(0, i)];
        let dndy = d_n_phys[(1, i)];
        let dndz = d_n_phys[(2, i)];

        b[(0, col)] = dndx;
        b[(1, col + 1)] = dndy;
        b[(2, col + 2)] = dndz;

        // yz
        b[(3, col + 1)] = dndz;
        b[(3, col + 2)] = dndy;
        // xz
        b[(4, col)] = dndz;
        b[(4, col + 2)] = dndx;
        // xy
        b[(5, col)] = dndy;
        b[(5, col + 1)] = dndx;
    }
    b
}

/// Physical gradients and |det J| for given natural derivatives; `None` if degenerate.
fn physical_gradients<const N: usize>(
    d_n_nat: &SMatrix<f64, 3, N>,
    node_coords: &SMatrix<f64, N, 3>,
) -> Option<(SMatrix<f64, 3, N>, f64)> {
    let j: Matrix3<f64> = d_n_nat * node_coords;
    let det_j = j.determinant();
    let scale = j.norm();
    if det_j.abs() <= MIN_DET_J * scale * scale * scale {
        return None;
    }
    let j_inv = j.try_inverse()?;
    Some((j_inv * d_n_nat, det_j))
}

/// Compute stiffness and mass matrices for an 8-node hexahedron.
///
/// Returns `None` if a Gauss point has a non-positive Jacobian.
pub fn compute_hex8_matrices(
    node_coords: &NodeCoords,
    material: &Material,
) -> Option<(Matrix24x24, Matrix24x24)> {
    let d = material.elasticity_matrix();
    let mut ke = Matrix24x24::zeros();
    let mut me = Matrix24x24::zeros();

    let (points, weights) = gauss_points_3d();

    for gp in 0..8 {
        let point = points[gp];
        let (xi, eta, zeta) = (point.x, point.y, point.z);

        let n = shape_functions_hex8(xi, eta, zeta);
        let d_n_nat = shape_function_derivatives_hex8(xi, eta, zeta);
        let (d_n_phys, det_j) = physical_gradients(&d_n_nat, node_coords)?;
        if det_j <= 0.0 {
            return None;
        }
        let weight = weights[gp] * det_j;

        let b: Matrix6x24 = strain_operator(&d_n_phys);
        ke += weight * (b.transpose() * d * b);

        let mut n_mat = Matrix3x24::zeros();
        for i in 0..8 {
            let col = 3 * i;
            n_mat[(0, col)] = n[i];
            n_mat[(1, col + 1)] = n[i];
            n_mat[(2, col + 2)] = n[i];
        }

        me += (weight * material.density) * (n_mat.transpose() * n_mat);
    }

    ke = 0.5 * (ke + ke.transpose());
    me = 0.5 * (me + me.transpose());

    Some((ke, me))
}

/// Compute stiffness and consistent mass matrices for a 4-node tetrahedron.
pub fn compute_tet4_matrices(
    node_coords: &TetCoords,
    material: &Material,
) -> Option<(Matrix12x12, Matrix12x12)> {
    let (d_n_phys, det_j) = physical_gradients(&shape_function_derivatives_tet4(), node_coords)?;
    let volume = det_j.abs() / 6.0;

    let b: Matrix6x12 = strain_operator(&d_n_phys);
    let mut ke = volume * (b.transpose() * material.elasticity_matrix() * b);
    ke = 0.5 * (ke + ke.transpose());

    let mut me = Matrix12x12::zeros();
    let m0 = material.density * volume / 20.0;
    for a in 0..4 {
        for c in 0..4 {
            let factor = if a == c { 2.0 } else { 1.0 };
            for k in 0..3 {
                me[(3 * a + k, 3 * c + k)] = factor * m0;
            }
        }
    }

    Some((ke, me))
}

/// Strain vectors at the 4 nodes of a Tet4 (constant over the element).
pub fn tet4_nodal_strains(node_coords: &TetCoords, displacements: &SVector<f64, 12>) -> Option<[Vector6<f64>; 4]> {
    let (d_n_phys, _) = physical_gradients(&shape_function_derivatives_tet4(), node_coords)?;
    let b: Matrix6x12 = strain_operator(&d_n_phys);
    let strain = b * displacements;
    Some([strain; 4])
}

/// Strain vectors evaluated at the 8 corner nodes of a Hex8.
pub fn hex8_nodal_strains(node_coords: &NodeCoords, displacements: &SVector<f64, 24>) -> Option<[Vector6<f64>; 8]> {
    let mut strains = [Vector6::zeros(); 8];
    for (i, corner) in HEX8_CORNERS.iter().enumerate() {
        let d_n_nat = shape_function_derivatives_hex8(corner[0], corner[1], corner[2]);
        let (d_n_phys, _) = physical_gradients(&d_n_nat, node_coords)?;
        let b: Matrix6x24 = strain_operator(&d_n_phys);
        strains[i] = b * displacements;
    }
    Some(strains)
}
