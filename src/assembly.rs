//! Global matrix assembly of solid element matrices.
//!
//! Element matrices are computed independently (in parallel with the
//! `parallel` feature) and scattered into [`SparseMatrixStore`]s with
//! 3 DOF per node, full DOF index = node * 3 + component.

use nalgebra::{SMatrix, Vector3};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::element::{self, Material, TetCoords};
use crate::error::{ReductionError, ReductionResult};
use crate::mesh::{solid_elements, ElementSet, SolidElement};
use crate::sparse::SparseMatrixStore;
use crate::types::{Matrix12x12, Matrix24x24, NodeCoords, DOF_PER_NODE};

/// Global mass and stiffness matrices of an assembled body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssembledMatrices {
    pub mass: SparseMatrixStore,
    pub stiffness: SparseMatrixStore,
}

/// Stiffness and mass of one element.
enum ElementMatrices {
    Tet4(Matrix12x12, Matrix12x12),
    Hex8(Matrix24x24, Matrix24x24),
}

fn compute_element_matrices(
    element: &SolidElement<'_>,
    positions: &[Vector3<f64>],
    material: &Material,
) -> ReductionResult<ElementMatrices> {
    for &node in element.nodes() {
        if node >= positions.len() {
            return Err(ReductionError::InvalidDimension {
                context: "element node index",
                expected: positions.len(),
                found: node,
            });
        }
    }
    match *element {
        SolidElement::Tet4(index, nodes) => {
            let coords = TetCoords::from_fn(|i, k| positions[nodes[i]][k]);
            element::compute_tet4_matrices(&coords, material)
                .map(|(ke, me)| ElementMatrices::Tet4(ke, me))
                .ok_or(ReductionError::DegenerateElement { element: index })
        }
        SolidElement::Hex8(index, nodes) => {
            let coords = NodeCoords::from_fn(|i, k| positions[nodes[i]][k]);
            element::compute_hex8_matrices(&coords, material)
                .map(|(ke, me)| ElementMatrices::Hex8(ke, me))
                .ok_or(ReductionError::DegenerateElement { element: index })
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn compute_all_element_matrices(
    elements: &[SolidElement<'_>],
    positions: &[Vector3<f64>],
    material: &Material,
) -> ReductionResult<Vec<ElementMatrices>> {
    elements
        .iter()
        .map(|element| compute_element_matrices(element, positions, material))
        .collect()
}

/// Each element's matrices are computed independently.
#[cfg(feature = "parallel")]
fn compute_all_element_matrices(
    elements: &[SolidElement<'_>],
    positions: &[Vector3<f64>],
    material: &Material,
) -> ReductionResult<Vec<ElementMatrices>> {
    elements
        .par_iter()
        .map(|element| compute_element_matrices(element, positions, material))
        .collect()
}

/// Add a local element matrix into a global store.
pub fn scatter_element_matrix<const D: usize>(
    store: &mut SparseMatrixStore,
    nodes: &[usize],
    local: &SMatrix<f64, D, D>,
) -> ReductionResult<()> {
    let dof_map: Vec<usize> = nodes
        .iter()
        .flat_map(|n| [3 * n, 3 * n + 1, 3 * n + 2])
        .collect();
    let cutoff = f64::EPSILON * local.amax();

    for i in 0..D {
        for j in 0..D {
            let val = local[(i, j)];
            if val.abs() > cutoff {
                store.add_entry(dof_map[i], dof_map[j], val)?;
            }
        }
    }
    Ok(())
}

/// Assemble consistent mass and isotropic stiffness matrices of all Tet4
/// and Hex8 elements in `element_sets`.
pub fn assemble_solid_matrices(
    positions: &[Vector3<f64>],
    element_sets: &[ElementSet],
    material: &Material,
) -> ReductionResult<AssembledMatrices> {
    let n_dofs = DOF_PER_NODE * positions.len();
    let elements = solid_elements(element_sets);
    debug!(n_dofs, n_elements = elements.len(), "computing element matrices");

    let element_matrices = compute_all_element_matrices(&elements, positions, material)?;

    let mut assembled = AssembledMatrices {
        mass: SparseMatrixStore::new(n_dofs, n_dofs),
        stiffness: SparseMatrixStore::new(n_dofs, n_dofs),
    };
    for (element, matrices) in elements.iter().zip(element_matrices.iter()) {
        let nodes = element.nodes();
        match matrices {
            ElementMatrices::Tet4(ke, me) => {
                scatter_element_matrix(&mut assembled.stiffness, nodes, ke)?;
                scatter_element_matrix(&mut assembled.mass, nodes, me)?;
            }
            ElementMatrices::Hex8(ke, me) => {
                scatter_element_matrix(&mut assembled.stiffness, nodes, ke)?;
                scatter_element_matrix(&mut assembled.mass, nodes, me)?;
            }
        }
    }

    info!(
        n_dofs,
        n_elements = elements.len(),
        nnz_stiffness = assembled.stiffness.nnz(),
        nnz_mass = assembled.mass.nnz(),
        "assembled solid matrices"
    );
    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    const TEST_TOL: f64 = 1e-10;

    fn unit_cube_hex() -> (Vec<Vector3<f64>>, Vec<ElementSet>) {
        let positions = element::HEX8_CORNERS
            .iter()
            .map(|c| Vector3::new(0.5 * (c[0] + 1.0), 0.5 * (c[1] + 1.0), 0.5 * (c[2] + 1.0)))
            .collect();
        let set = ElementSet {
            name: "cube".into(),
            tet4: Vec::new(),
            hex8: vec![[0, 1, 2, 3, 4, 5, 6, 7]],
        };
        (positions, vec![set])
    }

    /// Unit cube split into 6 tetrahedra along the 0-6 diagonal.
    fn unit_cube_tets() -> (Vec<Vector3<f64>>, Vec<ElementSet>) {
        let (positions, _) = unit_cube_hex();
        let set = ElementSet {
            name: "tets".into(),
            tet4: vec![
                [0, 1, 2, 6],
                [0, 2, 3, 6],
                [0, 3, 7, 6],
                [0, 7, 4, 6],
                [0, 4, 5, 6],
                [0, 5, 1, 6],
            ],
            hex8: Vec::new(),
        };
        (positions, vec![set])
    }

    fn translation(n_nodes: usize, direction: usize) -> DVector<f64> {
        DVector::from_fn(3 * n_nodes, |i, _| if i % 3 == direction { 1.0 } else { 0.0 })
    }

    fn check_body(positions: &[Vector3<f64>], sets: &[ElementSet], volume: f64) {
        let material = Material::new(210.0, 0.3, 7.8);
        let assembled = assemble_solid_matrices(positions, sets, &material).unwrap();
        let m = assembled.mass.to_dense();
        let k = assembled.stiffness.to_dense();
        assert_eq!(m.shape(), (24, 24));

        for direction in 0..3 {
            let t = translation(positions.len(), direction);
            // total mass along each translation
            let mass = (t.transpose() * &m * &t)[(0, 0)];
            assert!((mass - material.density * volume).abs() < TEST_TOL);
            // rigid translation is strain free
            assert!((&k * &t).norm() < TEST_TOL * k.norm());
        }
        assert!((&k - k.transpose()).norm() < TEST_TOL * k.norm());
    }

    #[test]
    fn hex_assembly_conserves_mass_and_rigid_motion() {
        let (positions, sets) = unit_cube_hex();
        check_body(&positions, &sets, 1.0);
    }

    #[test]
    fn tet_assembly_conserves_mass_and_rigid_motion() {
        let (positions, sets) = unit_cube_tets();
        check_body(&positions, &sets, 1.0);
    }

    #[test]
    fn shared_nodes_are_merged() {
        let (positions, sets) = unit_cube_tets();
        let assembled = assemble_solid_matrices(&positions, &sets, &Material::default()).unwrap();
        // node 0 is shared by all six tetrahedra
        let expected: f64 = 6.0 * 2.0 * (1.0 / 6.0) / 20.0;
        assert!((assembled.mass.get(0, 0) - expected).abs() < TEST_TOL);
        let positions_stored: std::collections::HashSet<(usize, usize)> =
            assembled.mass.triplets().iter().map(|&(i, j, _)| (i, j)).collect();
        assert_eq!(positions_stored.len(), assembled.mass.triplets().len());
    }

    #[test]
    fn degenerate_element_fails() {
        let (mut positions, sets) = unit_cube_hex();
        for p in positions.iter_mut().skip(4) {
            p.z = 0.0;
        }
        let err = assemble_solid_matrices(&positions, &sets, &Material::default()).unwrap_err();
        assert!(matches!(err, ReductionError::DegenerateElement { element: 0 }));
    }

    #[test]
    fn out_of_range_node_fails() {
        let (positions, mut sets) = unit_cube_hex();
        sets[0].hex8[0][7] = 8;
        let err = assemble_solid_matrices(&positions, &sets, &Material::default()).unwrap_err();
        assert!(matches!(err, ReductionError::InvalidDimension { .. }));
    }
}
