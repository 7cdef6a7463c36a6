//! Post-processing modes: nodal strain or stress fields of every mode.
//!
//! For each column of a mode basis the strain of every solid element is
//! evaluated at its nodes and averaged over the elements adjacent to a node.
//! The result stores six Voigt components per mode and node, so stresses of a
//! reduced body follow from a linear combination with the modal coordinates.

use nalgebra::{DMatrix, DVectorView, SVector, Vector3, Vector6};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::cms::ModeBasis;
use crate::element::{self, Material, TetCoords};
use crate::error::{check_dimension, ReductionError, ReductionResult};
use crate::mesh::{solid_elements, ElementSet, SolidElement};
use crate::types::{dense_rows, Matrix6, NodeCoords, OutputVariableType, DOF_PER_NODE};

/// Voigt components stored per node and mode.
pub const COMPONENTS_PER_MODE: usize = 6;

/// Nodal strain or stress fields, nNodes × 6·nModes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProcessingModes {
    #[serde(with = "dense_rows")]
    pub matrix: DMatrix<f64>,
    pub output_variable_type: OutputVariableType,
}

impl PostProcessingModes {
    pub fn n_modes(&self) -> usize {
        self.matrix.ncols() / COMPONENTS_PER_MODE
    }

    /// Voigt vector of mode `mode` at `node`.
    pub fn nodal_value(&self, node: usize, mode: usize) -> Vector6<f64> {
        let col = COMPONENTS_PER_MODE * mode;
        Vector6::from_iterator((0..COMPONENTS_PER_MODE).map(|k| self.matrix[(node, col + k)]))
    }

    /// Field of a deformed configuration: Σ q_j · field_j.
    pub fn superpose(&self, node: usize, modal_coordinates: &[f64]) -> Vector6<f64> {
        modal_coordinates
            .iter()
            .enumerate()
            .map(|(mode, q)| *q * self.nodal_value(node, mode))
            .sum()
    }
}

/// Number of elements adjacent to every node.
fn adjacency_counts(n_nodes: usize, elements: &[SolidElement<'_>]) -> ReductionResult<Vec<usize>> {
    let mut counts = vec![0usize; n_nodes];
    for element in elements {
        for &node in element.nodes() {
            if node >= n_nodes {
                return Err(ReductionError::InvalidDimension {
                    context: "element node index",
                    expected: n_nodes,
                    found: node,
                });
            }
            counts[node] += 1;
        }
    }
    if let Some(node) = counts.iter().position(|&c| c == 0) {
        return Err(ReductionError::UnconnectedNode { node });
    }
    Ok(counts)
}

fn element_displacements<const D: usize>(nodes: &[usize], mode: &DVectorView<'_, f64>) -> SVector<f64, D> {
    SVector::from_iterator(
        nodes
            .iter()
            .flat_map(|&n| (0..DOF_PER_NODE).map(move |k| DOF_PER_NODE * n + k))
            .map(|dof| mode[dof]),
    )
}

/// Averaged nodal field (nNodes × 6) of a single mode.
fn mode_field(
    positions: &[Vector3<f64>],
    elements: &[SolidElement<'_>],
    counts: &[usize],
    mode: DVectorView<'_, f64>,
    elasticity: Option<&Matrix6>,
) -> ReductionResult<DMatrix<f64>> {
    let mut field = DMatrix::zeros(positions.len(), COMPONENTS_PER_MODE);

    let mut accumulate = |node: usize, strain: &Vector6<f64>| {
        let value = match elasticity {
            Some(d) => d * strain,
            None => *strain,
        };
        let weight = 1.0 / counts[node] as f64;
        for k in 0..COMPONENTS_PER_MODE {
            field[(node, k)] += weight * value[k];
        }
    };

    for element in elements {
        match *element {
            SolidElement::Tet4(index, nodes) => {
                let coords = TetCoords::from_fn(|i, k| positions[nodes[i]][k]);
                let u = element_displacements::<12>(nodes, &mode);
                let strains = element::tet4_nodal_strains(&coords, &u)
                    .ok_or(ReductionError::DegenerateElement { element: index })?;
                for (node, strain) in nodes.iter().zip(strains.iter()) {
                    accumulate(*node, strain);
                }
            }
            SolidElement::Hex8(index, nodes) => {
                let coords = NodeCoords::from_fn(|i, k| positions[nodes[i]][k]);
                let u = element_displacements::<24>(nodes, &mode);
                let strains = element::hex8_nodal_strains(&coords, &u)
                    .ok_or(ReductionError::DegenerateElement { element: index })?;
                for (node, strain) in nodes.iter().zip(strains.iter()) {
                    accumulate(*node, strain);
                }
            }
        }
    }

    Ok(field)
}

#[cfg(not(feature = "parallel"))]
fn mode_fields(
    positions: &[Vector3<f64>],
    elements: &[SolidElement<'_>],
    counts: &[usize],
    mode_basis: &ModeBasis,
    elasticity: Option<&Matrix6>,
) -> ReductionResult<Vec<DMatrix<f64>>> {
    (0..mode_basis.n_modes())
        .map(|j| mode_field(positions, elements, counts, mode_basis.matrix.column(j), elasticity))
        .collect()
}

#[cfg(feature = "parallel")]
fn mode_fields(
    positions: &[Vector3<f64>],
    elements: &[SolidElement<'_>],
    counts: &[usize],
    mode_basis: &ModeBasis,
    elasticity: Option<&Matrix6>,
) -> ReductionResult<Vec<DMatrix<f64>>> {
    (0..mode_basis.n_modes())
        .into_par_iter()
        .map(|j| mode_field(positions, elements, counts, mode_basis.matrix.column(j), elasticity))
        .collect()
}

/// Compute nodal strain (or stress) fields for every column of `mode_basis`.
///
/// Strains are evaluated at the element nodes (constant for Tet4, at the
/// corner natural coordinates for Hex8) and averaged over the adjacent
/// elements. Stresses use the isotropic elasticity matrix of `material`.
pub fn compute_post_processing_modes(
    positions: &[Vector3<f64>],
    element_sets: &[ElementSet],
    mode_basis: &ModeBasis,
    material: &Material,
    output: OutputVariableType,
) -> ReductionResult<PostProcessingModes> {
    let n_nodes = positions.len();
    check_dimension("mode basis rows", DOF_PER_NODE * n_nodes, mode_basis.n_dofs())?;

    let elements = solid_elements(element_sets);
    let counts = adjacency_counts(n_nodes, &elements)?;
    debug!(n_nodes, n_elements = elements.len(), "element adjacency computed");

    let elasticity = material.elasticity_matrix();
    let elasticity = match output {
        OutputVariableType::StressLocal => Some(&elasticity),
        OutputVariableType::StrainLocal => None,
    };

    let fields = mode_fields(positions, &elements, &counts, mode_basis, elasticity)?;

    let n_modes = fields.len();
    let mut matrix = DMatrix::zeros(n_nodes, COMPONENTS_PER_MODE * n_modes);
    for (j, field) in fields.iter().enumerate() {
        matrix
            .columns_mut(COMPONENTS_PER_MODE * j, COMPONENTS_PER_MODE)
            .copy_from(field);
    }

    info!(n_modes, ?output, "post-processing modes computed");
    Ok(PostProcessingModes {
        matrix,
        output_variable_type: output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModeBasisType;
    use nalgebra::Matrix3;

    const TEST_TOL: f64 = 1e-10;

    fn gradient() -> Matrix3<f64> {
        Matrix3::new(0.01, 0.002, -0.003, 0.004, -0.02, 0.005, 0.001, 0.006, 0.03)
    }

    fn expected_strain(g: &Matrix3<f64>) -> Vector6<f64> {
        Vector6::new(
            g[(0, 0)],
            g[(1, 1)],
            g[(2, 2)],
            g[(1, 2)] + g[(2, 1)],
            g[(0, 2)] + g[(2, 0)],
            g[(0, 1)] + g[(1, 0)],
        )
    }

    /// Basis with one linear displacement field u = G x and one zero column.
    fn linear_basis(positions: &[Vector3<f64>], g: &Matrix3<f64>) -> ModeBasis {
        let mut matrix = DMatrix::zeros(3 * positions.len(), 2);
        for (i, p) in positions.iter().enumerate() {
            let u = g * p;
            for k in 0..3 {
                matrix[(3 * i + k, 0)] = u[k];
            }
        }
        ModeBasis {
            matrix,
            basis_type: ModeBasisType::NormalModes,
        }
    }

    fn two_tets() -> (Vec<Vector3<f64>>, Vec<ElementSet>) {
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        let set = ElementSet {
            name: "tets".into(),
            tet4: vec![[0, 1, 2, 3], [1, 2, 3, 4]],
            hex8: Vec::new(),
        };
        (positions, vec![set])
    }

    fn two_hexes() -> (Vec<Vector3<f64>>, Vec<ElementSet>) {
        // 3 x 2 x 2 grid of nodes, index = ix * 4 + iy * 2 + iz
        let mut positions = Vec::new();
        for ix in 0..3 {
            for iy in 0..2 {
                for iz in 0..2 {
                    positions.push(Vector3::new(0.5 * ix as f64, 0.3 * iy as f64, 0.2 * iz as f64));
                }
            }
        }
        let idx = |ix: usize, iy: usize, iz: usize| ix * 4 + iy * 2 + iz;
        let hex = |ix: usize| {
            [
                idx(ix, 0, 0),
                idx(ix + 1, 0, 0),
                idx(ix + 1, 1, 0),
                idx(ix, 1, 0),
                idx(ix, 0, 1),
                idx(ix + 1, 0, 1),
                idx(ix + 1, 1, 1),
                idx(ix, 1, 1),
            ]
        };
        let set = ElementSet {
            name: "hexes".into(),
            tet4: Vec::new(),
            hex8: vec![hex(0), hex(1)],
        };
        (positions, vec![set])
    }

    fn check_uniform_field(positions: &[Vector3<f64>], sets: &[ElementSet]) {
        let g = gradient();
        let basis = linear_basis(positions, &g);
        let material = Material::new(2.0e5, 0.3, 7.8e-9);

        let strain = compute_post_processing_modes(
            positions,
            sets,
            &basis,
            &material,
            OutputVariableType::StrainLocal,
        )
        .unwrap();
        let stress = compute_post_processing_modes(
            positions,
            sets,
            &basis,
            &material,
            OutputVariableType::StressLocal,
        )
        .unwrap();

        assert_eq!(strain.matrix.shape(), (positions.len(), 12));
        assert_eq!(strain.n_modes(), 2);
        assert_eq!(stress.output_variable_type, OutputVariableType::StressLocal);

        let eps = expected_strain(&g);
        let sigma = material.strain_to_stress(&eps);
        for node in 0..positions.len() {
            assert!((strain.nodal_value(node, 0) - eps).norm() < TEST_TOL);
            assert!((stress.nodal_value(node, 0) - sigma).norm() < TEST_TOL * sigma.norm());
            assert!(strain.nodal_value(node, 1).norm() < TEST_TOL);
            assert!((strain.superpose(node, &[2.0, 5.0]) - 2.0 * eps).norm() < TEST_TOL);
        }
    }

    #[test]
    fn uniform_strain_on_tet_mesh() {
        let (positions, sets) = two_tets();
        check_uniform_field(&positions, &sets);
    }

    #[test]
    fn uniform_strain_on_hex_mesh() {
        let (positions, sets) = two_hexes();
        check_uniform_field(&positions, &sets);
    }

    #[test]
    fn unconnected_node_is_reported() {
        let (mut positions, sets) = two_tets();
        positions.push(Vector3::new(5.0, 5.0, 5.0));
        let basis = linear_basis(&positions, &gradient());
        let err = compute_post_processing_modes(
            &positions,
            &sets,
            &basis,
            &Material::default(),
            OutputVariableType::StrainLocal,
        )
        .unwrap_err();
        assert!(matches!(err, ReductionError::UnconnectedNode { node: 5 }));
    }

    #[test]
    fn degenerate_element_is_reported() {
        let positions = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ];
        let sets = vec![ElementSet {
            name: "flat".into(),
            tet4: vec![[0, 1, 2, 3]],
            hex8: Vec::new(),
        }];
        let basis = linear_basis(&positions, &gradient());
        let err = compute_post_processing_modes(
            &positions,
            &sets,
            &basis,
            &Material::default(),
            OutputVariableType::StrainLocal,
        )
        .unwrap_err();
        assert!(matches!(err, ReductionError::DegenerateElement { element: 0 }));
    }
}
