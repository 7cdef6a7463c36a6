//! Finite element model container.
//!
//! This module provides [`FemModel`], which holds the nodes, element sets,
//! mass and stiffness matrices, surfaces and the computed mode bases of a
//! flexible body, together with node selection helpers, the eigenmode and
//! Hurty-Craig-Bampton drivers and JSON persistence.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assembly;
use crate::cms::{self, ComputedModes, HcbOptions, ModeBasis};
use crate::element::Material;
use crate::error::{check_dimension, ReductionError, ReductionResult};
use crate::modes::{self, PostProcessingModes};
use crate::reduction::{RayleighDamping, ReducedModel};
use crate::rotation::skew;
use crate::solver;
use crate::sparse::SparseMatrixStore;
use crate::types::{EigenSolver, NodeType, OutputVariableType, DOF_PER_NODE};

/// Name of the surface generated by [`FemModel::volume_to_surface_elements`].
pub const MESH_SURFACE_NAME: &str = "meshSurface";

/// Local node indices of the quad faces of a Hex8, outward oriented.
const HEX8_FACES: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [7, 6, 5, 4],
    [0, 4, 5, 1],
    [1, 5, 6, 2],
    [2, 6, 7, 3],
    [3, 7, 4, 0],
];

/// Local node indices of the triangle faces of a Tet4.
const TET4_FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 3, 1], [1, 3, 2], [2, 3, 0]];

/// Reference positions of nodes sharing one node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSet {
    pub node_type: NodeType,
    pub positions: Vec<Vector3<f64>>,
}

/// Named list of solid elements (zero-based node indices).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSet {
    pub name: String,
    #[serde(default)]
    pub tet4: Vec<[usize; 4]>,
    #[serde(default)]
    pub hex8: Vec<[usize; 8]>,
}

impl ElementSet {
    pub fn len(&self) -> usize {
        self.tet4.len() + self.hex8.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named surface given by triangles and quads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfacePatch {
    pub name: String,
    #[serde(default)]
    pub trigs: Vec<[usize; 3]>,
    #[serde(default)]
    pub quads: Vec<[usize; 4]>,
}

/// A solid element with its index counted over all element sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolidElement<'a> {
    Tet4(usize, &'a [usize; 4]),
    Hex8(usize, &'a [usize; 8]),
}

impl<'a> SolidElement<'a> {
    pub fn index(&self) -> usize {
        match *self {
            SolidElement::Tet4(index, _) | SolidElement::Hex8(index, _) => index,
        }
    }

    pub fn nodes(&self) -> &'a [usize] {
        match *self {
            SolidElement::Tet4(_, nodes) => nodes.as_slice(),
            SolidElement::Hex8(_, nodes) => nodes.as_slice(),
        }
    }
}

/// Flatten element sets, Tet4 before Hex8 within each set.
pub fn solid_elements(element_sets: &[ElementSet]) -> Vec<SolidElement<'_>> {
    let mut elements = Vec::with_capacity(element_sets.iter().map(ElementSet::len).sum());
    for set in element_sets {
        for nodes in &set.tet4 {
            elements.push(SolidElement::Tet4(elements.len(), nodes));
        }
        for nodes in &set.hex8 {
            elements.push(SolidElement::Hex8(elements.len(), nodes));
        }
    }
    elements
}

/// Flexible body finite element model.
///
/// Filled once from an importer or by [`FemModel::assemble_solid_matrices`],
/// then reduced offline and persisted as JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FemModel {
    pub nodes: Vec<NodeSet>,
    #[serde(default)]
    pub elements: Vec<ElementSet>,
    pub mass_matrix: SparseMatrixStore,
    pub stiffness_matrix: SparseMatrixStore,
    #[serde(default)]
    pub surface: Vec<SurfacePatch>,
    #[serde(default)]
    pub mode_basis: Option<ModeBasis>,
    #[serde(default)]
    pub eigen_values: Vec<f64>,
    #[serde(default)]
    pub post_processing_modes: Option<PostProcessingModes>,
}

impl FemModel {
    /// Model with a single `Position` node set and empty matrices.
    pub fn from_positions(positions: Vec<Vector3<f64>>) -> Self {
        Self {
            nodes: vec![NodeSet {
                node_type: NodeType::Position,
                positions,
            }],
            ..Default::default()
        }
    }

    /// Model from positions and (symmetric) mass and stiffness matrices.
    pub fn from_matrices(
        positions: Vec<Vector3<f64>>,
        mass_matrix: SparseMatrixStore,
        stiffness_matrix: SparseMatrixStore,
    ) -> ReductionResult<Self> {
        let model = Self {
            mass_matrix,
            stiffness_matrix,
            ..Self::from_positions(positions)
        };
        model.check_consistency()?;
        Ok(model)
    }

    /// Positions of the single `Position` node set.
    pub fn positions(&self) -> ReductionResult<&[Vector3<f64>]> {
        match self.nodes.as_slice() {
            [set] if set.node_type == NodeType::Position => Ok(set.positions.as_slice()),
            [set] => Err(ReductionError::InvalidNodeType(format!(
                "expected Position nodes, found {}",
                set.node_type
            ))),
            sets => Err(ReductionError::InvalidNodeType(format!(
                "expected exactly one node set, found {}",
                sets.len()
            ))),
        }
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.iter().map(|set| set.positions.len()).sum()
    }

    /// Total nodal coordinates over all node sets.
    pub fn number_of_coordinates(&self) -> usize {
        self.nodes
            .iter()
            .map(|set| set.positions.len() * set.node_type.coordinates_per_node())
            .sum()
    }

    // ------------------------------------------------------------------
    // Matrix editing
    // ------------------------------------------------------------------

    pub fn scale_mass_matrix(&mut self, factor: f64) {
        self.mass_matrix.scale(factor);
    }

    pub fn scale_stiffness_matrix(&mut self, factor: f64) {
        self.stiffness_matrix.scale(factor);
    }

    /// Coordinate range of `node` in the single node set.
    fn node_coordinates(&self, node: usize) -> ReductionResult<std::ops::Range<usize>> {
        let [set] = self.nodes.as_slice() else {
            return Err(ReductionError::InvalidNodeType(format!(
                "expected exactly one node set, found {}",
                self.nodes.len()
            )));
        };
        if node >= set.positions.len() {
            return Err(ReductionError::InvalidDimension {
                context: "node index",
                expected: set.positions.len(),
                found: node,
            });
        }
        let size = set.node_type.coordinates_per_node();
        Ok(node * size..(node + 1) * size)
    }

    /// Add springs to the diagonal stiffness entries of `node`, one per coordinate.
    pub fn add_elastic_support_at_node(&mut self, node: usize, spring_stiffness: &[f64]) -> ReductionResult<()> {
        let coordinates = self.node_coordinates(node)?;
        check_dimension("spring stiffness entries", coordinates.len(), spring_stiffness.len())?;
        for (dof, k) in coordinates.zip(spring_stiffness) {
            self.stiffness_matrix.add_entry(dof, dof, *k)?;
        }
        Ok(())
    }

    /// Add a point mass to the diagonal mass entries of `node`.
    pub fn add_node_mass(&mut self, node: usize, added_mass: f64) -> ReductionResult<()> {
        for dof in self.node_coordinates(node)? {
            self.mass_matrix.add_entry(dof, dof, added_mass)?;
        }
        Ok(())
    }

    /// Replace mass and stiffness by the assembled matrices of all element sets.
    pub fn assemble_solid_matrices(&mut self, material: &Material) -> ReductionResult<()> {
        let assembled = assembly::assemble_solid_matrices(self.positions()?, &self.elements, material)?;
        self.mass_matrix = assembled.mass;
        self.stiffness_matrix = assembled.stiffness;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Node selection
    // ------------------------------------------------------------------

    /// First node whose coordinates all lie within ±`tolerance` of `point`.
    pub fn get_node_at_point(&self, point: &Vector3<f64>, tolerance: f64) -> ReductionResult<usize> {
        self.positions()?
            .iter()
            .position(|p| (p - point).amax() <= tolerance)
            .ok_or(ReductionError::NodeNotFound {
                x: point.x,
                y: point.y,
                z: point.z,
            })
    }

    /// Nodes within `tolerance` of the plane through `point` with normal `normal`.
    pub fn get_nodes_in_plane(
        &self,
        point: &Vector3<f64>,
        normal: &Vector3<f64>,
        tolerance: f64,
    ) -> ReductionResult<Vec<usize>> {
        let normal = normal.try_normalize(0.0).unwrap_or(*normal);
        self.select_nodes(|p| (p - point).dot(&normal).abs() <= tolerance)
    }

    /// Nodes inside the axis-aligned box [`p_min`, `p_max`], bounds included.
    pub fn get_nodes_in_cube(&self, p_min: &Vector3<f64>, p_max: &Vector3<f64>) -> ReductionResult<Vec<usize>> {
        self.select_nodes(|p| (0..3).all(|k| p[k] >= p_min[k] && p[k] <= p_max[k]))
    }

    /// Nodes on the segment from `p1` to `p2`.
    pub fn get_nodes_on_line(
        &self,
        p1: &Vector3<f64>,
        p2: &Vector3<f64>,
        tolerance: f64,
    ) -> ReductionResult<Vec<usize>> {
        self.get_nodes_on_cylinder(p1, p2, 0.0, tolerance)
    }

    /// Nodes on the lateral surface of the cylinder with axis `p1`-`p2`.
    ///
    /// Points slightly beyond the end caps (by `tolerance`) are accepted.
    pub fn get_nodes_on_cylinder(
        &self,
        p1: &Vector3<f64>,
        p2: &Vector3<f64>,
        radius: f64,
        tolerance: f64,
    ) -> ReductionResult<Vec<usize>> {
        let axis = p2 - p1;
        let length = axis.norm();
        let direction = if length > 0.0 { axis / length } else { axis };
        self.select_nodes(|p| {
            let s = direction.dot(&(p - p1));
            if s < -tolerance || s > length + tolerance {
                return false;
            }
            let distance = (p - (p1 + s * direction)).norm();
            (distance - radius).abs() <= tolerance
        })
    }

    /// Nodes on the circle of radius `radius` around `point` in the plane with normal `normal`.
    pub fn get_nodes_on_circle(
        &self,
        point: &Vector3<f64>,
        normal: &Vector3<f64>,
        radius: f64,
        tolerance: f64,
    ) -> ReductionResult<Vec<usize>> {
        let normal = normal.try_normalize(0.0).unwrap_or(*normal);
        self.select_nodes(|p| {
            let d = p - point;
            d.dot(&normal).abs() <= tolerance && (d.norm() - radius).abs() <= tolerance
        })
    }

    fn select_nodes<F>(&self, predicate: F) -> ReductionResult<Vec<usize>>
    where
        F: Fn(&Vector3<f64>) -> bool,
    {
        Ok(self
            .positions()?
            .iter()
            .enumerate()
            .filter(|(_, p)| predicate(p))
            .map(|(i, _)| i)
            .collect())
    }

    // ------------------------------------------------------------------
    // Surfaces
    // ------------------------------------------------------------------

    /// Triangles of all surface patches.
    pub fn get_surface_triangles(&self) -> Vec<[usize; 3]> {
        self.surface
            .iter()
            .flat_map(|patch| patch.trigs.iter().copied())
            .collect()
    }

    /// Extract the outer surface of all solid elements as triangles.
    ///
    /// A face is on the surface if no other element has a face with the same
    /// nodes. Quads are split into two triangles. The result is stored in the
    /// surface patch named [`MESH_SURFACE_NAME`], replacing its triangles.
    pub fn volume_to_surface_elements(&mut self) {
        let mut faces: Vec<Vec<usize>> = Vec::new();
        for element in solid_elements(&self.elements) {
            match element {
                SolidElement::Tet4(_, nodes) => {
                    faces.extend(TET4_FACES.iter().map(|f| f.iter().map(|&i| nodes[i]).collect::<Vec<usize>>()));
                }
                SolidElement::Hex8(_, nodes) => {
                    faces.extend(HEX8_FACES.iter().map(|f| f.iter().map(|&i| nodes[i]).collect::<Vec<usize>>()));
                }
            }
        }

        let mut face_count: HashMap<Vec<usize>, usize> = HashMap::with_capacity(faces.len());
        for face in &faces {
            let mut key = face.clone();
            key.sort_unstable();
            *face_count.entry(key).or_insert(0) += 1;
        }

        let mut trigs = Vec::new();
        for face in &faces {
            let mut key = face.clone();
            key.sort_unstable();
            if face_count.get(&key) != Some(&1) {
                continue;
            }
            match face.as_slice() {
                &[a, b, c] => trigs.push([a, b, c]),
                &[a, b, c, d] => {
                    trigs.push([a, b, c]);
                    trigs.push([a, c, d]);
                }
                _ => {}
            }
        }
        debug!(n_faces = faces.len(), n_trigs = trigs.len(), "surface extracted");

        match self.surface.iter_mut().find(|patch| patch.name == MESH_SURFACE_NAME) {
            Some(patch) => patch.trigs = trigs,
            None => self.surface.push(SurfacePatch {
                name: MESH_SURFACE_NAME.to_string(),
                trigs,
                quads: Vec::new(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Computation
    // ------------------------------------------------------------------

    /// Gyroscopic matrix blockdiag(skew(e_axis)) · M for rotation about
    /// coordinate axis `rotation_axis` (0 = x, 1 = y, 2 = z).
    pub fn get_gyroscopic_matrix(&self, rotation_axis: usize) -> ReductionResult<DMatrix<f64>> {
        if rotation_axis > 2 {
            return Err(ReductionError::InvalidDimension {
                context: "rotation axis",
                expected: 3,
                found: rotation_axis,
            });
        }
        let n = DOF_PER_NODE * self.number_of_nodes();
        check_dimension("mass matrix rows", n, self.mass_matrix.nrows())?;

        let x = skew(&Vector3::ith(rotation_axis, 1.0));
        let mass = self.mass_matrix.to_dense();
        let mut gyroscopic = DMatrix::zeros(n, mass.ncols());
        for block in (0..n).step_by(DOF_PER_NODE) {
            let rows = mass.fixed_rows::<3>(block);
            gyroscopic.fixed_rows_mut::<3>(block).copy_from(&(x * rows));
        }
        Ok(gyroscopic)
    }

    /// Campbell diagram of the model spinning about coordinate axis `rotation_axis`.
    ///
    /// Returns the rotor frequencies (Hz) from 0 to `terminal_frequency` in
    /// `frequency_steps` increments, and for each the lowest distinct
    /// eigenfrequencies (Hz) of the gyroscopic system, at most
    /// `n_eigenfrequencies + 1` including the rigid body mode 0. Uses dense
    /// matrices throughout.
    pub fn compute_campbell_diagram(
        &self,
        terminal_frequency: f64,
        n_eigenfrequencies: usize,
        frequency_steps: usize,
        rotation_axis: usize,
    ) -> ReductionResult<(Vec<f64>, Vec<Vec<f64>>)> {
        self.check_consistency()?;
        let gyroscopic = self.get_gyroscopic_matrix(rotation_axis)?;
        info!(
            n_dofs = gyroscopic.nrows(),
            rotation_axis,
            terminal_frequency,
            frequency_steps,
            "computing Campbell diagram"
        );
        solver::campbell_frequencies(
            &self.mass_matrix.to_dense(),
            &self.stiffness_matrix.to_dense(),
            &gyroscopic,
            terminal_frequency,
            n_eigenfrequencies,
            frequency_steps,
        )
    }

    /// Check matrix and mode basis sizes against 3 coordinates per node.
    ///
    /// Empty (0×0) matrices are accepted.
    pub fn check_consistency(&self) -> ReductionResult<()> {
        let n = DOF_PER_NODE * self.number_of_nodes();
        for (context_rows, context_cols, matrix) in [
            ("mass matrix rows", "mass matrix columns", &self.mass_matrix),
            ("stiffness matrix rows", "stiffness matrix columns", &self.stiffness_matrix),
        ] {
            if matrix.nrows() == 0 && matrix.ncols() == 0 {
                continue;
            }
            check_dimension(context_rows, n, matrix.nrows())?;
            check_dimension(context_cols, n, matrix.ncols())?;
        }
        if let Some(basis) = &self.mode_basis {
            check_dimension("mode basis rows", n, basis.n_dofs())?;
        }
        Ok(())
    }

    fn store_modes(&mut self, computed: ComputedModes) {
        self.mode_basis = Some(computed.basis);
        self.eigen_values = computed.eigen_values;
        self.post_processing_modes = None;
    }

    /// Compute free-free eigenmodes and store them as mode basis.
    pub fn compute_eigenmodes(
        &mut self,
        n_modes: usize,
        exclude_rigid_body_modes: usize,
        eigen_solver: EigenSolver,
    ) -> ReductionResult<()> {
        let computed = cms::compute_eigenmodes(
            &self.mass_matrix,
            &self.stiffness_matrix,
            n_modes,
            exclude_rigid_body_modes,
            eigen_solver,
        )?;
        self.store_modes(computed);
        Ok(())
    }

    /// Compute eigenmodes with `boundary_nodes` fixed and store them as mode basis.
    pub fn compute_eigen_modes_with_boundary_nodes(
        &mut self,
        boundary_nodes: &[usize],
        n_modes: usize,
        eigen_solver: EigenSolver,
    ) -> ReductionResult<()> {
        let computed = cms::compute_eigen_modes_with_boundary_nodes(
            &self.mass_matrix,
            &self.stiffness_matrix,
            boundary_nodes,
            n_modes,
            eigen_solver,
        )?;
        self.store_modes(computed);
        Ok(())
    }

    /// Compute the Hurty-Craig-Bampton basis and store it as mode basis.
    pub fn compute_hurty_craig_bampton_modes(
        &mut self,
        interfaces: &[Vec<usize>],
        options: &HcbOptions,
    ) -> ReductionResult<()> {
        let computed = cms::compute_hurty_craig_bampton_modes(
            self.positions()?,
            &self.mass_matrix,
            &self.stiffness_matrix,
            interfaces,
            options,
        )?;
        self.store_modes(computed);
        Ok(())
    }

    /// Eigenfrequencies in Hz of the stored eigenvalues.
    pub fn get_eigen_frequencies_hz(&self) -> Vec<f64> {
        solver::eigen_frequencies_hz(&self.eigen_values)
    }

    /// Compute and store strain or stress modes of the stored mode basis.
    pub fn compute_post_processing_modes(
        &mut self,
        material: &Material,
        output: OutputVariableType,
    ) -> ReductionResult<()> {
        let basis = self.mode_basis.as_ref().ok_or(ReductionError::MissingModeBasis)?;
        if self.elements.is_empty() {
            warn!("no element sets, post-processing modes need elements");
        }
        let post = modes::compute_post_processing_modes(self.positions()?, &self.elements, basis, material, output)?;
        self.post_processing_modes = Some(post);
        Ok(())
    }

    /// Reduced FFRF model of the stored mode basis.
    pub fn reduced_model(&self, damping: RayleighDamping) -> ReductionResult<ReducedModel> {
        let basis = self.mode_basis.as_ref().ok_or(ReductionError::MissingModeBasis)?;
        ReducedModel::new(
            self.positions()?,
            &self.mass_matrix,
            &self.stiffness_matrix,
            basis,
            damping,
        )
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn to_json(&self) -> ReductionResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a model and check its matrix and basis sizes.
    pub fn from_json(json: &str) -> ReductionResult<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.check_consistency()?;
        Ok(model)
    }

    /// Write the model as JSON to `path`.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ReductionResult<()> {
        let json = self.to_json()?;
        fs::write(path.as_ref(), json)?;
        info!(path = %path.as_ref().display(), n_nodes = self.number_of_nodes(), "saved model");
        Ok(())
    }

    /// Read a model written by [`FemModel::save_to_file`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ReductionResult<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let model = Self::from_json(&json)?;
        info!(path = %path.as_ref().display(), n_nodes = model.number_of_nodes(), "loaded model");
        Ok(model)
    }
}
