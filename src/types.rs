//! Type aliases, constants, and core enums for the reduction library.

use std::fmt;

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

// Type aliases for common matrix sizes
pub type NodeCoords = SMatrix<f64, 8, 3>;
pub type Matrix6 = SMatrix<f64, 6, 6>;
pub type Matrix6x12 = SMatrix<f64, 6, 12>;
pub type Matrix6x24 = SMatrix<f64, 6, 24>;
pub type Matrix3x24 = SMatrix<f64, 3, 24>;
pub type Matrix3x8 = SMatrix<f64, 3, 8>;
pub type Matrix12x12 = SMatrix<f64, 12, 12>;
pub type Matrix24x24 = SMatrix<f64, 24, 24>;

// Core constants
pub const DOF_PER_NODE: usize = 3;

/// Number of rigid-body coordinates of one interface (3 translations, 3 rotations).
pub const RIGID_INTERFACE_DOF: usize = 6;

// f64 representation of 1/sqrt(3) Gauss point coordinate for 2×2×2 quadrature
pub const GAUSS_G: f64 = 0.577_350_269_189_625_8;
pub const MIN_DET_J: f64 = 1e-12;

/// Tolerance for eigenvalue ordering checks.
pub const LAMBDA_TOL: f64 = 1e-12;

/// Relative threshold below which reduced matrix entries are set to zero.
pub const ROUND_MATRIX_TOL: f64 = 1e-13;

/// Relative size of the (negative) shift used by the sparse eigensolver,
/// measured against mean(diag K) / mean(diag M).
pub const SHIFT_FACTOR: f64 = 1e-6;

/// Smallest accepted Cholesky pivot of Kii relative to its largest diagonal entry.
pub const SINGULAR_PIVOT_TOL: f64 = 1e-14;

/// Relative tolerance for detecting collinear interface nodes.
pub const COLLINEAR_TOL: f64 = 1e-10;

/// DOF threshold above which sparse solver is used automatically.
pub const SPARSE_DOF_THRESHOLD: usize = 500;

/// Maximum Lanczos iterations.
pub const MAX_LANCZOS_ITER: usize = 300;

/// Convergence tolerance for Lanczos.
pub const LANCZOS_TOL: f64 = 1e-10;

/// Relative tolerance below which two Campbell frequencies count as one.
pub const CAMPBELL_UNIQUE_TOL: f64 = 1e-10;

/// Solver type for eigenvalue computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EigenSolver {
    /// Dense solver using full matrix eigendecomposition. Best for small problems (< 500 DOF).
    Dense,
    /// Sparse solver using shift-invert Lanczos. Best for large problems (> 500 DOF).
    Sparse,
    /// Automatically choose based on problem size.
    #[default]
    Auto,
}

impl EigenSolver {
    /// Resolve `Auto` against the problem size.
    pub fn use_sparse(self, num_dofs: usize) -> bool {
        match self {
            EigenSolver::Dense => false,
            EigenSolver::Sparse => true,
            EigenSolver::Auto => num_dofs > SPARSE_DOF_THRESHOLD,
        }
    }
}

/// Backend for sparse matrix operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SparseBackend {
    /// Use nalgebra-sparse (always available).
    #[default]
    NalgebraSparse,
    /// Use sprs crate (requires "sprs-backend" feature).
    #[cfg(feature = "sprs-backend")]
    Sprs,
}

/// How static modes are generated in a Hurty-Craig-Bampton reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaticModeSelection {
    /// One static mode per boundary coordinate. The consumer has to add
    /// 6 rigid-body constraints per interface to the reduced body.
    AllBoundaryDof,
    /// Rigid interface (RBE2-like) modes: 6 per interface, first interface dropped.
    #[default]
    RigidInterfaceModes,
    /// Fixed-interface eigenmodes only.
    EigenOnly,
}

/// Origin of the columns of a mode basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeBasisType {
    NormalModes,
    #[serde(rename = "HCBmodes")]
    HcbModes,
}

/// Quantity stored in post-processing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputVariableType {
    StressLocal,
    StrainLocal,
}

/// Node type of a node set, fixing the number of coordinates per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Position,
    Position2D,
    RigidBodyRxyz,
    RigidBodyEP,
}

impl NodeType {
    pub fn coordinates_per_node(self) -> usize {
        match self {
            NodeType::Position => 3,
            NodeType::Position2D => 2,
            NodeType::RigidBodyRxyz => 6,
            NodeType::RigidBodyEP => 7,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Position => "Position",
            NodeType::Position2D => "Position2D",
            NodeType::RigidBodyRxyz => "RigidBodyRxyz",
            NodeType::RigidBodyEP => "RigidBodyEP",
        };
        f.write_str(name)
    }
}

/// Serialize a dense matrix as a list of rows.
pub mod dense_rows {
    use nalgebra::DMatrix;
    use serde::de::Error;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(matrix: &DMatrix<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(matrix.nrows()))?;
        for row in matrix.row_iter() {
            let values: Vec<f64> = row.iter().copied().collect();
            seq.serialize_element(&values)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DMatrix<f64>, D::Error> {
        let rows: Vec<Vec<f64>> = Vec::deserialize(deserializer)?;
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|row| row.len() != ncols) {
            return Err(D::Error::custom(format!(
                "row {bad} has {} entries, expected {ncols}",
                rows[bad].len()
            )));
        }
        Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_solver_switches_at_threshold() {
        assert!(!EigenSolver::Auto.use_sparse(SPARSE_DOF_THRESHOLD));
        assert!(EigenSolver::Auto.use_sparse(SPARSE_DOF_THRESHOLD + 1));
        assert!(EigenSolver::Sparse.use_sparse(3));
        assert!(!EigenSolver::Dense.use_sparse(100_000));
    }

    #[test]
    fn node_type_coordinate_counts() {
        assert_eq!(NodeType::Position.coordinates_per_node(), DOF_PER_NODE);
        assert_eq!(NodeType::RigidBodyEP.coordinates_per_node(), 7);
    }

    #[derive(Serialize, Deserialize)]
    struct Wrapped(#[serde(with = "dense_rows")] nalgebra::DMatrix<f64>);

    #[test]
    fn dense_rows_serializes_row_lists() {
        let m = nalgebra::DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 0.1]);
        let json = serde_json::to_string(&Wrapped(m.clone())).unwrap();
        assert_eq!(json, "[[1.0,2.0,3.0],[4.0,5.0,0.1]]");
        let back: Wrapped = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, m);

        assert!(serde_json::from_str::<Wrapped>("[[1.0],[2.0,3.0]]").is_err());
    }

    #[test]
    fn mode_basis_type_uses_persisted_tags() {
        let json = serde_json::to_string(&ModeBasisType::HcbModes).unwrap();
        assert_eq!(json, "\"HCBmodes\"");
        let back: ModeBasisType = serde_json::from_str("\"NormalModes\"").unwrap();
        assert_eq!(back, ModeBasisType::NormalModes);
    }
}
