//! Component mode synthesis: mode basis computation.
//!
//! Provides free-free and fixed-boundary eigenmode bases and the
//! Hurty-Craig-Bampton basis (static interface modes plus fixed-interface
//! eigenmodes).

use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::boundary::BoundaryPartition;
use crate::condensation::StaticCondensation;
use crate::error::{check_dimension, ReductionError, ReductionResult};
use crate::interface::RigidInterfaceProjector;
use crate::solver::{self, EigenModes};
use crate::sparse::SparseMatrixStore;
use crate::types::{
    dense_rows, EigenSolver, ModeBasisType, StaticModeSelection, DOF_PER_NODE, RIGID_INTERFACE_DOF,
};

/// Dense nFullDOF × nModes basis tagged with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeBasis {
    #[serde(with = "dense_rows")]
    pub matrix: DMatrix<f64>,
    #[serde(rename = "type")]
    pub basis_type: ModeBasisType,
}

impl ModeBasis {
    pub fn n_modes(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn n_dofs(&self) -> usize {
        self.matrix.nrows()
    }
}

/// A computed mode basis with the |λ| of its eigen-derived columns.
#[derive(Debug, Clone)]
pub struct ComputedModes {
    pub basis: ModeBasis,
    pub eigen_values: Vec<f64>,
}

/// Options for the Hurty-Craig-Bampton reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HcbOptions {
    /// Number of fixed-interface eigenmodes
    pub n_eigen_modes: usize,
    /// Eigensolver for the internal problem
    pub solver: EigenSolver,
    /// Static mode generation
    pub static_modes: StaticModeSelection,
}

impl Default for HcbOptions {
    fn default() -> Self {
        Self {
            n_eigen_modes: 8,
            solver: EigenSolver::Auto,
            static_modes: StaticModeSelection::RigidInterfaceModes,
        }
    }
}

impl HcbOptions {
    /// Rigid interface modes with `n_eigen_modes` eigenmodes.
    pub fn new(n_eigen_modes: usize) -> Self {
        Self {
            n_eigen_modes,
            ..Default::default()
        }
    }

    pub fn with_solver(mut self, solver: EigenSolver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_static_modes(mut self, static_modes: StaticModeSelection) -> Self {
        self.static_modes = static_modes;
        self
    }
}

fn check_square_pair(mass: &SparseMatrixStore, stiffness: &SparseMatrixStore) -> ReductionResult<usize> {
    let n = stiffness.nrows();
    check_dimension("stiffness matrix columns", n, stiffness.ncols())?;
    check_dimension("mass matrix rows", n, mass.nrows())?;
    check_dimension("mass matrix columns", n, mass.ncols())?;
    Ok(n)
}

/// Free-free eigenmodes of the full model.
///
/// The first `exclude_rigid_body_modes` pairs (smallest |λ|) are dropped.
pub fn compute_eigenmodes(
    mass: &SparseMatrixStore,
    stiffness: &SparseMatrixStore,
    n_modes: usize,
    exclude_rigid_body_modes: usize,
    eigen_solver: EigenSolver,
) -> ReductionResult<ComputedModes> {
    let n = check_square_pair(mass, stiffness)?;
    info!(n_dofs = n, n_modes, exclude_rigid_body_modes, "computing eigenmodes");

    let modes = solver::compute_eigenmodes(
        &stiffness.to_csr(),
        &mass.to_csr(),
        n_modes,
        exclude_rigid_body_modes,
        eigen_solver,
    )?;

    Ok(ComputedModes {
        basis: ModeBasis {
            matrix: modes.eigenvectors,
            basis_type: ModeBasisType::NormalModes,
        },
        eigen_values: modes.eigenvalues,
    })
}

/// Eigenmodes with all DOF of `boundary_nodes` fixed; boundary rows are zero.
pub fn compute_eigen_modes_with_boundary_nodes(
    mass: &SparseMatrixStore,
    stiffness: &SparseMatrixStore,
    boundary_nodes: &[usize],
    n_modes: usize,
    eigen_solver: EigenSolver,
) -> ReductionResult<ComputedModes> {
    let n = check_square_pair(mass, stiffness)?;
    let mut sorted = boundary_nodes.to_vec();
    sorted.sort_unstable();
    let partition = BoundaryPartition::new(n, &[sorted])?;
    info!(
        n_dofs = n,
        n_boundary = partition.n_boundary(),
        n_modes,
        "computing eigenmodes with fixed boundary nodes"
    );

    let blocks = partition.extract_blocks(mass, stiffness)?;
    let eigen = solver::compute_eigenmodes(&blocks.kii, &blocks.mii, n_modes, 0, eigen_solver)?;

    let matrix = assemble_mode_basis(
        &partition,
        &DMatrix::zeros(partition.n_boundary(), 0),
        &DMatrix::zeros(partition.n_internal(), 0),
        &eigen.eigenvectors,
    )?;

    Ok(ComputedModes {
        basis: ModeBasis {
            matrix,
            basis_type: ModeBasisType::NormalModes,
        },
        eigen_values: eigen.eigenvalues,
    })
}

/// Boundary map of rigid interface modes: block-diagonal stack of the
/// per-interface projectors with the first interface's 6 columns removed.
pub fn rigid_interface_map(
    positions: &[Vector3<f64>],
    interfaces: &[Vec<usize>],
) -> ReductionResult<DMatrix<f64>> {
    let n_boundary: usize = interfaces.iter().map(|nodes| DOF_PER_NODE * nodes.len()).sum();
    let n_cols = RIGID_INTERFACE_DOF * interfaces.len().saturating_sub(1);
    let mut map = DMatrix::zeros(n_boundary, n_cols);

    let mut row = 0;
    for (index, nodes) in interfaces.iter().enumerate() {
        let node_positions = nodes
            .iter()
            .map(|&node| {
                positions.get(node).copied().ok_or(ReductionError::InvalidDimension {
                    context: "interface node position",
                    expected: positions.len(),
                    found: node,
                })
            })
            .collect::<ReductionResult<Vec<_>>>()?;
        let projector = RigidInterfaceProjector::new(index, &node_positions)?;

        // the first interface anchors the body and gets no columns
        if index > 0 {
            let col = RIGID_INTERFACE_DOF * (index - 1);
            map.view_mut((row, col), (projector.matrix().nrows(), RIGID_INTERFACE_DOF))
                .copy_from(projector.matrix());
        }
        row += DOF_PER_NODE * nodes.len();
    }

    Ok(map)
}

/// Scatter [boundary map | 0] into boundary rows and [static | eigen] into
/// internal rows of a full-size basis.
pub fn assemble_mode_basis(
    partition: &BoundaryPartition,
    boundary_map: &DMatrix<f64>,
    static_modes: &DMatrix<f64>,
    eigen_vectors: &DMatrix<f64>,
) -> ReductionResult<DMatrix<f64>> {
    let n_static = boundary_map.ncols();
    check_dimension("boundary map rows", partition.n_boundary(), boundary_map.nrows())?;
    check_dimension("static mode rows", partition.n_internal(), static_modes.nrows())?;
    check_dimension("static mode columns", n_static, static_modes.ncols())?;
    check_dimension("eigenvector rows", partition.n_internal(), eigen_vectors.nrows())?;

    let n_eigen = eigen_vectors.ncols();
    let mut basis = DMatrix::zeros(partition.n_dofs(), n_static + n_eigen);

    for (j, &dof) in partition.boundary_dofs().iter().enumerate() {
        for c in 0..n_static {
            basis[(dof, c)] = boundary_map[(j, c)];
        }
    }
    for (i, &dof) in partition.internal_dofs().iter().enumerate() {
        for c in 0..n_static {
            basis[(dof, c)] = static_modes[(i, c)];
        }
        for c in 0..n_eigen {
            basis[(dof, n_static + c)] = eigen_vectors[(i, c)];
        }
    }

    Ok(basis)
}

/// Hurty-Craig-Bampton mode basis for the given boundary interfaces.
///
/// With no interfaces this falls back to `n_eigen_modes` free-free
/// eigenmodes (tagged `NormalModes`).
pub fn compute_hurty_craig_bampton_modes(
    positions: &[Vector3<f64>],
    mass: &SparseMatrixStore,
    stiffness: &SparseMatrixStore,
    interfaces: &[Vec<usize>],
    options: &HcbOptions,
) -> ReductionResult<ComputedModes> {
    if interfaces.is_empty() {
        info!("no boundary interfaces, computing free-free eigenmodes");
        return compute_eigenmodes(mass, stiffness, options.n_eigen_modes, 0, options.solver);
    }

    let n = check_square_pair(mass, stiffness)?;
    check_dimension("node positions", n, DOF_PER_NODE * positions.len())?;

    if options.static_modes == StaticModeSelection::EigenOnly && options.n_eigen_modes == 0 {
        return Err(ReductionError::InvalidDimension {
            context: "eigenmodes required for eigen-only static mode selection",
            expected: 1,
            found: 0,
        });
    }

    let partition = BoundaryPartition::new(n, interfaces)?;
    info!(
        n_dofs = n,
        n_boundary = partition.n_boundary(),
        n_internal = partition.n_internal(),
        n_interfaces = interfaces.len(),
        n_eigen_modes = options.n_eigen_modes,
        static_modes = ?options.static_modes,
        "computing Hurty-Craig-Bampton modes"
    );

    let blocks = partition.extract_blocks(mass, stiffness)?;

    let boundary_map = match options.static_modes {
        StaticModeSelection::AllBoundaryDof => {
            warn!(
                n_interfaces = interfaces.len(),
                "static modes for all boundary DOF: the reduced body needs 6 rigid-body constraints per interface"
            );
            DMatrix::identity(partition.n_boundary(), partition.n_boundary())
        }
        StaticModeSelection::RigidInterfaceModes => rigid_interface_map(positions, interfaces)?,
        StaticModeSelection::EigenOnly => DMatrix::zeros(partition.n_boundary(), 0),
    };

    let static_modes = if boundary_map.ncols() > 0 {
        let condensation = StaticCondensation::factorize(&blocks.kii)?;
        condensation.solve_static_modes(&blocks.kib, &boundary_map)?
    } else {
        DMatrix::zeros(partition.n_internal(), 0)
    };
    debug!(n_static = static_modes.ncols(), "static modes computed");

    let eigen = if options.n_eigen_modes > 0 {
        solver::compute_eigenmodes(
            &blocks.kii,
            &blocks.mii,
            options.n_eigen_modes,
            0,
            options.solver,
        )?
    } else {
        EigenModes::empty(partition.n_internal())
    };

    let matrix = assemble_mode_basis(&partition, &boundary_map, &static_modes, &eigen.eigenvectors)?;
    info!(n_modes = matrix.ncols(), "Hurty-Craig-Bampton basis assembled");

    Ok(ComputedModes {
        basis: ModeBasis {
            matrix,
            basis_type: ModeBasisType::HcbModes,
        },
        eigen_values: eigen.eigenvalues,
    })
}
