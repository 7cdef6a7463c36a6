//! Component mode synthesis and reduced floating frame of reference (FFRF)
//! dynamics for flexible bodies.
//!
//! The offline pipeline takes the nodal mass and stiffness matrices of a
//! linear-elastic finite element model, builds a Hurty-Craig-Bampton (or
//! eigenmode) basis and projects the model onto it. The resulting
//! [`ReducedModel`] feeds the online evaluation of the configuration
//! dependent mass matrix and force vector of the reduced body.
//!
//! ```no_run
//! use ffrf_cms::{FemModel, HcbOptions, RayleighDamping, RuntimeState, RotationParameterization};
//! use nalgebra::Vector3;
//!
//! # fn main() -> Result<(), ffrf_cms::ReductionError> {
//! let mut model = FemModel::load_from_file("body.json")?;
//! let left = model.get_nodes_in_plane(&Vector3::zeros(), &Vector3::x(), 1e-5)?;
//! let right = model.get_nodes_in_plane(&Vector3::new(1.0, 0.0, 0.0), &Vector3::x(), 1e-5)?;
//! model.compute_hurty_craig_bampton_modes(&[left, right], &HcbOptions::new(8))?;
//!
//! let reduced = model.reduced_model(RayleighDamping::default())?;
//! let state = RuntimeState::at_rest(RotationParameterization::EulerParameters, reduced.n_modes());
//! let mass = ffrf_cms::compute_mass_matrix(&reduced, &state);
//! let force = ffrf_cms::compute_force_vector(&reduced, &state, &Vector3::new(0.0, 0.0, -9.81));
//! # let _ = (mass, force);
//! # Ok(())
//! # }
//! ```

pub mod assembly;
pub mod boundary;
pub mod cms;
pub mod condensation;
pub mod element;
pub mod error;
pub mod ffrf;
pub mod interface;
pub mod mesh;
pub mod modes;
pub mod reduction;
pub mod rotation;
pub mod solver;
pub mod sparse;
pub mod types;

pub use assembly::{assemble_solid_matrices, AssembledMatrices};
pub use boundary::{BoundaryPartition, PartitionedBlocks};
pub use cms::{
    compute_eigen_modes_with_boundary_nodes, compute_eigenmodes, compute_hurty_craig_bampton_modes,
    ComputedModes, HcbOptions, ModeBasis,
};
pub use condensation::StaticCondensation;
pub use element::Material;
pub use error::{ReductionError, ReductionResult};
pub use ffrf::{compute_force_vector, compute_mass_matrix, FfrfEvaluator, RuntimeState};
pub use interface::RigidInterfaceProjector;
pub use mesh::{ElementSet, FemModel, NodeSet, SurfacePatch};
pub use modes::{compute_post_processing_modes, PostProcessingModes};
pub use reduction::{RayleighDamping, ReducedModel};
pub use rotation::{RotationParameterization, RotationState};
pub use solver::{campbell_frequencies, eigen_frequencies_hz, EigenModes};
pub use sparse::SparseMatrixStore;
pub use types::{
    EigenSolver, ModeBasisType, NodeType, OutputVariableType, SparseBackend, StaticModeSelection,
};
