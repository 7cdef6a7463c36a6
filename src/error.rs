//! Error types for model reduction.

use thiserror::Error;

/// Errors raised by the offline reduction pipeline.
///
/// Each variant identifies the offending node, interface or matrix so the
/// modeling mistake can be located. The FFRF hot path never returns these.
#[derive(Debug, Error)]
pub enum ReductionError {
    /// Matrix, vector or index sizes are inconsistent.
    #[error("invalid dimension in {context}: expected {expected}, found {found}")]
    InvalidDimension {
        /// Where the mismatch was detected.
        context: &'static str,
        /// Expected size or bound.
        expected: usize,
        /// Size or index actually supplied.
        found: usize,
    },

    /// A node appears in more than one boundary interface (or twice in one).
    #[error("boundary node {node} appears in interface {first_interface} and interface {second_interface}")]
    DuplicateBoundaryNode {
        /// The duplicated node index.
        node: usize,
        /// Interface where the node was first listed.
        first_interface: usize,
        /// Interface where it was listed again.
        second_interface: usize,
    },

    /// An interface has fewer than 3 non-collinear nodes.
    #[error("interface {interface} needs at least 3 non-collinear nodes for a rigid interface, got {count} nodes")]
    InsufficientInterfaceNodes {
        /// Interface index.
        interface: usize,
        /// Number of nodes in the interface.
        count: usize,
    },

    /// The internal stiffness block Kii is singular.
    #[error("internal stiffness block is singular (smallest relative pivot {min_pivot:e}); the internal sub-model is unconstrained")]
    SingularCondensation {
        /// Smallest relative pivot observed, 0 if the factorization failed outright.
        min_pivot: f64,
    },

    /// Unknown rotation parameterization tag.
    #[error("unsupported rotation parameterization: {0}")]
    UnsupportedRotationParameterization(String),

    /// The eigenvalue solver could not produce eigenpairs.
    #[error("eigenvalue solver failed: {0}")]
    EigenSolverFailed(String),

    /// A mesh node is not referenced by any element during nodal averaging.
    #[error("node {node} is not connected to any element")]
    UnconnectedNode {
        /// The unconnected node index.
        node: usize,
    },

    /// Element geometry has a vanishing or negative Jacobian.
    #[error("element {element} is degenerate")]
    DegenerateElement {
        /// Element index counted over all element sets.
        element: usize,
    },

    /// Operation requires a single node set of `Position` type.
    #[error("invalid node configuration: {0}")]
    InvalidNodeType(String),

    /// Operation requires a previously computed mode basis.
    #[error("mode basis has not been computed")]
    MissingModeBasis,

    /// No node was found at the requested point.
    #[error("no node found at [{x}, {y}, {z}]")]
    NodeNotFound { x: f64, y: f64, z: f64 },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for reduction operations.
pub type ReductionResult<T> = Result<T, ReductionError>;

/// Check a size against its expected value.
pub(crate) fn check_dimension(
    context: &'static str,
    expected: usize,
    found: usize,
) -> ReductionResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(ReductionError::InvalidDimension {
            context,
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_identify_offenders() {
        let err = ReductionError::DuplicateBoundaryNode {
            node: 12,
            first_interface: 0,
            second_interface: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("interface 0"));
        assert!(msg.contains("interface 2"));
    }

    #[test]
    fn check_dimension_reports_context() {
        assert!(check_dimension("mass matrix", 9, 9).is_ok());
        let err = check_dimension("mass matrix", 9, 6).unwrap_err();
        assert!(matches!(
            err,
            ReductionError::InvalidDimension {
                expected: 9,
                found: 6,
                ..
            }
        ));
    }
}
