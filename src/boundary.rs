//! Partition of the full DOF set into boundary and internal DOF.
//!
//! Boundary DOF keep the order in which interface nodes are given (3 per
//! node, x/y/z). Internal DOF are the ascending complement.

use nalgebra_sparse::{CooMatrix, CsrMatrix};
use tracing::debug;

use crate::error::{check_dimension, ReductionError, ReductionResult};
use crate::sparse::SparseMatrixStore;
use crate::types::DOF_PER_NODE;

/// Location of a full-model DOF after partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DofSlot {
    Internal(usize),
    Boundary(usize),
}

/// Validated boundary/internal DOF split for one or more node interfaces.
#[derive(Debug, Clone)]
pub struct BoundaryPartition {
    interfaces: Vec<Vec<usize>>,
    boundary_dofs: Vec<usize>,
    internal_dofs: Vec<usize>,
    slots: Vec<DofSlot>,
}

/// Internal/boundary sub-blocks of the full mass and stiffness matrices.
#[derive(Debug, Clone)]
pub struct PartitionedBlocks {
    pub mii: CsrMatrix<f64>,
    pub kii: CsrMatrix<f64>,
    pub kib: CsrMatrix<f64>,
}

impl BoundaryPartition {
    /// Validate `interfaces` (node index lists) against a model with `n_dofs` DOF.
    pub fn new(n_dofs: usize, interfaces: &[Vec<usize>]) -> ReductionResult<Self> {
        if n_dofs % DOF_PER_NODE != 0 {
            return Err(ReductionError::InvalidDimension {
                context: "model DOF count (multiple of 3)",
                expected: n_dofs - n_dofs % DOF_PER_NODE,
                found: n_dofs,
            });
        }
        let n_nodes = n_dofs / DOF_PER_NODE;

        // owner[node] = interface that first listed the node
        let mut owner: Vec<Option<usize>> = vec![None; n_nodes];
        let mut boundary_dofs = Vec::new();

        for (interface, nodes) in interfaces.iter().enumerate() {
            for &node in nodes {
                if node >= n_nodes {
                    return Err(ReductionError::InvalidDimension {
                        context: "boundary node index",
                        expected: n_nodes,
                        found: node,
                    });
                }
                if let Some(first_interface) = owner[node] {
                    return Err(ReductionError::DuplicateBoundaryNode {
                        node,
                        first_interface,
                        second_interface: interface,
                    });
                }
                owner[node] = Some(interface);
                boundary_dofs.extend((0..DOF_PER_NODE).map(|k| node * DOF_PER_NODE + k));
            }
        }

        let mut slots = vec![DofSlot::Internal(0); n_dofs];
        for (j, &dof) in boundary_dofs.iter().enumerate() {
            slots[dof] = DofSlot::Boundary(j);
        }
        let mut internal_dofs = Vec::with_capacity(n_dofs - boundary_dofs.len());
        for (dof, slot) in slots.iter_mut().enumerate() {
            if let DofSlot::Internal(_) = slot {
                *slot = DofSlot::Internal(internal_dofs.len());
                internal_dofs.push(dof);
            }
        }

        debug!(
            n_dofs,
            n_boundary = boundary_dofs.len(),
            n_internal = internal_dofs.len(),
            n_interfaces = interfaces.len(),
            "boundary partition"
        );

        Ok(Self {
            interfaces: interfaces.to_vec(),
            boundary_dofs,
            internal_dofs,
            slots,
        })
    }

    pub fn n_dofs(&self) -> usize {
        self.slots.len()
    }

    pub fn interfaces(&self) -> &[Vec<usize>] {
        &self.interfaces
    }

    pub fn boundary_dofs(&self) -> &[usize] {
        &self.boundary_dofs
    }

    pub fn internal_dofs(&self) -> &[usize] {
        &self.internal_dofs
    }

    pub fn n_boundary(&self) -> usize {
        self.boundary_dofs.len()
    }

    pub fn n_internal(&self) -> usize {
        self.internal_dofs.len()
    }

    /// Extract Mii, Kii and Kib from the full matrices.
    pub fn extract_blocks(
        &self,
        mass: &SparseMatrixStore,
        stiffness: &SparseMatrixStore,
    ) -> ReductionResult<PartitionedBlocks> {
        let n = self.n_dofs();
        check_dimension("mass matrix rows", n, mass.nrows())?;
        check_dimension("mass matrix columns", n, mass.ncols())?;
        check_dimension("stiffness matrix rows", n, stiffness.nrows())?;
        check_dimension("stiffness matrix columns", n, stiffness.ncols())?;

        let ni = self.n_internal();
        let nb = self.n_boundary();

        let mut mii = CooMatrix::new(ni, ni);
        for &(row, col, value) in mass.triplets() {
            if let (DofSlot::Internal(i), DofSlot::Internal(j)) = (self.slots[row], self.slots[col]) {
                mii.push(i, j, value);
            }
        }

        let mut kii = CooMatrix::new(ni, ni);
        let mut kib = CooMatrix::new(ni, nb);
        for &(row, col, value) in stiffness.triplets() {
            match (self.slots[row], self.slots[col]) {
                (DofSlot::Internal(i), DofSlot::Internal(j)) => kii.push(i, j, value),
                (DofSlot::Internal(i), DofSlot::Boundary(j)) => kib.push(i, j, value),
                _ => {}
            }
        }

        Ok(PartitionedBlocks {
            mii: CsrMatrix::from(&mii),
            kii: CsrMatrix::from(&kii),
            kib: CsrMatrix::from(&kib),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_stiffness(n_nodes: usize) -> SparseMatrixStore {
        // springs of unit stiffness between consecutive nodes, per component
        let n = n_nodes * DOF_PER_NODE;
        let mut k = SparseMatrixStore::new(n, n);
        for e in 0..n_nodes - 1 {
            for c in 0..DOF_PER_NODE {
                let a = e * DOF_PER_NODE + c;
                let b = (e + 1) * DOF_PER_NODE + c;
                k.add_entry(a, a, 1.0).unwrap();
                k.add_entry(b, b, 1.0).unwrap();
                k.add_entry(a, b, -1.0).unwrap();
                k.add_entry(b, a, -1.0).unwrap();
            }
        }
        k
    }

    #[test]
    fn boundary_order_follows_input() {
        let partition = BoundaryPartition::new(12, &[vec![3], vec![1]]).unwrap();
        assert_eq!(partition.boundary_dofs(), &[9, 10, 11, 3, 4, 5]);
        assert_eq!(partition.internal_dofs(), &[0, 1, 2, 6, 7, 8]);
        assert_eq!(partition.n_boundary() + partition.n_internal(), 12);
    }

    #[test]
    fn duplicate_nodes_are_reported() {
        let err = BoundaryPartition::new(15, &[vec![0, 1], vec![2, 1]]).unwrap_err();
        assert!(matches!(
            err,
            ReductionError::DuplicateBoundaryNode {
                node: 1,
                first_interface: 0,
                second_interface: 1
            }
        ));

        let err = BoundaryPartition::new(15, &[vec![4, 4]]).unwrap_err();
        assert!(matches!(
            err,
            ReductionError::DuplicateBoundaryNode {
                node: 4,
                first_interface: 0,
                second_interface: 0
            }
        ));
    }

    #[test]
    fn out_of_range_node_is_rejected() {
        let err = BoundaryPartition::new(9, &[vec![3]]).unwrap_err();
        assert!(matches!(
            err,
            ReductionError::InvalidDimension { expected: 3, found: 3, .. }
        ));
    }

    #[test]
    fn blocks_match_dense_submatrices() {
        let k = chain_stiffness(4);
        let mut m = SparseMatrixStore::new(12, 12);
        for i in 0..12 {
            m.add_entry(i, i, 1.0 + i as f64).unwrap();
        }

        let partition = BoundaryPartition::new(12, &[vec![3], vec![0]]).unwrap();
        let blocks = partition.extract_blocks(&m, &k).unwrap();

        let k_dense = k.to_dense();
        let m_dense = m.to_dense();
        let kii = nalgebra_sparse::convert::serial::convert_csr_dense(&blocks.kii);
        let kib = nalgebra_sparse::convert::serial::convert_csr_dense(&blocks.kib);
        let mii = nalgebra_sparse::convert::serial::convert_csr_dense(&blocks.mii);

        for (i, &gi) in partition.internal_dofs().iter().enumerate() {
            for (j, &gj) in partition.internal_dofs().iter().enumerate() {
                assert_eq!(kii[(i, j)], k_dense[(gi, gj)]);
                assert_eq!(mii[(i, j)], m_dense[(gi, gj)]);
            }
            for (j, &gj) in partition.boundary_dofs().iter().enumerate() {
                assert_eq!(kib[(i, j)], k_dense[(gi, gj)]);
            }
        }
        assert_eq!(kib.ncols(), 6);
    }

    #[test]
    fn block_extraction_checks_sizes() {
        let partition = BoundaryPartition::new(12, &[vec![0]]).unwrap();
        let k = chain_stiffness(3);
        assert!(partition.extract_blocks(&k, &k).is_err());
    }
}
