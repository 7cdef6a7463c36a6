#![allow(dead_code)]

use ffrf_cms::{ElementSet, FemModel, Material, SparseMatrixStore};
use nalgebra::{DMatrix, Vector3};

pub const STEEL: Material = Material {
    youngs_modulus: 2.1e11,
    poissons_ratio: 0.3,
    density: 7850.0,
};

/// Uniform Hex8 bar along x with one element set.
/// Node index = ix * (nny * nnz) + iy * nnz + iz.
pub fn bar_mesh(length: f64, width: f64, height: f64, nx: usize, ny: usize, nz: usize) -> FemModel {
    let (dx, dy, dz) = (length / nx as f64, width / ny as f64, height / nz as f64);
    let (nny, nnz) = (ny + 1, nz + 1);
    let node_idx = |ix: usize, iy: usize, iz: usize| ix * (nny * nnz) + iy * nnz + iz;

    let mut nodes = Vec::with_capacity((nx + 1) * nny * nnz);
    for ix in 0..=nx {
        for iy in 0..nny {
            for iz in 0..nnz {
                nodes.push(Vector3::new(ix as f64 * dx, iy as f64 * dy, iz as f64 * dz));
            }
        }
    }

    let mut elements = Vec::with_capacity(nx * ny * nz);
    for ix in 0..nx {
        for iy in 0..ny {
            for iz in 0..nz {
                elements.push([
                    node_idx(ix, iy, iz),
                    node_idx(ix + 1, iy, iz),
                    node_idx(ix + 1, iy + 1, iz),
                    node_idx(ix, iy + 1, iz),
                    node_idx(ix, iy, iz + 1),
                    node_idx(ix + 1, iy, iz + 1),
                    node_idx(ix + 1, iy + 1, iz + 1),
                    node_idx(ix, iy + 1, iz + 1),
                ]);
            }
        }
    }

    let mut model = FemModel::from_positions(nodes);
    model.elements.push(ElementSet {
        name: "bar".to_string(),
        tet4: Vec::new(),
        hex8: elements,
    });
    model
}

/// Hex8 bar with assembled mass and stiffness matrices.
pub fn solid_bar(
    length: f64,
    width: f64,
    height: f64,
    divisions: (usize, usize, usize),
    material: &Material,
) -> FemModel {
    let mut model = bar_mesh(length, width, height, divisions.0, divisions.1, divisions.2);
    model.assemble_solid_matrices(material).unwrap();
    model
}

/// Nodes of the cross-section at `x`.
pub fn face_nodes(model: &FemModel, x: f64) -> Vec<usize> {
    model
        .get_nodes_in_plane(&Vector3::new(x, 0.0, 0.0), &Vector3::x(), 1e-9)
        .unwrap()
}

fn store_from_dense(matrix: &DMatrix<f64>) -> SparseMatrixStore {
    let triplets = (0..matrix.nrows())
        .flat_map(|i| (0..matrix.ncols()).map(move |j| (i, j)))
        .filter(|&(i, j)| matrix[(i, j)] != 0.0)
        .map(|(i, j)| (i, j, matrix[(i, j)]));
    SparseMatrixStore::from_triplets(matrix.nrows(), matrix.ncols(), triplets).unwrap()
}

/// Spring stiffness factors of the x, y and z directions of the chain.
pub const CHAIN_DIRECTION_FACTORS: [f64; 3] = [1.0, 2.0, 4.0];

/// 3 unit masses on a line, grounded at node 0 and coupled by springs
/// ground-0-1-2 in every direction (stiffness k·factor).
///
/// Returns the model and its analytic eigenvalues in ascending order.
pub fn grounded_spring_chain(k: f64, m: f64) -> (FemModel, Vec<f64>) {
    let positions = (0..3).map(|i| Vector3::new(i as f64, 0.0, 0.0)).collect();
    let chain = DMatrix::from_row_slice(3, 3, &[2.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 1.0]);

    let mut stiffness = DMatrix::zeros(9, 9);
    let mut eigenvalues = Vec::new();
    for (d, factor) in CHAIN_DIRECTION_FACTORS.iter().enumerate() {
        for a in 0..3 {
            for b in 0..3 {
                stiffness[(3 * a + d, 3 * b + d)] = k * factor * chain[(a, b)];
            }
        }
        // fixed-free chain of 3 masses
        for j in 1..=3 {
            let s = ((2 * j - 1) as f64 * std::f64::consts::PI / 14.0).sin();
            eigenvalues.push(4.0 * k * factor / m * s * s);
        }
    }
    eigenvalues.sort_by(|a, b| a.total_cmp(b));

    let mass = DMatrix::identity(9, 9) * m;
    let model = FemModel::from_matrices(positions, store_from_dense(&mass), store_from_dense(&stiffness)).unwrap();
    (model, eigenvalues)
}

/// Euler-Bernoulli cantilever coefficients (βL)² of the first two bending modes.
pub const CANTILEVER_COEFFICIENTS: [f64; 2] = [3.516_015_268, 22.034_491_565];

/// Slender beam of `n_nodes` equally spaced nodes on [0, 1] along x, unit
/// bending stiffness in y, 100x stiffer in z, axially stiff, unit mass per length.
///
/// Bending uses Euler-Bernoulli beam elements whose massless nodal rotations
/// are condensed out, with the root rotation clamped. Two clamp nodes next to
/// the root make up a 3-node fixed interface; it is returned with the model.
pub fn cantilever_beam(n_nodes: usize) -> (FemModel, Vec<usize>) {
    let n_elements = n_nodes - 1;
    let h = 1.0 / n_elements as f64;
    let axial_stiffness = 1.0e4;

    // beam stiffness for (w_i, θ_i) pairs, unit EI
    let mut beam: DMatrix<f64> = DMatrix::zeros(2 * n_nodes, 2 * n_nodes);
    let ke = DMatrix::from_row_slice(
        4,
        4,
        &[
            12.0, 6.0 * h, -12.0, 6.0 * h, //
            6.0 * h, 4.0 * h * h, -6.0 * h, 2.0 * h * h, //
            -12.0, -6.0 * h, 12.0, -6.0 * h, //
            6.0 * h, 2.0 * h * h, -6.0 * h, 4.0 * h * h,
        ],
    ) / (h * h * h);
    for e in 0..n_elements {
        let dofs = [2 * e, 2 * e + 1, 2 * e + 2, 2 * e + 3];
        for a in 0..4 {
            for b in 0..4 {
                beam[(dofs[a], dofs[b])] += ke[(a, b)];
            }
        }
    }

    // condense rotations θ_1..θ_n (θ_0 clamped)
    let w: Vec<usize> = (0..n_nodes).map(|i| 2 * i).collect();
    let t: Vec<usize> = (1..n_nodes).map(|i| 2 * i + 1).collect();
    let kww = beam.select_rows(&w).select_columns(&w);
    let kwt = beam.select_rows(&w).select_columns(&t);
    let ktt = beam.select_rows(&t).select_columns(&t);
    let ktt_inv = ktt.try_inverse().unwrap();
    let bending = &kww - &kwt * ktt_inv * kwt.transpose();

    let n_total = n_nodes + 2;
    let mut stiffness = DMatrix::zeros(3 * n_total, 3 * n_total);
    let mut mass = DMatrix::zeros(3 * n_total, 3 * n_total);
    for i in 0..n_nodes {
        for j in 0..n_nodes {
            stiffness[(3 * i + 1, 3 * j + 1)] = bending[(i, j)];
            stiffness[(3 * i + 2, 3 * j + 2)] = 100.0 * bending[(i, j)];
        }
    }
    for e in 0..n_elements {
        let (a, b) = (3 * e, 3 * (e + 1));
        let k = axial_stiffness / h;
        stiffness[(a, a)] += k;
        stiffness[(b, b)] += k;
        stiffness[(a, b)] -= k;
        stiffness[(b, a)] -= k;
    }
    for i in 0..n_nodes {
        let lumped = if i == 0 || i == n_elements { 0.5 * h } else { h };
        for d in 0..3 {
            mass[(3 * i + d, 3 * i + d)] = lumped;
        }
    }

    // clamp plate nodes tied to the root
    let clamp = [n_nodes, n_nodes + 1];
    for &c in &clamp {
        for d in 0..3 {
            let (a, b) = (3 * c + d, d);
            stiffness[(a, a)] += axial_stiffness;
            stiffness[(b, b)] += axial_stiffness;
            stiffness[(a, b)] -= axial_stiffness;
            stiffness[(b, a)] -= axial_stiffness;
            mass[(a, a)] = 1e-3;
        }
    }

    let mut positions: Vec<Vector3<f64>> = (0..n_nodes).map(|i| Vector3::new(i as f64 * h, 0.0, 0.0)).collect();
    positions.push(Vector3::new(0.0, 0.1, 0.0));
    positions.push(Vector3::new(0.0, 0.0, 0.1));

    let model = FemModel::from_matrices(positions, store_from_dense(&mass), store_from_dense(&stiffness)).unwrap();
    (model, vec![0, clamp[0], clamp[1]])
}
