//! Rotation parameterizations of the floating reference frame.
//!
//! Each parameterization provides the rotation matrix A (local to global),
//! the local angular velocity matrix G (ω_local = G·ṗ) and, where it does
//! not vanish, the term Ġ·ṗ.

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3, Matrix3xX, Rotation3, Vector3, Vector4};

use crate::error::{check_dimension, ReductionError, ReductionResult};

/// Closed set of supported rotation parameterizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationParameterization {
    /// 4 Euler parameters (unit quaternion), constrained externally.
    EulerParameters,
    /// Rotation vector in local Lie-group form: rates are the local angular velocity.
    RotationVector,
    /// Tait-Bryan angles, A = Rx·Ry·Rz.
    TaitBryanXyz,
}

impl RotationParameterization {
    /// Number of rotation coordinates.
    pub fn n_params(self) -> usize {
        match self {
            RotationParameterization::EulerParameters => 4,
            RotationParameterization::RotationVector | RotationParameterization::TaitBryanXyz => 3,
        }
    }
}

impl FromStr for RotationParameterization {
    type Err = ReductionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        let tag = tag.strip_prefix("NodeType.").unwrap_or(tag);
        match tag {
            "RotationEulerParameters" | "EulerParameters" => Ok(RotationParameterization::EulerParameters),
            "RotationRotationVector" | "RotationVector" => Ok(RotationParameterization::RotationVector),
            "RotationRxyz" | "RotationXYZ" | "TaitBryanXyz" => Ok(RotationParameterization::TaitBryanXyz),
            _ => Err(ReductionError::UnsupportedRotationParameterization(s.to_string())),
        }
    }
}

impl fmt::Display for RotationParameterization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationParameterization::EulerParameters => "RotationEulerParameters",
            RotationParameterization::RotationVector => "RotationRotationVector",
            RotationParameterization::TaitBryanXyz => "RotationRxyz",
        };
        f.write_str(name)
    }
}

/// Rotation coordinates and their time derivatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotationState {
    EulerParameters { p: Vector4<f64>, p_t: Vector4<f64> },
    RotationVector { v: Vector3<f64>, v_t: Vector3<f64> },
    TaitBryanXyz { angles: Vector3<f64>, angles_t: Vector3<f64> },
}

/// Skew-symmetric cross product matrix: skew(a)·b = a × b.
pub fn skew(a: &Vector3<f64>) -> Matrix3<f64> {
    a.cross_matrix()
}

impl RotationState {
    /// Zero rotation at rest.
    pub fn identity(parameterization: RotationParameterization) -> Self {
        match parameterization {
            RotationParameterization::EulerParameters => RotationState::EulerParameters {
                p: Vector4::new(1.0, 0.0, 0.0, 0.0),
                p_t: Vector4::zeros(),
            },
            RotationParameterization::RotationVector => RotationState::RotationVector {
                v: Vector3::zeros(),
                v_t: Vector3::zeros(),
            },
            RotationParameterization::TaitBryanXyz => RotationState::TaitBryanXyz {
                angles: Vector3::zeros(),
                angles_t: Vector3::zeros(),
            },
        }
    }

    /// Build a state from flat coordinate and rate slices.
    pub fn from_coordinates(
        parameterization: RotationParameterization,
        coordinates: &[f64],
        rates: &[f64],
    ) -> ReductionResult<Self> {
        let n = parameterization.n_params();
        check_dimension("rotation coordinates", n, coordinates.len())?;
        check_dimension("rotation rates", n, rates.len())?;
        Ok(match parameterization {
            RotationParameterization::EulerParameters => RotationState::EulerParameters {
                p: Vector4::from_column_slice(coordinates),
                p_t: Vector4::from_column_slice(rates),
            },
            RotationParameterization::RotationVector => RotationState::RotationVector {
                v: Vector3::from_column_slice(coordinates),
                v_t: Vector3::from_column_slice(rates),
            },
            RotationParameterization::TaitBryanXyz => RotationState::TaitBryanXyz {
                angles: Vector3::from_column_slice(coordinates),
                angles_t: Vector3::from_column_slice(rates),
            },
        })
    }

    pub fn parameterization(&self) -> RotationParameterization {
        match self {
            RotationState::EulerParameters { .. } => RotationParameterization::EulerParameters,
            RotationState::RotationVector { .. } => RotationParameterization::RotationVector,
            RotationState::TaitBryanXyz { .. } => RotationParameterization::TaitBryanXyz,
        }
    }

    pub fn n_params(&self) -> usize {
        self.parameterization().n_params()
    }

    /// Rotation matrix A mapping local to global vectors.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        match self {
            RotationState::EulerParameters { p, .. } => {
                let (p0, p1, p2, p3) = (p[0], p[1], p[2], p[3]);
                Matrix3::new(
                    -2.0 * p3 * p3 - 2.0 * p2 * p2 + 1.0,
                    -2.0 * p3 * p0 + 2.0 * p2 * p1,
                    2.0 * p3 * p1 + 2.0 * p2 * p0,
                    2.0 * p3 * p0 + 2.0 * p2 * p1,
                    -2.0 * p3 * p3 - 2.0 * p1 * p1 + 1.0,
                    2.0 * p3 * p2 - 2.0 * p1 * p0,
                    -2.0 * p2 * p0 + 2.0 * p3 * p1,
                    2.0 * p3 * p2 + 2.0 * p1 * p0,
                    -2.0 * p2 * p2 - 2.0 * p1 * p1 + 1.0,
                )
            }
            RotationState::RotationVector { v, .. } => Rotation3::new(*v).into_inner(),
            RotationState::TaitBryanXyz { angles, .. } => {
                let (s0, c0) = angles[0].sin_cos();
                let (s1, c1) = angles[1].sin_cos();
                let (s2, c2) = angles[2].sin_cos();
                let rx = Matrix3::new(1.0, 0.0, 0.0, 0.0, c0, -s0, 0.0, s0, c0);
                let ry = Matrix3::new(c1, 0.0, s1, 0.0, 1.0, 0.0, -s1, 0.0, c1);
                let rz = Matrix3::new(c2, -s2, 0.0, s2, c2, 0.0, 0.0, 0.0, 1.0);
                rx * ry * rz
            }
        }
    }

    /// Local angular velocity matrix G (3 × nRot).
    pub fn g_local(&self) -> Matrix3xX<f64> {
        match self {
            RotationState::EulerParameters { p, .. } => {
                let (p0, p1, p2, p3) = (p[0], p[1], p[2], p[3]);
                Matrix3xX::from_row_slice(&[
                    -2.0 * p1, 2.0 * p0, 2.0 * p3, -2.0 * p2, //
                    -2.0 * p2, -2.0 * p3, 2.0 * p0, 2.0 * p1, //
                    -2.0 * p3, 2.0 * p2, -2.0 * p1, 2.0 * p0,
                ])
            }
            RotationState::RotationVector { .. } => Matrix3xX::identity(3),
            RotationState::TaitBryanXyz { angles, .. } => {
                let (s1, c1) = angles[1].sin_cos();
                let (s2, c2) = angles[2].sin_cos();
                Matrix3xX::from_row_slice(&[
                    c1 * c2, s2, 0.0, //
                    -c1 * s2, c2, 0.0, //
                    s1, 0.0, 1.0,
                ])
            }
        }
    }

    /// Angular velocity in the local frame, ω = G·ṗ.
    pub fn angular_velocity_local(&self) -> Vector3<f64> {
        match self {
            RotationState::EulerParameters { p_t, .. } => self.g_local() * p_t,
            RotationState::RotationVector { v_t, .. } => *v_t,
            RotationState::TaitBryanXyz { angles_t, .. } => self.g_local() * angles_t,
        }
    }

    /// Ġ·ṗ for parameterizations where it does not vanish identically.
    ///
    /// For Euler parameters G is linear in p, so Ġ·ṗ = G(ṗ)·ṗ = 0.
    pub fn g_local_t_rates(&self) -> Option<Vector3<f64>> {
        match self {
            RotationState::TaitBryanXyz { angles, angles_t } => {
                let (s1, c1) = angles[1].sin_cos();
                let (s2, c2) = angles[2].sin_cos();
                let (r1, r2) = (angles_t[1], angles_t[2]);
                let g_t = Matrix3::new(
                    -s1 * c2 * r1 - c1 * s2 * r2,
                    c2 * r2,
                    0.0,
                    s1 * s2 * r1 - c1 * c2 * r2,
                    -s2 * r2,
                    0.0,
                    c1 * r1,
                    0.0,
                    0.0,
                );
                Some(g_t * angles_t)
            }
            RotationState::EulerParameters { .. } | RotationState::RotationVector { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;
    const FD_TOL: f64 = 1e-7;

    fn vee(w: &Matrix3<f64>) -> Vector3<f64> {
        Vector3::new(w[(2, 1)], w[(0, 2)], w[(1, 0)])
    }

    fn samples() -> Vec<RotationState> {
        let p = Vector4::new(0.8, 0.2, -0.4, 0.4).normalize();
        // tangent to the unit sphere
        let raw = Vector4::new(0.3, -0.5, 0.7, 0.1);
        let p_t = raw - p * p.dot(&raw);
        vec![
            RotationState::EulerParameters { p, p_t },
            RotationState::RotationVector {
                v: Vector3::new(0.3, -0.7, 1.1),
                v_t: Vector3::new(0.2, 0.5, -0.4),
            },
            RotationState::TaitBryanXyz {
                angles: Vector3::new(0.4, -0.9, 1.3),
                angles_t: Vector3::new(-0.6, 0.8, 0.25),
            },
        ]
    }

    /// Advance coordinates along their rates by `h`.
    fn advance(state: &RotationState, h: f64) -> RotationState {
        match *state {
            RotationState::EulerParameters { p, p_t } => RotationState::EulerParameters { p: p + p_t * h, p_t },
            RotationState::RotationVector { v, v_t } => RotationState::RotationVector { v: v + v_t * h, v_t },
            RotationState::TaitBryanXyz { angles, angles_t } => RotationState::TaitBryanXyz {
                angles: angles + angles_t * h,
                angles_t,
            },
        }
    }

    #[test]
    fn rotation_matrices_are_orthonormal() {
        for state in samples() {
            let a = state.rotation_matrix();
            assert!((a.transpose() * a - Matrix3::identity()).norm() < TOL);
            assert!((a.determinant() - 1.0).abs() < TOL);
        }
    }

    #[test]
    fn g_local_matches_finite_difference_angular_velocity() {
        let h = 1e-6;
        for state in samples() {
            if state.parameterization() == RotationParameterization::RotationVector {
                continue;
            }
            let a = state.rotation_matrix();
            let a_t = (advance(&state, h).rotation_matrix() - advance(&state, -h).rotation_matrix()) / (2.0 * h);
            let omega_fd = vee(&(a.transpose() * a_t));
            assert!((state.angular_velocity_local() - omega_fd).norm() < FD_TOL);
        }
    }

    #[test]
    fn rotation_vector_uses_exponential_map() {
        let v = Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let state = RotationState::RotationVector { v, v_t: Vector3::new(1.0, 2.0, 3.0) };
        let a = state.rotation_matrix();
        assert!((a * Vector3::x() - Vector3::y()).norm() < TOL);
        assert_eq!(state.angular_velocity_local(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(state.g_local().ncols(), 3);
        assert!(state.g_local_t_rates().is_none());
    }

    #[test]
    fn tait_bryan_g_t_matches_finite_difference() {
        let h = 1e-6;
        let state = samples()[2];
        let RotationState::TaitBryanXyz { angles_t, .. } = state else {
            unreachable!()
        };
        let g_t = (advance(&state, h).g_local() - advance(&state, -h).g_local()) / (2.0 * h);
        let expected = g_t * angles_t;
        let actual = state.g_local_t_rates().unwrap();
        assert!((actual - expected).norm() < FD_TOL);
    }

    #[test]
    fn identity_and_coordinates() {
        for param in [
            RotationParameterization::EulerParameters,
            RotationParameterization::RotationVector,
            RotationParameterization::TaitBryanXyz,
        ] {
            let state = RotationState::identity(param);
            assert_eq!(state.rotation_matrix(), Matrix3::identity());
            assert_eq!(state.g_local().ncols(), param.n_params());
        }

        let state = RotationState::from_coordinates(
            RotationParameterization::EulerParameters,
            &[1.0, 0.0, 0.0, 0.0],
            &[0.0; 4],
        )
        .unwrap();
        assert_eq!(state.n_params(), 4);
        assert!(RotationState::from_coordinates(RotationParameterization::TaitBryanXyz, &[0.0; 4], &[0.0; 3]).is_err());
    }

    #[test]
    fn parses_tags() {
        assert_eq!(
            "NodeType.RotationEulerParameters".parse::<RotationParameterization>().unwrap(),
            RotationParameterization::EulerParameters
        );
        assert_eq!(
            "RotationRotationVector".parse::<RotationParameterization>().unwrap(),
            RotationParameterization::RotationVector
        );
        assert_eq!(
            RotationParameterization::TaitBryanXyz.to_string().parse::<RotationParameterization>().unwrap(),
            RotationParameterization::TaitBryanXyz
        );
        assert!(matches!(
            "RotationRxyzw".parse::<RotationParameterization>(),
            Err(ReductionError::UnsupportedRotationParameterization(tag)) if tag == "RotationRxyzw"
        ));
    }

    #[test]
    fn skew_is_cross_product() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(-0.5, 0.25, 2.0);
        assert!((skew(&a) * b - a.cross(&b)).norm() < TOL);
    }
}
