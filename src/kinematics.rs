//! Forward kinematics of the supported chains, used for rendering and as
//! ground truth in property tests.
//!
//! The planar evaluator computes endpoint positions as a cumulative sum of
//! per-link displacement vectors, each rotated by the cumulative orientation up
//! to that joint. Angles are measured from the positive x-axis.
//!
//! The original rendering code did not agree on a y-axis convention: the
//! open-loop rotating arm and the SCARA arm draw with `y = -L*sin(theta)`, the
//! controlled arm with `y = +L*sin(theta)`. Neither is "correct"; both are kept
//! here as explicit options and the caller chooses.

use crate::parameter_error::ParameterError;
use nalgebra::{Point3, Rotation3, Vector3};

/// Sign convention for the y-component of the planar chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YSign {
    /// `y = +L*sin(theta)`, as in the controlled single-link script.
    Up,
    /// `y = -L*sin(theta)`, as in the open-loop and SCARA scripts.
    Down,
}

/// Cartesian endpoint positions of a planar open chain, starting at the origin.
///
/// `joint_angles[k]` is the rotation of link `k` relative to link `k - 1`;
/// orientations accumulate along the chain. The returned sequence has one more
/// point than there are links (the base is included), so the 2-link case with
/// zero angles and lengths `[1.0, 0.6]` yields `[(0,0), (1,0), (1.6,0)]`.
pub fn endpoints(
    joint_angles: &[f64],
    link_lengths: &[f64],
    y_sign: YSign,
) -> Result<Vec<(f64, f64)>, ParameterError> {
    if joint_angles.len() != link_lengths.len() {
        return Err(ParameterError::InvalidLength {
            expected: link_lengths.len(),
            found: joint_angles.len(),
        });
    }

    let sign = match y_sign {
        YSign::Up => 1.0,
        YSign::Down => -1.0,
    };

    let mut points = Vec::with_capacity(link_lengths.len() + 1);
    points.push((0.0, 0.0));

    let mut orientation = 0.0;
    let (mut x, mut y) = (0.0, 0.0);
    for (angle, length) in joint_angles.iter().zip(link_lengths) {
        orientation += angle;
        x += length * orientation.cos();
        y += sign * length * orientation.sin();
        points.push((x, y));
    }
    Ok(points)
}

/// Joint positions of the 3-DOF anthropomorphic arm: a base joint rotating the
/// whole arm about the vertical axis, then two elbow-style joints in the
/// rotated plane. Returns the positions of the shoulder, elbow, and tip.
pub fn anthropomorphic_endpoints(joints: &[f64; 3], l1: f64, l2: f64) -> [Point3<f64>; 3] {
    let base = Rotation3::from_axis_angle(&Vector3::y_axis(), joints[0]);
    let upper = base * Rotation3::from_axis_angle(&Vector3::z_axis(), joints[1]);
    let lower = upper * Rotation3::from_axis_angle(&Vector3::z_axis(), joints[2]);

    let shoulder = Point3::origin();
    let elbow = shoulder + upper * (l1 * Vector3::x());
    let tip = elbow + lower * (l2 * Vector3::x());
    [shoulder, elbow, tip]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPSILON: f64 = 1e-12;

    fn assert_point_eq(found: (f64, f64), expected: (f64, f64)) {
        assert!(
            (found.0 - expected.0).abs() < EPSILON && (found.1 - expected.1).abs() < EPSILON,
            "({}, {}) is not approximately ({}, {})",
            found.0,
            found.1,
            expected.0,
            expected.1
        );
    }

    #[test]
    fn test_two_link_fully_extended() {
        let points = endpoints(&[0.0, 0.0], &[1.0, 0.6], YSign::Down).unwrap();
        assert_eq!(points.len(), 3);
        assert_point_eq(points[0], (0.0, 0.0));
        assert_point_eq(points[1], (1.0, 0.0));
        assert_point_eq(points[2], (1.6, 0.0));
    }

    #[test]
    fn test_y_sign_conventions_mirror() {
        let up = endpoints(&[FRAC_PI_2], &[1.0], YSign::Up).unwrap();
        let down = endpoints(&[FRAC_PI_2], &[1.0], YSign::Down).unwrap();
        assert_point_eq(up[1], (0.0, 1.0));
        assert_point_eq(down[1], (0.0, -1.0));
    }

    #[test]
    fn test_orientations_accumulate() {
        // First link up, second link bent another 90 degrees: the second
        // displacement points along -x.
        let points = endpoints(&[FRAC_PI_2, FRAC_PI_2], &[1.0, 0.5], YSign::Up).unwrap();
        assert_point_eq(points[1], (0.0, 1.0));
        assert_point_eq(points[2], (-0.5, 1.0));
    }

    #[test]
    fn test_mismatched_chain_description() {
        let result = endpoints(&[0.0, 0.0, 0.0], &[1.0, 0.6], YSign::Down);
        assert!(matches!(result, Err(ParameterError::InvalidLength { expected: 2, found: 3 })));
    }

    #[test]
    fn test_anthropomorphic_straight_along_x() {
        let [shoulder, elbow, tip] = anthropomorphic_endpoints(&[0.0, 0.0, 0.0], 1.0, 0.6);
        assert!((shoulder.coords.norm()).abs() < EPSILON);
        assert!((elbow - Point3::new(1.0, 0.0, 0.0)).norm() < EPSILON);
        assert!((tip - Point3::new(1.6, 0.0, 0.0)).norm() < EPSILON);
    }

    #[test]
    fn test_anthropomorphic_base_rotation() {
        // Rotating only the base joint swings the whole arm out of the xy
        // plane without changing its reach.
        let [_, elbow, tip] = anthropomorphic_endpoints(&[FRAC_PI_2, 0.0, 0.0], 1.0, 0.6);
        assert!((elbow - Point3::new(0.0, 0.0, -1.0)).norm() < 1e-12);
        assert!((tip.coords.norm() - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_anthropomorphic_elbow_lift() {
        // Lifting the shoulder joint by 90 degrees points the arm along +y.
        let [_, elbow, _] = anthropomorphic_endpoints(&[0.0, FRAC_PI_2, 0.0], 1.0, 0.6);
        assert!((elbow - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }
}
