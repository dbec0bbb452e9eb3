// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rotation helpers shared by the evaluator and rig solvers.
//!
//! Euler angles are in degrees with `xyz` rotate order: X is applied first,
//! then Y, then Z (`R = Rz * Ry * Rx` in column-vector form).

use glam::{Mat3, Mat4, Quat, Vec3};

/// Tolerance used for near-zero checks
pub const EPSILON: f32 = 1.0e-6;

/// Quaternion from `xyz` euler angles in degrees
pub fn quat_from_euler_deg(euler: Vec3) -> Quat {
    let r = Vec3::new(
        euler.x.to_radians(),
        euler.y.to_radians(),
        euler.z.to_radians(),
    );
    Quat::from_rotation_z(r.z) * Quat::from_rotation_y(r.y) * Quat::from_rotation_x(r.x)
}

/// `xyz` euler angles in degrees from a quaternion
pub fn euler_deg_from_quat(q: Quat) -> Vec3 {
    let m = Mat3::from_quat(q.normalize());
    // m.col(j)[i] is row i, column j
    let r20 = m.col(0).z;
    let (x, y, z) = if r20.abs() < 1.0 - 1.0e-6 {
        let y = (-r20).asin();
        let x = m.col(1).z.atan2(m.col(2).z);
        let z = m.col(0).y.atan2(m.col(0).x);
        (x, y, z)
    } else {
        // Gimbal lock: fold all remaining rotation into X
        let y = if r20 < 0.0 {
            std::f32::consts::FRAC_PI_2
        } else {
            -std::f32::consts::FRAC_PI_2
        };
        let x = (-m.col(2).y).atan2(m.col(1).y);
        (x, y, 0.0)
    };
    Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees())
}

/// Local matrix from translate / euler (degrees) / scale channels
pub fn compose_trs(translate: Vec3, rotate_deg: Vec3, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, quat_from_euler_deg(rotate_deg), translate)
}

/// Translate / euler (degrees) / scale channels from a matrix
pub fn decompose_trs(m: Mat4) -> (Vec3, Vec3, Vec3) {
    let (scale, rotation, translation) = m.to_scale_rotation_translation();
    (translation, euler_deg_from_quat(rotation), scale)
}

/// Multiply matrices child-first: `product([a, b, c]) == c * b * a`.
///
/// This is the order in which a child matrix is followed by its parents,
/// so `product([local, parent_world])` is the child's world matrix.
pub fn product(matrices: &[Mat4]) -> Mat4 {
    matrices
        .iter()
        .fold(Mat4::IDENTITY, |acc, m| *m * acc)
}

/// Whether two matrices match within `tolerance`
pub fn matrices_close(a: Mat4, b: Mat4, tolerance: f32) -> bool {
    a.abs_diff_eq(b, tolerance)
}
