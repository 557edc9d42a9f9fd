//! Rotation helpers shared by the estimator and the goal servers.
//!
//! Naming follows `<what>_<target frame>_<reference frame>`: `q_auv_global`
//! is the AUV frame relative to the global frame, i.e. the rotation taking
//! global basis vectors onto the AUV's. Composition is right-to-left in the
//! usual quaternion sense, `q_a_c = q_b_c * q_a_b`.

use nalgebra::UnitQuaternion;

/// Roll, pitch, yaw in degrees (fixed-axis x-y-z, yaw applied last)
pub fn from_rpy_deg(rpy: [f64; 3]) -> UnitQuaternion<f64>{
    UnitQuaternion::from_euler_angles(
        rpy[0].to_radians(),
        rpy[1].to_radians(),
        rpy[2].to_radians(),
    )
}

/// Heading component of `q` with roll and pitch discarded.
///
/// Only well defined while `q` is close to level; near +-90 deg pitch the
/// heading degenerates.
pub fn yaw_only(q: &UnitQuaternion<f64>) -> UnitQuaternion<f64>{
    let (_, _, yaw) = q.euler_angles();
    UnitQuaternion::from_euler_angles(0.0, 0.0, yaw)
}

/// Per-axis angles in degrees for the legacy `state_theta_*` topics.
///
/// Each is the leading angle of a different rotating-axis sequence
/// (x-y-z, y-x-z, z-y-x), so they describe single-axis rotations well and
/// do not combine into a consistent attitude.
pub fn compat_theta_deg(q: &UnitQuaternion<f64>) -> [f64; 3]{
    let rot = q.to_rotation_matrix();
    let m = rot.matrix();

    // R = Rx(a) Ry(b) Rz(c)
    let theta_x = (-m[(1, 2)]).atan2(m[(2, 2)]);
    // R = Ry(a) Rx(b) Rz(c)
    let theta_y = m[(0, 2)].atan2(m[(2, 2)]);
    // R = Rz(a) Ry(b) Rx(c)
    let theta_z = m[(1, 0)].atan2(m[(0, 0)]);

    [theta_x.to_degrees(), theta_y.to_degrees(), theta_z.to_degrees()]
}

/// True when `q_error` rotates by at most `tolerance` radians.
///
/// A unit quaternion for a rotation of angle `t` has scalar part
/// `cos(t / 2)`; identity sits at |w| = 1 and a half turn at w = 0. `q` and
/// `-q` are the same rotation, hence the absolute value.
pub fn is_near_identity(q_error: &UnitQuaternion<f64>, tolerance: f64) -> bool{
    q_error.w.abs() >= (tolerance / 2.0).cos()
}
