/**
 * Bus Messages
 *
 * Plain-data schemas exchanged over topics. Geometry types mirror the
 * usual robotics message layout and convert to/from nalgebra at the edges.
 */

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3Msg{
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vector3<f64>> for Vector3Msg{
    fn from(v: Vector3<f64>) -> Self{
        Self{ x: v.x, y: v.y, z: v.z }
    }
}

impl From<Vector3Msg> for Vector3<f64>{
    fn from(v: Vector3Msg) -> Self{
        Vector3::new(v.x, v.y, v.z)
    }
}

/// Scalar-first quaternion. Defaults to identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuaternionMsg{
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for QuaternionMsg{
    fn default() -> Self{
        Self{ w: 1.0, x: 0.0, y: 0.0, z: 0.0 }
    }
}

impl From<UnitQuaternion<f64>> for QuaternionMsg{
    fn from(q: UnitQuaternion<f64>) -> Self{
        Self{ w: q.w, x: q.i, y: q.j, z: q.k }
    }
}

impl From<QuaternionMsg> for UnitQuaternion<f64>{
    /// Renormalizes, sensors rarely deliver exact unit quaternions
    fn from(q: QuaternionMsg) -> Self{
        UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseMsg{
    pub position: Vector3Msg,
    pub orientation: QuaternionMsg,
}

/// Force in newtons, torque in newton-metres, body frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WrenchMsg{
    pub force: Vector3Msg,
    pub torque: Vector3Msg,
}

/// Dead-reckoning report: DVL pose relative to the frame it was in at its last reset
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeadReckonReport{
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Degrees
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Inertial orientation in the sensor's reference frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuQuaternion{
    pub quaternion: QuaternionMsg,
}

/// Gyro rates in the IMU frame, rad/s
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImuRate{
    pub gyro: Vector3Msg,
}

/// Depth sensor reading, metres, negative underwater
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthMsg{
    pub depth: f64,
}

/// Signed force per thruster, newtons
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThrusterForces{
    pub forces: [f64; 8],
}

/// PWM pulse width per thruster, microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrusterMicroseconds{
    pub microseconds: [u16; 8],
}

impl ThrusterMicroseconds{
    pub fn uniform(value: u16) -> Self{
        Self{ microseconds: [value; 8] }
    }
}
