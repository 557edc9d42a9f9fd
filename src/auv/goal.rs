//! Goal requests and outcomes for the motion and effort servers

use nalgebra::{UnitQuaternion, Vector3};

/// Monotonic per-server goal generation
pub type GoalId = u64;

/// Which closed-loop axes a motion goal constrains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxisMask{
    pub x: bool,
    pub y: bool,
    pub z: bool,
    pub orientation: bool,
}

impl AxisMask{
    pub const ALL: AxisMask = AxisMask{ x: true, y: true, z: true, orientation: true };

    pub fn position(&self) -> [bool; 3]{
        [self.x, self.y, self.z]
    }
}

/// How the target of a motion goal is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameMode{
    /// Target is a world-frame pose
    #[default]
    Absolute,
    /// Target position is a body-frame vector, rotated into the world frame
    Local,
    /// Target is a displacement from the current setpoint (or estimate)
    Relative,
    /// Body-frame displacement
    LocalRelative,
}

impl FrameMode{
    pub fn from_flags(local: bool, displace: bool) -> Self{
        match (local, displace){
            (false, false) => FrameMode::Absolute,
            (true, false) => FrameMode::Local,
            (false, true) => FrameMode::Relative,
            (true, true) => FrameMode::LocalRelative,
        }
    }

    pub fn is_local(&self) -> bool{
        matches!(self, FrameMode::Local | FrameMode::LocalRelative)
    }

    pub fn is_relative(&self) -> bool{
        matches!(self, FrameMode::Relative | FrameMode::LocalRelative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionGoal{
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub axes: AxisMask,
    pub mode: FrameMode,
}

impl MotionGoal{
    /// Absolute goal on every axis
    pub fn pose(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self{
        Self{ position, orientation, axes: AxisMask::ALL, mode: FrameMode::Absolute }
    }

    pub fn with_axes(mut self, axes: AxisMask) -> Self{
        self.axes = axes;
        self
    }

    pub fn with_mode(mut self, mode: FrameMode) -> Self{
        self.mode = mode;
        self
    }
}

/// Which open-loop degrees of freedom an effort goal drives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffortMask{
    pub surge: bool,
    pub sway: bool,
    pub heave: bool,
    pub roll: bool,
    pub pitch: bool,
    pub yaw: bool,
}

/// Raw body-frame force/torque to apply, bypassing the closed loops
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffortGoal{
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
    pub axes: EffortMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason{
    /// No pose estimate existed when the goal started
    NoPoseEstimate,
    Cancelled,
    /// Server stopped while the goal was active
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalOutcome{
    Succeeded,
    Aborted(AbortReason),
    /// Superseded by a newer goal
    Preempted,
}

impl GoalOutcome{
    /// Result flag reported to the requester
    pub fn success(&self) -> bool{
        matches!(self, GoalOutcome::Succeeded)
    }
}
