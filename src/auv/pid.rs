/**
 * External PID contract
 *
 * The per-axis PID loops live outside this crate. The goal servers only
 * toggle them, move their setpoints and override the open-loop effort that
 * is summed with their output.
 */

use nalgebra::UnitQuaternion;

use crate::pubsub::{Publisher, TopicRegistry};
use super::messages::QuaternionMsg;
use super::topics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionAxis{
    X,
    Y,
    Z,
}

impl PositionAxis{
    pub const ALL: [PositionAxis; 3] = [PositionAxis::X, PositionAxis::Y, PositionAxis::Z];

    pub fn index(&self) -> usize{
        match self{
            PositionAxis::X => 0,
            PositionAxis::Y => 1,
            PositionAxis::Z => 2,
        }
    }
}

/// One closed-loop controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PidAxis{
    Position(PositionAxis),
    Orientation,
}

impl From<PositionAxis> for PidAxis{
    fn from(axis: PositionAxis) -> Self{
        PidAxis::Position(axis)
    }
}

/// Open-loop effort channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffortDof{
    Surge,
    Sway,
    Heave,
    Roll,
    Pitch,
    Yaw,
}

impl EffortDof{
    pub const ROTATION: [EffortDof; 3] = [EffortDof::Roll, EffortDof::Pitch, EffortDof::Yaw];

    fn index(&self) -> usize{
        *self as usize
    }
}

pub trait PidInterface: Send{
    fn set_enabled(&mut self, axis: PidAxis, enabled: bool);
    fn set_position_setpoint(&mut self, axis: PositionAxis, value: f64);
    fn set_orientation_setpoint(&mut self, value: UnitQuaternion<f64>);
    fn set_effort(&mut self, dof: EffortDof, value: f64);
}

/// PID contract over the topic bus
pub struct BusPidInterface{
    position_enable: [Publisher<bool>; 3],
    orientation_enable: Publisher<bool>,
    position_setpoint: [Publisher<f64>; 3],
    orientation_setpoint: Publisher<QuaternionMsg>,
    effort: [Publisher<f64>; 6],
}

impl BusPidInterface{
    pub fn new(registry: &TopicRegistry) -> Self{
        Self{
            position_enable: [
                registry.publisher(topics::PID_X_ENABLE),
                registry.publisher(topics::PID_Y_ENABLE),
                registry.publisher(topics::PID_Z_ENABLE),
            ],
            orientation_enable: registry.publisher(topics::PID_QUAT_ENABLE),
            position_setpoint: [
                registry.publisher(topics::PID_X_SETPOINT),
                registry.publisher(topics::PID_Y_SETPOINT),
                registry.publisher(topics::PID_Z_SETPOINT),
            ],
            orientation_setpoint: registry.publisher(topics::PID_QUAT_SETPOINT),
            effort: [
                registry.publisher(topics::EFFORT_SURGE),
                registry.publisher(topics::EFFORT_SWAY),
                registry.publisher(topics::EFFORT_HEAVE),
                registry.publisher(topics::EFFORT_ROLL),
                registry.publisher(topics::EFFORT_PITCH),
                registry.publisher(topics::EFFORT_YAW),
            ],
        }
    }
}

impl PidInterface for BusPidInterface{
    fn set_enabled(&mut self, axis: PidAxis, enabled: bool){
        match axis{
            PidAxis::Position(p) => self.position_enable[p.index()].publish(enabled),
            PidAxis::Orientation => self.orientation_enable.publish(enabled),
        };
    }

    fn set_position_setpoint(&mut self, axis: PositionAxis, value: f64){
        self.position_setpoint[axis.index()].publish(value);
    }

    fn set_orientation_setpoint(&mut self, value: UnitQuaternion<f64>){
        self.orientation_setpoint.publish(value.into());
    }

    fn set_effort(&mut self, dof: EffortDof, value: f64){
        self.effort[dof.index()].publish(value);
    }
}
