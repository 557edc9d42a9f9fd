//! Open-loop effort goals
//!
//! Hands the requested degrees of freedom over from the closed loops to a raw
//! force/torque. Dispatch is one-shot: every goal succeeds as soon as its
//! efforts are published, so an earlier goal is always finished by the time
//! the next one is taken.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::goal::{EffortGoal, GoalId, GoalOutcome};
use super::pid::{EffortDof, PidAxis, PidInterface, PositionAxis};

pub struct EffortServer<P: PidInterface>{
    pid: P,
    generation: GoalId,
}

impl<P: PidInterface> EffortServer<P>{
    pub fn new(pid: P) -> Self{
        Self{ pid, generation: 0 }
    }

    pub fn generation(&self) -> GoalId{
        self.generation
    }

    pub fn dispatch(&mut self, goal: &EffortGoal) -> (GoalId, GoalOutcome){
        self.generation += 1;
        let id = self.generation;
        let axes = goal.axes;

        if axes.surge || axes.sway{
            for axis in [PositionAxis::X, PositionAxis::Y]{
                self.pid.set_enabled(axis.into(), false);
                self.pid.set_position_setpoint(axis, 0.0);
            }
        }
        if axes.heave{
            self.pid.set_enabled(PositionAxis::Z.into(), false);
            self.pid.set_position_setpoint(PositionAxis::Z, 0.0);
        }
        if axes.roll || axes.pitch || axes.yaw{
            self.pid.set_enabled(PidAxis::Orientation, false);
        }

        let requested = [
            (axes.surge, EffortDof::Surge, goal.force.x),
            (axes.sway, EffortDof::Sway, goal.force.y),
            (axes.heave, EffortDof::Heave, goal.force.z),
            (axes.roll, EffortDof::Roll, goal.torque.x),
            (axes.pitch, EffortDof::Pitch, goal.torque.y),
            (axes.yaw, EffortDof::Yaw, goal.torque.z),
        ];
        for (enabled, dof, value) in requested{
            if enabled{
                self.pid.set_effort(dof, value);
            }
        }

        info!(goal = id, force = ?goal.force, torque = ?goal.torque, "effort goal dispatched");
        (id, GoalOutcome::Succeeded)
    }
}

/// Thread-safe handle; concurrent submissions are serialized
pub struct EffortClient<P: PidInterface>{
    inner: Arc<Mutex<EffortServer<P>>>,
}

impl<P: PidInterface> Clone for EffortClient<P>{
    fn clone(&self) -> Self{
        Self{ inner: Arc::clone(&self.inner) }
    }
}

impl<P: PidInterface> EffortClient<P>{
    pub fn new(server: EffortServer<P>) -> Self{
        Self{ inner: Arc::new(Mutex::new(server)) }
    }

    pub fn submit(&self, goal: &EffortGoal) -> (GoalId, GoalOutcome){
        self.inner.lock().dispatch(goal)
    }
}
