/**
 * AUV GNC
 *
 * Guidance, navigation and control for the vehicle, all in one process on
 * one topic registry:
 * - estimator: fuses inertial, dead-reckoning and depth fixes into a pose
 * - motion / effort: goal servers driving the external PID loops
 * - thrust_allocator: wrench to per-thruster PWM
 */

pub mod messages;
pub mod topics;
pub mod frames;
pub mod estimator;
pub mod goal;
pub mod pid;
pub mod motion;
pub mod effort;
pub mod thrust_allocator;
pub mod controller;

pub use controller::{AuvController, SerialSettings};
pub use estimator::{PoseEstimate, StateEstimator};
pub use goal::{AbortReason, AxisMask, EffortGoal, EffortMask, FrameMode, GoalId, GoalOutcome, MotionGoal};
pub use motion::{GoalHandle, MotionGoalClient, MotionGoalController, MotionGoalServer};
pub use effort::{EffortClient, EffortServer};
pub use thrust_allocator::ThrustAllocator;
