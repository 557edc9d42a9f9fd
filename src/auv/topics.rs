//! Topic names shared by every component on the bus

// sensor inputs
pub const DEAD_RECKON_REPORT: &str = "/dead_reckon_report";
pub const IMU_QUATERNION: &str = "/sbg/ekf_quat";
pub const IMU_RATE: &str = "/sbg/imu_data";
pub const DEPTH: &str = "/depth";

// reset triggers, payload-free
pub const RESET_STATE_FULL: &str = "/reset_state_full";
pub const RESET_STATE_PLANAR: &str = "/reset_state_planar";

// estimator outputs
pub const POSE: &str = "/state/pose";
pub const POSE_WORLD: &str = "/state/pose_world";
pub const ANGULAR_VELOCITY: &str = "/state/angular_velocity";
pub const STATE_X: &str = "/state/x";
pub const STATE_Y: &str = "/state/y";
pub const STATE_Z: &str = "/state/z";
pub const STATE_THETA_X: &str = "/state/theta/x";
pub const STATE_THETA_Y: &str = "/state/theta/y";
pub const STATE_THETA_Z: &str = "/state/theta/z";

// external PID loops
pub const PID_X_ENABLE: &str = "/controls/pid/x/enable";
pub const PID_Y_ENABLE: &str = "/controls/pid/y/enable";
pub const PID_Z_ENABLE: &str = "/controls/pid/z/enable";
pub const PID_QUAT_ENABLE: &str = "/controls/pid/quat/enable";
pub const PID_X_SETPOINT: &str = "/controls/pid/x/setpoint";
pub const PID_Y_SETPOINT: &str = "/controls/pid/y/setpoint";
pub const PID_Z_SETPOINT: &str = "/controls/pid/z/setpoint";
pub const PID_QUAT_SETPOINT: &str = "/controls/pid/quat/setpoint";

// open-loop effort overrides
pub const EFFORT_SURGE: &str = "/controls/force/surge";
pub const EFFORT_SWAY: &str = "/controls/force/sway";
pub const EFFORT_HEAVE: &str = "/controls/force/heave";
pub const EFFORT_ROLL: &str = "/controls/torque/roll";
pub const EFFORT_PITCH: &str = "/controls/torque/pitch";
pub const EFFORT_YAW: &str = "/controls/torque/yaw";

// propulsion
pub const EFFORT: &str = "/controls/effort";
pub const THRUSTER_FORCES: &str = "/propulsion/forces";
pub const THRUSTER_MICROSECONDS: &str = "/propulsion/microseconds";
