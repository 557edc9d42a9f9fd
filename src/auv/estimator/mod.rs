/**
 * State Estimator
 *
 * Keeps the latest fix per sensor and derives the pose from them on demand.
 * Nothing derived is cached: position, orientation and the world-frame
 * projection are recomputed together in `current_estimate`, so a caller
 * holding the estimator lock always gets one self-consistent snapshot.
 *
 * Sources:
 * - inertial (absolute orientation + gyro rates)
 * - dead reckoning (DVL pose relative to its own reset frame)
 * - depth (global z of the depth sensor)
 */

pub mod node;

pub use node::{EstimatorHandle, EstimatorNode};

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, info};

use crate::config::{EstimatorConfig, ZSource};
use crate::error::{GncError, Result};
use super::frames;
use super::messages::DeadReckonReport;

/// Pose of the world frame relative to global. Only changed by resets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldOffset{
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Default for WorldOffset{
    fn default() -> Self{
        Self{
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

/// Where the DVL's reset frame sits in the global frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DvlReference{
    /// No dead-reckoning fix has been accepted yet
    Uninitialized,
    /// Frozen at the first fix accepted after orientation became available
    Bootstrapped{
        q_dvlref_global: UnitQuaternion<f64>,
        pos_dvlref_global: Vector3<f64>,
    },
}

/// Latest DVL reading, relative to the DVL reset frame
#[derive(Debug, Clone, Copy, PartialEq)]
struct DvlFix{
    q_dvl_dvlref: UnitQuaternion<f64>,
    pos_dvl_dvlref: Vector3<f64>,
}

/// What happened to a dead-reckoning report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadReckonOutcome{
    /// Dropped, the reference frame cannot be located without orientation
    AwaitingOrientation,
    /// Accepted and used to freeze the reference frame
    Bootstrapped,
    Accepted,
}

/// Immutable pose snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate{
    pub position_world: Vector3<f64>,
    pub orientation_world: UnitQuaternion<f64>,
    /// Body frame, rad/s
    pub angular_velocity: Vector3<f64>,
    pub position_global: Vector3<f64>,
    pub orientation_global: UnitQuaternion<f64>,
    /// Body orientation implied by the dead-reckoning chain, for cross-checking the IMU
    pub orientation_global_from_dvl: UnitQuaternion<f64>,
    pub world_offset: WorldOffset,
}

impl PoseEstimate{
    /// Legacy per-axis angles of the world-frame orientation, degrees
    pub fn theta_world_deg(&self) -> [f64; 3]{
        frames::compat_theta_deg(&self.orientation_world)
    }
}

pub struct StateEstimator{
    // static mounting
    q_inertialref_global: UnitQuaternion<f64>,
    q_imu_mount_auv: UnitQuaternion<f64>,
    q_dvl_mount_auv: UnitQuaternion<f64>,
    pos_dvl_mount_auv: Vector3<f64>,
    pos_ds_mount_auv: Vector3<f64>,
    z_source: ZSource,

    // latest fix per source
    q_auv_global_from_imu: Option<UnitQuaternion<f64>>,
    w_auv: Vector3<f64>,
    dvl: Option<DvlFix>,
    depth: Option<f64>,

    dvl_reference: DvlReference,
    world: WorldOffset,
}

impl StateEstimator{
    pub fn new(config: &EstimatorConfig) -> Self{
        Self{
            q_inertialref_global: frames::from_rpy_deg(config.inertial_reference_rpy_deg),
            q_imu_mount_auv: frames::from_rpy_deg(config.imu_mount_rpy_deg),
            q_dvl_mount_auv: frames::from_rpy_deg(config.dvl_mount_rpy_deg),
            pos_dvl_mount_auv: Vector3::from(config.dvl_mount_position),
            pos_ds_mount_auv: Vector3::from(config.depth_mount_position),
            z_source: config.z_source,
            q_auv_global_from_imu: None,
            w_auv: Vector3::zeros(),
            dvl: None,
            depth: None,
            dvl_reference: DvlReference::Uninitialized,
            world: WorldOffset::default(),
        }
    }

    /// Absolute orientation of the IMU in its reference frame
    pub fn update_imu(&mut self, q_imu_inertialref: UnitQuaternion<f64>){
        let q_imu_global = self.q_inertialref_global * q_imu_inertialref;
        self.q_auv_global_from_imu = Some(q_imu_global * self.q_imu_mount_auv.inverse());
    }

    /// Gyro rates in the IMU frame
    pub fn update_imu_rate(&mut self, w_imu: Vector3<f64>){
        self.w_auv = self.q_imu_mount_auv * w_imu;
    }

    pub fn update_depth(&mut self, depth: f64){
        self.depth = Some(depth);
    }

    pub fn update_dead_reckon(&mut self, report: &DeadReckonReport) -> DeadReckonOutcome{
        let Some(q_auv_global) = self.q_auv_global_from_imu else{
            debug!("dead-reckoning fix dropped, no orientation yet");
            return DeadReckonOutcome::AwaitingOrientation;
        };

        let fix = DvlFix{
            q_dvl_dvlref: frames::from_rpy_deg([report.roll, report.pitch, report.yaw]),
            pos_dvl_dvlref: Vector3::new(report.x, report.y, report.z),
        };
        self.dvl = Some(fix);

        match self.dvl_reference{
            DvlReference::Bootstrapped{ .. } => DeadReckonOutcome::Accepted,
            DvlReference::Uninitialized =>{
                self.bootstrap_dvl_reference(q_auv_global, &fix);
                DeadReckonOutcome::Bootstrapped
            }
        }
    }

    // Locates the DVL reset frame in global from the current orientation.
    // x/y have no prior so the AUV is taken to be over the global origin;
    // z comes from the depth sensor when one has reported.
    fn bootstrap_dvl_reference(&mut self, q_auv_global: UnitQuaternion<f64>, fix: &DvlFix){
        let q_dvl_global = q_auv_global * self.q_dvl_mount_auv;
        let q_dvlref_global = q_dvl_global * fix.q_dvl_dvlref.inverse();

        let z_prior = self.depth_z(&q_auv_global).unwrap_or(0.0);
        let pos_auv_global = Vector3::new(0.0, 0.0, z_prior);
        let pos_dvl_auv_global = q_auv_global * self.pos_dvl_mount_auv;
        let pos_dvl_dvlref_global = q_dvlref_global * fix.pos_dvl_dvlref;
        let pos_dvlref_global = pos_auv_global + pos_dvl_auv_global - pos_dvl_dvlref_global;

        info!(
            x = pos_dvlref_global.x,
            y = pos_dvlref_global.y,
            z = pos_dvlref_global.z,
            yaw_deg = q_dvlref_global.euler_angles().2.to_degrees(),
            "dead-reckoning reference frame bootstrapped"
        );
        self.dvl_reference = DvlReference::Bootstrapped{ q_dvlref_global, pos_dvlref_global };
    }

    pub fn dvl_reference(&self) -> DvlReference{
        self.dvl_reference
    }

    pub fn world_offset(&self) -> WorldOffset{
        self.world
    }

    // global z of the AUV origin according to the depth sensor
    fn depth_z(&self, q_auv_global: &UnitQuaternion<f64>) -> Option<f64>{
        let depth = self.depth?;
        let pos_ds_auv_global = q_auv_global * self.pos_ds_mount_auv;
        Some(depth - pos_ds_auv_global.z)
    }

    fn global_pose(&self) -> Option<(Vector3<f64>, UnitQuaternion<f64>, UnitQuaternion<f64>)>{
        let q_auv_global = self.q_auv_global_from_imu?;
        let fix = self.dvl?;
        let DvlReference::Bootstrapped{ q_dvlref_global, pos_dvlref_global } = self.dvl_reference else{
            return None;
        };

        let q_dvl_global = q_dvlref_global * fix.q_dvl_dvlref;
        let q_auv_global_from_dvl = q_dvl_global * self.q_dvl_mount_auv.inverse();

        let pos_dvl_global = pos_dvlref_global + q_dvlref_global * fix.pos_dvl_dvlref;
        let pos_dvl_auv_global = q_auv_global * self.pos_dvl_mount_auv;
        let mut pos_auv_global = pos_dvl_global - pos_dvl_auv_global;

        if self.z_source == ZSource::Depth{
            pos_auv_global.z = self.depth_z(&q_auv_global)?;
        }

        Some((pos_auv_global, q_auv_global, q_auv_global_from_dvl))
    }

    /// Snapshot of the fused pose, `None` until every required source has reported
    pub fn current_estimate(&self) -> Option<PoseEstimate>{
        let (position_global, orientation_global, orientation_global_from_dvl) = self.global_pose()?;

        let q_global_world = self.world.orientation.inverse();
        let position_world = q_global_world * (position_global - self.world.position);
        let orientation_world = q_global_world * orientation_global;

        Some(PoseEstimate{
            position_world,
            orientation_world,
            angular_velocity: self.w_auv,
            position_global,
            orientation_global,
            orientation_global_from_dvl,
            world_offset: self.world,
        })
    }

    /// Snap the world frame onto the AUV (position and orientation)
    pub fn reset_full(&mut self) -> Result<WorldOffset>{
        let (position, orientation, _) = self.global_pose().ok_or(GncError::EstimateNotReady)?;
        self.world = WorldOffset{ position, orientation };
        info!(x = position.x, y = position.y, z = position.z, "world frame reset (full)");
        Ok(self.world)
    }

    /// Snap the world frame onto the AUV's x/y and heading, keeping world z
    /// and the global horizontal plane. Assumes the AUV is roughly level.
    pub fn reset_planar(&mut self) -> Result<WorldOffset>{
        let (position, orientation, _) = self.global_pose().ok_or(GncError::EstimateNotReady)?;
        self.world.position.x = position.x;
        self.world.position.y = position.y;
        self.world.orientation = frames::yaw_only(&orientation);
        info!(x = position.x, y = position.y, "world frame reset (planar)");
        Ok(self.world)
    }
}
