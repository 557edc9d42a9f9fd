/**
 * GNC Configuration
 *
 * One TOML file with a section per component. Every field has a calibrated
 * default so a partial file only overrides what it names.
 */

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GncError, Result};

/// Standard gravity, used to turn kgf thruster ratings into newtons
const G: f64 = 9.81;

/// T200 at 14V
const T200_MAX_FORWARD_KGF: f64 = 4.52;
const T200_MAX_BACKWARD_KGF: f64 = 3.52;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GncConfig{
    pub estimator: EstimatorConfig,
    pub controls: ControlsConfig,
    pub propulsion: PropulsionConfig,
}

/// Which source feeds the z component of the global position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZSource{
    #[default]
    DeadReckoning,
    Depth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig{
    pub publish_period_ms: u64,
    pub poll_period_ms: u64,
    pub z_source: ZSource,
    /// Frame the inertial sensor reports in, relative to global (roll, pitch, yaw)
    pub inertial_reference_rpy_deg: [f64; 3],
    pub imu_mount_rpy_deg: [f64; 3],
    pub dvl_mount_rpy_deg: [f64; 3],
    pub dvl_mount_position: [f64; 3],
    pub depth_mount_position: [f64; 3],
}

impl Default for EstimatorConfig{
    fn default() -> Self{
        Self{
            publish_period_ms: 100,
            poll_period_ms: 5,
            z_source: ZSource::DeadReckoning,
            //NED -> global (north-west-up)
            inertial_reference_rpy_deg: [180.0, 0.0, 0.0],
            imu_mount_rpy_deg: [0.0, 0.0, 0.0],
            dvl_mount_rpy_deg: [180.0, 0.0, -135.0],
            dvl_mount_position: [0.0, 0.0, 0.0],
            depth_mount_position: [0.0, 0.0, 0.0],
        }
    }
}

impl EstimatorConfig{
    pub fn publish_period(&self) -> Duration{
        Duration::from_millis(self.publish_period_ms)
    }

    pub fn poll_period(&self) -> Duration{
        Duration::from_millis(self.poll_period_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig{
    pub min_safe_goal_depth: f64,
    pub max_safe_goal_depth: f64,
    /// Metres, per axis
    pub position_tolerance: f64,
    /// Rotation angle between estimate and target
    pub orientation_tolerance_deg: f64,
    pub time_to_settle_ms: u64,
    pub settle_check_period_ms: u64,
    pub bus_poll_period_ms: u64,
    /// Poses older than this cannot confirm settling
    pub pose_timeout_ms: u64,
}

impl Default for ControlsConfig{
    fn default() -> Self{
        Self{
            min_safe_goal_depth: -4.0,
            max_safe_goal_depth: 0.0,
            position_tolerance: 0.1,
            orientation_tolerance_deg: 5.0,
            time_to_settle_ms: 3000,
            settle_check_period_ms: 100,
            bus_poll_period_ms: 10,
            pose_timeout_ms: 1000,
        }
    }
}

impl ControlsConfig{
    pub fn time_to_settle(&self) -> Duration{
        Duration::from_millis(self.time_to_settle_ms)
    }

    pub fn settle_check_period(&self) -> Duration{
        Duration::from_millis(self.settle_check_period_ms)
    }

    pub fn bus_poll_period(&self) -> Duration{
        Duration::from_millis(self.bus_poll_period_ms)
    }

    pub fn pose_timeout(&self) -> Duration{
        Duration::from_millis(self.pose_timeout_ms)
    }
}

/// Thruster mounting distances in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrusterGeometry{
    /// Between the two surge thrusters
    pub dx_1: f64,
    /// Between heave thruster pairs along x
    pub dx_2: f64,
    /// Between heave thruster pairs along y
    pub dy_1: f64,
    /// Perpendicular distance between the two sway thrusters
    pub dy_2: f64,
}

impl Default for ThrusterGeometry{
    fn default() -> Self{
        Self{ dx_1: 0.397, dx_2: 0.395, dy_1: 0.514, dy_2: 0.779 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropulsionConfig{
    pub pwm_lower_limit: u16,
    pub pwm_upper_limit: u16,
    pub pwm_neutral: u16,
    /// Microseconds from neutral at full rated force
    pub pwm_span: f64,
    pub max_forward_force_n: [f64; 8],
    /// Magnitude of the strongest reverse thrust
    pub max_backward_force_n: [f64; 8],
    pub arm_pulse: u16,
    pub arm_initial_delay_ms: u64,
    pub arm_hold_ms: u64,
    /// How often the allocator checks for a new wrench
    pub poll_period_ms: u64,
    pub geometry: ThrusterGeometry,
}

impl Default for PropulsionConfig{
    fn default() -> Self{
        Self{
            pwm_lower_limit: 1100,
            pwm_upper_limit: 1900,
            pwm_neutral: 1500,
            pwm_span: 400.0,
            max_forward_force_n: [T200_MAX_FORWARD_KGF * G; 8],
            max_backward_force_n: [T200_MAX_BACKWARD_KGF * G; 8],
            arm_pulse: 1540,
            arm_initial_delay_ms: 1000,
            arm_hold_ms: 500,
            poll_period_ms: 5,
            geometry: ThrusterGeometry::default(),
        }
    }
}

impl PropulsionConfig{
    pub fn arm_initial_delay(&self) -> Duration{
        Duration::from_millis(self.arm_initial_delay_ms)
    }

    pub fn arm_hold(&self) -> Duration{
        Duration::from_millis(self.arm_hold_ms)
    }

    pub fn poll_period(&self) -> Duration{
        Duration::from_millis(self.poll_period_ms)
    }
}

impl GncConfig{
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self>{
        let text = std::fs::read_to_string(path).map_err(|source| GncError::ConfigIo{
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_toml(&text).map_err(|err| match err{
            GncError::ConfigParse{ source, .. } => GncError::ConfigParse{
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> Result<Self>{
        let cfg: GncConfig = toml::from_str(text).map_err(|source| GncError::ConfigParse{
            path: Default::default(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()>{
        let c = &self.controls;
        if c.min_safe_goal_depth > c.max_safe_goal_depth{
            return Err(GncError::InvalidConfig(format!(
                "min_safe_goal_depth {} is above max_safe_goal_depth {}",
                c.min_safe_goal_depth, c.max_safe_goal_depth
            )));
        }
        if c.position_tolerance <= 0.0 || c.orientation_tolerance_deg <= 0.0{
            return Err(GncError::InvalidConfig("tolerances must be positive".into()));
        }
        if c.settle_check_period_ms == 0 || c.bus_poll_period_ms == 0{
            return Err(GncError::InvalidConfig("controls periods must be non-zero".into()));
        }

        let e = &self.estimator;
        if e.publish_period_ms == 0 || e.poll_period_ms == 0{
            return Err(GncError::InvalidConfig("estimator periods must be non-zero".into()));
        }

        let p = &self.propulsion;
        if p.pwm_lower_limit >= p.pwm_upper_limit{
            return Err(GncError::InvalidConfig(format!(
                "pwm_lower_limit {} must be below pwm_upper_limit {}",
                p.pwm_lower_limit, p.pwm_upper_limit
            )));
        }
        if !(p.pwm_lower_limit..=p.pwm_upper_limit).contains(&p.pwm_neutral){
            return Err(GncError::InvalidConfig(format!(
                "pwm_neutral {} outside hardware bounds", p.pwm_neutral
            )));
        }
        if p.poll_period_ms == 0{
            return Err(GncError::InvalidConfig("propulsion poll period must be non-zero".into()));
        }
        let forces = p.max_forward_force_n.iter().chain(p.max_backward_force_n.iter());
        if p.pwm_span <= 0.0 || forces.copied().any(|f| f <= 0.0){
            return Err(GncError::InvalidConfig("thruster force ratings and pwm_span must be positive".into()));
        }
        Ok(())
    }
}
