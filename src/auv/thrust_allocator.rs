/**
 * Thrust Allocator
 *
 * Converts a 6-DoF body wrench (force x/y/z, torque x/y/z) into eight
 * thruster forces through the pseudo-inverse of the allocation matrix, then
 * into PWM pulse widths clamped to the hardware bounds.
 *
 * Thruster order: front-left, front-right, back-left, back-right (horizontal),
 * then heave front-left, front-right, back-left, back-right.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use crate::config::{PropulsionConfig, ThrusterGeometry};
use crate::error::{GncError, Result};
use crate::pubsub::{Publisher, Subscriber, TopicRegistry};
use super::messages::{ThrusterForces, ThrusterMicroseconds, WrenchMsg};
use super::topics;

pub const THRUSTER_COUNT: usize = 8;

/// Maps thruster forces to the body wrench they produce.
/// Rows: [surge, sway, heave, roll, pitch, yaw], columns: thrusters.
pub fn allocation_matrix(geometry: &ThrusterGeometry) -> DMatrix<f64>{
    let ThrusterGeometry{ dx_1, dx_2, dy_1, dy_2 } = *geometry;
    #[rustfmt::skip]
    let rows = [
        -1.0,        -1.0,        0.0,        0.0,        0.0,        0.0,        0.0,        0.0,
         0.0,         0.0,        1.0,       -1.0,        0.0,        0.0,        0.0,        0.0,
         0.0,         0.0,        0.0,        0.0,       -1.0,       -1.0,       -1.0,       -1.0,
         0.0,         0.0,        0.0,        0.0,  -dx_2 / 2.0,  dx_2 / 2.0,  dx_2 / 2.0, -dx_2 / 2.0,
         0.0,         0.0,        0.0,        0.0,   dy_1 / 2.0,  dy_1 / 2.0, -dy_1 / 2.0, -dy_1 / 2.0,
         dx_1 / 2.0, -dx_1 / 2.0, dy_2 / 2.0, dy_2 / 2.0, 0.0,    0.0,        0.0,        0.0,
    ];
    DMatrix::from_row_slice(6, THRUSTER_COUNT, &rows)
}

/// One step of the ESC arming sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmingStep{
    pub command: ThrusterMicroseconds,
    /// Wait after sending `command`
    pub hold: Duration,
}

#[derive(Debug, Clone)]
pub struct ThrustAllocator{
    //8x6, wrench -> thruster forces
    inverse: DMatrix<f64>,
    pwm_lower: u16,
    pwm_upper: u16,
    pwm_neutral: u16,
    pwm_span: f64,
    max_forward: [f64; THRUSTER_COUNT],
    max_backward: [f64; THRUSTER_COUNT],
    arm_pulse: u16,
    arm_initial_delay: Duration,
    arm_hold: Duration,
}

impl ThrustAllocator{
    pub fn new(config: &PropulsionConfig) -> Result<Self>{
        let inverse = allocation_matrix(&config.geometry)
            .pseudo_inverse(1e-9)
            .map_err(GncError::Allocation)?;

        Ok(Self{
            inverse,
            pwm_lower: config.pwm_lower_limit,
            pwm_upper: config.pwm_upper_limit,
            pwm_neutral: config.pwm_neutral,
            pwm_span: config.pwm_span,
            max_forward: config.max_forward_force_n,
            max_backward: config.max_backward_force_n,
            arm_pulse: config.arm_pulse,
            arm_initial_delay: config.arm_initial_delay(),
            arm_hold: config.arm_hold(),
        })
    }

    /// Minimum-norm thruster forces for `wrench`
    pub fn forces(&self, wrench: &WrenchMsg) -> ThrusterForces{
        let w = DVector::from_column_slice(&[
            wrench.force.x,
            wrench.force.y,
            wrench.force.z,
            wrench.torque.x,
            wrench.torque.y,
            wrench.torque.z,
        ]);
        let t = &self.inverse * w;

        let mut forces = [0.0; THRUSTER_COUNT];
        for (out, value) in forces.iter_mut().zip(t.iter()){
            *out = *value;
        }
        ThrusterForces{ forces }
    }

    /// Unclamped pulse width for `force` newtons on `channel`
    pub fn force_to_pwm(&self, channel: usize, force: f64) -> f64{
        let rating = if force >= 0.0{ self.max_forward[channel] } else{ self.max_backward[channel] };
        f64::from(self.pwm_neutral) + force / rating * self.pwm_span
    }

    /// Pulse widths for `forces`, each channel clamped to the hardware bounds
    pub fn to_pwm(&self, forces: &ThrusterForces) -> ThrusterMicroseconds{
        let lower = f64::from(self.pwm_lower);
        let upper = f64::from(self.pwm_upper);
        let mut microseconds = [self.pwm_neutral; THRUSTER_COUNT];

        for (channel, (out, &force)) in microseconds.iter_mut().zip(forces.forces.iter()).enumerate(){
            let raw = self.force_to_pwm(channel, force).round();
            //NaN fails both comparisons, send neutral rather than a garbage pulse
            let pwm = if raw > upper{
                warn!(thruster = channel + 1, raw, limit = self.pwm_upper, "thruster fuse limit exceeded, clamping");
                upper
            }
            else if raw < lower{
                warn!(thruster = channel + 1, raw, limit = self.pwm_lower, "thruster fuse limit exceeded, clamping");
                lower
            }
            else if raw.is_nan(){
                warn!(thruster = channel + 1, "thruster command not a number, sending neutral");
                f64::from(self.pwm_neutral)
            }
            else{
                raw
            };
            *out = pwm as u16;
        }

        ThrusterMicroseconds{ microseconds }
    }

    pub fn allocate(&self, wrench: &WrenchMsg) -> (ThrusterForces, ThrusterMicroseconds){
        let forces = self.forces(wrench);
        let pwm = self.to_pwm(&forces);
        (forces, pwm)
    }

    pub fn neutral(&self) -> ThrusterMicroseconds{
        ThrusterMicroseconds::uniform(self.pwm_neutral)
    }

    /// Wait before the first arming step, lets the ESCs power up
    pub fn arm_initial_delay(&self) -> Duration{
        self.arm_initial_delay
    }

    /// neutral, arm pulse, neutral; each followed by a hold
    pub fn arming_sequence(&self) -> [ArmingStep; 3]{
        [
            ArmingStep{ command: self.neutral(), hold: self.arm_hold },
            ArmingStep{ command: ThrusterMicroseconds::uniform(self.arm_pulse), hold: self.arm_hold },
            ArmingStep{ command: self.neutral(), hold: self.arm_hold },
        ]
    }
}

/// Publishes all-neutral when dropped, including during a panic unwind
struct NeutralOnDrop{
    publisher: Publisher<ThrusterMicroseconds>,
    neutral: ThrusterMicroseconds,
}

impl Drop for NeutralOnDrop{
    fn drop(&mut self){
        self.publisher.publish(self.neutral);
        info!(topic = self.publisher.topic_name(), "thrusters set to neutral");
    }
}

pub struct AllocatorNode{
    allocator: ThrustAllocator,
    effort: Subscriber<WrenchMsg>,
    forces: Publisher<ThrusterForces>,
    microseconds: Publisher<ThrusterMicroseconds>,
    poll_period: Duration,
}

impl AllocatorNode{
    pub fn new(config: &PropulsionConfig, registry: &TopicRegistry) -> Result<Self>{
        Ok(Self{
            allocator: ThrustAllocator::new(config)?,
            effort: registry.subscriber(topics::EFFORT),
            forces: registry.publisher(topics::THRUSTER_FORCES),
            microseconds: registry.publisher(topics::THRUSTER_MICROSECONDS),
            poll_period: config.poll_period(),
        })
    }

    /// Run the arming sequence. Returns false if `running` was cleared first.
    pub fn arm(&self, running: &AtomicBool) -> bool{
        if !sleep_while_running(self.allocator.arm_initial_delay(), running){
            return false;
        }
        for (i, step) in self.allocator.arming_sequence().iter().enumerate(){
            info!(step = i + 1, pwm = step.command.microseconds[0], "arming");
            self.microseconds.publish(step.command);
            if !sleep_while_running(step.hold, running){
                return false;
            }
        }
        //wrenches that arrived while arming are stale
        self.effort.mark_seen();
        debug!(topic = self.effort.topic_name(), "wrenches received while arming discarded");
        true
    }

    /// Allocate the newest unseen wrench, if any
    pub fn poll(&self) -> bool{
        let Some(wrench) = self.effort.try_recv_latest() else{
            return false;
        };
        let (forces, pwm) = self.allocator.allocate(&wrench);
        debug!(pwm = ?pwm.microseconds, "allocated");
        self.forces.publish(forces);
        self.microseconds.publish(pwm);
        true
    }

    pub fn spawn(self, running: Arc<AtomicBool>) -> JoinHandle<()>{
        thread::spawn(move ||{
            let _failsafe = NeutralOnDrop{
                publisher: self.microseconds.clone(),
                neutral: self.allocator.neutral(),
            };

            if !self.arm(&running){
                info!("stopped while arming");
                return;
            }
            info!("thrust allocator armed");

            while running.load(Ordering::SeqCst){
                self.poll();
                thread::sleep(self.poll_period);
            }
            info!("thrust allocator stopped");
        })
    }
}

/// Sleep up to `total`, waking early if `running` is cleared
fn sleep_while_running(total: Duration, running: &AtomicBool) -> bool{
    const SLICE: Duration = Duration::from_millis(10);
    let mut left = total;
    while !left.is_zero(){
        if !running.load(Ordering::SeqCst){
            return false;
        }
        let step = left.min(SLICE);
        thread::sleep(step);
        left -= step;
    }
    running.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests{
    use super::*;
    use approx::assert_relative_eq;
    use crate::auv::messages::Vector3Msg;

    fn allocator() -> ThrustAllocator{
        ThrustAllocator::new(&PropulsionConfig::default()).unwrap()
    }

    fn wrench(force: [f64; 3], torque: [f64; 3]) -> WrenchMsg{
        WrenchMsg{
            force: Vector3Msg{ x: force[0], y: force[1], z: force[2] },
            torque: Vector3Msg{ x: torque[0], y: torque[1], z: torque[2] },
        }
    }

    #[test]
    fn test_zero_wrench_is_neutral(){
        let (forces, pwm) = allocator().allocate(&WrenchMsg::default());
        assert!(forces.forces.iter().all(|f| f.abs() < 1e-12));
        assert_eq!(pwm, ThrusterMicroseconds::uniform(1500));
    }

    #[test]
    fn test_surge_splits_across_front_pair(){
        let alloc = allocator();
        let (forces, pwm) = alloc.allocate(&wrench([10.0, 0.0, 0.0], [0.0; 3]));

        assert_relative_eq!(forces.forces[0], -5.0, epsilon = 1e-9);
        assert_relative_eq!(forces.forces[1], -5.0, epsilon = 1e-9);
        for f in &forces.forces[2..]{
            assert_relative_eq!(*f, 0.0, epsilon = 1e-9);
        }

        assert_eq!(pwm.microseconds[0], pwm.microseconds[1]);
        assert!(pwm.microseconds[0] < 1500);
        assert!(pwm.microseconds[2..].iter().all(|&us| us == 1500));
    }

    #[test]
    fn test_heave_spreads_evenly(){
        let (forces, pwm) = allocator().allocate(&wrench([0.0, 0.0, -20.0], [0.0; 3]));
        for f in &forces.forces[4..]{
            assert_relative_eq!(*f, 5.0, epsilon = 1e-9);
        }
        let heave = &pwm.microseconds[4..];
        assert!(heave.iter().all(|&us| us == heave[0] && us > 1500));
    }

    #[test]
    fn test_allocation_reproduces_wrench(){
        let alloc = allocator();
        let w = wrench([3.0, -2.0, 4.0], [0.5, -0.3, 0.8]);
        let forces = alloc.forces(&w);

        let t = DVector::from_column_slice(&forces.forces);
        let produced = allocation_matrix(&PropulsionConfig::default().geometry) * t;
        let expected = [3.0, -2.0, 4.0, 0.5, -0.3, 0.8];
        for (p, e) in produced.iter().zip(expected){
            assert_relative_eq!(*p, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_force_curve_uses_direction_rating(){
        let alloc = allocator();
        let fwd = PropulsionConfig::default().max_forward_force_n[0];
        let bkwd = PropulsionConfig::default().max_backward_force_n[0];

        assert_relative_eq!(alloc.force_to_pwm(0, fwd), 1900.0);
        assert_relative_eq!(alloc.force_to_pwm(0, -bkwd), 1100.0);
        assert_relative_eq!(alloc.force_to_pwm(0, fwd / 2.0), 1700.0);
    }

    #[test]
    fn test_each_channel_clamped(){
        let alloc = allocator();
        let mut forces = ThrusterForces::default();
        forces.forces[2] = 1000.0;
        forces.forces[5] = -1000.0;
        forces.forces[7] = f64::NAN;

        let pwm = alloc.to_pwm(&forces);
        assert_eq!(pwm.microseconds[2], 1900);
        assert_eq!(pwm.microseconds[5], 1100);
        assert_eq!(pwm.microseconds[7], 1500);
        assert_eq!(pwm.microseconds[0], 1500);
    }

    #[test]
    fn test_arming_sequence(){
        let steps = allocator().arming_sequence();
        let pulses: Vec<u16> = steps.iter().map(|s| s.command.microseconds[0]).collect();
        assert_eq!(pulses, vec![1500, 1540, 1500]);
        assert!(steps.iter().all(|s| s.hold == Duration::from_millis(500)));
        assert_eq!(allocator().arm_initial_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn test_node_arms_allocates_and_fails_safe(){
        let registry = TopicRegistry::new();
        let config = PropulsionConfig{
            arm_initial_delay_ms: 10,
            arm_hold_ms: 10,
            poll_period_ms: 1,
            ..PropulsionConfig::default()
        };
        let node = AllocatorNode::new(&config, &registry).unwrap();
        let pwm_sub = registry.subscriber::<ThrusterMicroseconds>(topics::THRUSTER_MICROSECONDS);
        let effort = registry.publisher::<WrenchMsg>(topics::EFFORT);

        let running = Arc::new(AtomicBool::new(true));
        let handle = node.spawn(Arc::clone(&running));
        thread::sleep(Duration::from_millis(200));

        effort.publish(wrench([0.0, 0.0, -20.0], [0.0; 3]));
        thread::sleep(Duration::from_millis(50));
        let pwm = pwm_sub.try_recv_latest().unwrap();
        assert!(pwm.microseconds[4] > 1500);

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();
        assert_eq!(pwm_sub.try_recv_latest(), Some(ThrusterMicroseconds::uniform(1500)));
    }
}
