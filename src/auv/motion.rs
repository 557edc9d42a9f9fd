/**
 * Motion Goal Server
 *
 * Drives the external position/orientation PID loops towards a requested
 * pose and reports success once the vehicle has stayed inside tolerance for
 * a continuous settle window.
 *
 * Targets are sticky: an axis the current goal does not mention keeps the
 * last setpoint commanded on it, until someone disables that axis. At most
 * one goal is active; a newer submission preempts it.
 *
 * `MotionGoalController` is the clock-free core, driven by explicit
 * timestamps. `MotionGoalServer` runs it on a thread fed by a command
 * channel and two tickers.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{self as channel, select, Receiver, Sender};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, info, warn};

use crate::config::ControlsConfig;
use crate::error::{GncError, Result};
use crate::pubsub::{Subscriber, TopicRegistry};
use super::frames;
use super::goal::{AbortReason, GoalId, GoalOutcome, MotionGoal};
use super::messages::PoseMsg;
use super::pid::{EffortDof, PidAxis, PidInterface, PositionAxis};
use super::topics;

/// World-frame pose as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample{
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl From<PoseMsg> for PoseSample{
    fn from(msg: PoseMsg) -> Self{
        Self{ position: msg.position.into(), orientation: msg.orientation.into() }
    }
}

/// Per-axis setpoints; `None` means the axis is not commanded
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Setpoints{
    pub position: [Option<f64>; 3],
    pub orientation: Option<UnitQuaternion<f64>>,
}

struct ActiveGoal{
    id: GoalId,
    targets: Setpoints,
    in_tolerance_since: Option<Instant>,
    stale_warned: bool,
    reply: Sender<GoalOutcome>,
}

impl ActiveGoal{
    fn finish(self, outcome: GoalOutcome){
        info!(goal = self.id, ?outcome, "motion goal finished");
        send_outcome(self.id, &self.reply, outcome);
    }
}

fn send_outcome(id: GoalId, reply: &Sender<GoalOutcome>, outcome: GoalOutcome){
    if reply.send(outcome).is_err(){
        debug!(goal = id, "requester went away before the outcome");
    }
}

fn within_tolerance(
    targets: &Setpoints,
    pose: &PoseSample,
    position_tolerance: f64,
    orientation_tolerance: f64,
) -> bool{
    for (i, target) in targets.position.iter().enumerate(){
        if let Some(target) = target{
            if (pose.position[i] - target).abs() > position_tolerance{
                return false;
            }
        }
    }
    if let Some(target) = targets.orientation{
        let error = pose.orientation.inverse() * target;
        if !frames::is_near_identity(&error, orientation_tolerance){
            return false;
        }
    }
    true
}

pub struct MotionGoalController<P: PidInterface>{
    pid: P,
    depth_envelope: (f64, f64),
    position_tolerance: f64,
    //radians
    orientation_tolerance: f64,
    time_to_settle: Duration,
    pose_timeout: Duration,
    sticky: Setpoints,
    active: Option<ActiveGoal>,
    latest_pose: Option<(PoseSample, Instant)>,
}

impl<P: PidInterface> MotionGoalController<P>{
    pub fn new(config: &ControlsConfig, pid: P) -> Self{
        Self{
            pid,
            depth_envelope: (config.min_safe_goal_depth, config.max_safe_goal_depth),
            position_tolerance: config.position_tolerance,
            orientation_tolerance: config.orientation_tolerance_deg.to_radians(),
            time_to_settle: config.time_to_settle(),
            pose_timeout: config.pose_timeout(),
            sticky: Setpoints::default(),
            active: None,
            latest_pose: None,
        }
    }

    pub fn active_goal(&self) -> Option<GoalId>{
        self.active.as_ref().map(|g| g.id)
    }

    /// Targets of the active goal
    pub fn active_targets(&self) -> Option<Setpoints>{
        self.active.as_ref().map(|g| g.targets)
    }

    pub fn sticky(&self) -> &Setpoints{
        &self.sticky
    }

    pub fn on_pose(&mut self, pose: PoseSample, now: Instant){
        self.latest_pose = Some((pose, now));
    }

    /// An external party turned an axis off; its sticky setpoint no longer holds
    pub fn on_axis_disabled(&mut self, axis: PidAxis){
        match axis{
            PidAxis::Position(p) => self.sticky.position[p.index()] = None,
            PidAxis::Orientation => self.sticky.orientation = None,
        }
        debug!(?axis, "sticky setpoint cleared");
    }

    /// Start goal `id`, preempting whatever was active. `reply` receives
    /// exactly one outcome.
    pub fn submit(&mut self, id: GoalId, goal: MotionGoal, reply: Sender<GoalOutcome>, now: Instant){
        if let Some(previous) = self.active.take(){
            info!(preempted = previous.id, by = id, "motion goal superseded");
            previous.finish(GoalOutcome::Preempted);
        }

        let Some(pose) = self.fresh_pose(now) else{
            warn!(goal = id, stale = self.latest_pose.is_some(), "no pose estimate, motion goal aborted");
            send_outcome(id, &reply, GoalOutcome::Aborted(AbortReason::NoPoseEstimate));
            return;
        };

        let targets = self.command(&goal, &pose);
        info!(goal = id, position = ?targets.position, orientation = targets.orientation.is_some(), "motion goal accepted");

        self.active = Some(ActiveGoal{
            id,
            targets,
            in_tolerance_since: None,
            stale_warned: false,
            reply,
        });
        self.on_tick(now);
    }

    // latest pose, unless it is older than the pose timeout
    fn fresh_pose(&self, now: Instant) -> Option<PoseSample>{
        match self.latest_pose{
            Some((pose, at)) if now.saturating_duration_since(at) <= self.pose_timeout => Some(pose),
            _ => None,
        }
    }

    /// Cancel goal `id` if it is still the active one
    pub fn cancel(&mut self, id: GoalId) -> bool{
        if self.active_goal() != Some(id){
            return false;
        }
        if let Some(goal) = self.active.take(){
            goal.finish(GoalOutcome::Aborted(AbortReason::Cancelled));
        }
        true
    }

    pub fn shutdown(&mut self){
        if let Some(goal) = self.active.take(){
            goal.finish(GoalOutcome::Aborted(AbortReason::Shutdown));
        }
    }

    /// Settle check. Any tick out of tolerance, or without a fresh pose,
    /// restarts the settle window.
    pub fn on_tick(&mut self, now: Instant){
        let fresh_pose = self.fresh_pose(now);
        let Some(goal) = self.active.as_mut() else{
            return;
        };

        let inside = match fresh_pose{
            Some(pose) => {
                goal.stale_warned = false;
                within_tolerance(&goal.targets, &pose, self.position_tolerance, self.orientation_tolerance)
            }
            None => {
                if !goal.stale_warned{
                    warn!(goal = goal.id, "pose estimate stale, holding targets");
                    goal.stale_warned = true;
                }
                false
            }
        };

        if !inside{
            goal.in_tolerance_since = None;
            return;
        }

        let since = *goal.in_tolerance_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.time_to_settle{
            if let Some(goal) = self.active.take(){
                goal.finish(GoalOutcome::Succeeded);
            }
        }
    }

    /// Resolve the goal into world-frame targets and command the PID loops
    fn command(&mut self, goal: &MotionGoal, pose: &PoseSample) -> Setpoints{
        let pivot_orientation = self.sticky.orientation.unwrap_or(pose.orientation);
        let mut position = goal.position;
        let mut orientation = goal.orientation;

        if goal.mode.is_local(){
            position = pivot_orientation * position;
        }
        if goal.mode.is_relative(){
            let pivot = Vector3::from_fn(|i, _| self.sticky.position[i].unwrap_or(pose.position[i]));
            position += pivot;
            orientation = pivot_orientation * orientation;
        }

        let requested = goal.axes.position();
        let mut targets = Setpoints::default();

        for axis in PositionAxis::ALL{
            let i = axis.index();
            let target = if requested[i]{
                let mut value = position[i];
                if axis == PositionAxis::Z{
                    value = self.clamp_depth(value);
                }
                self.sticky.position[i] = Some(value);
                Some(value)
            }
            else{
                self.sticky.position[i]
            };

            if let Some(value) = target{
                self.pid.set_enabled(axis.into(), true);
                if axis == PositionAxis::Z{
                    self.pid.set_effort(EffortDof::Heave, 0.0);
                }
                else{
                    self.pid.set_effort(EffortDof::Surge, 0.0);
                    self.pid.set_effort(EffortDof::Sway, 0.0);
                }
                self.pid.set_position_setpoint(axis, value);
            }
            targets.position[i] = target;
        }

        if goal.axes.orientation{
            self.sticky.orientation = Some(orientation);
        }
        if let Some(value) = self.sticky.orientation{
            self.pid.set_enabled(PidAxis::Orientation, true);
            for dof in EffortDof::ROTATION{
                self.pid.set_effort(dof, 0.0);
            }
            self.pid.set_orientation_setpoint(value);
            targets.orientation = Some(value);
        }

        targets
    }

    fn clamp_depth(&self, z: f64) -> f64{
        let (min, max) = self.depth_envelope;
        let safe = z.clamp(min, max);
        if safe != z{
            warn!(requested = z, clamped = safe, "depth goal outside the safe envelope");
        }
        safe
    }
}

enum MotionCommand{
    Submit{ id: GoalId, goal: MotionGoal, reply: Sender<GoalOutcome> },
    Cancel(GoalId),
    Shutdown,
}

/// Outcome side of a submitted goal
pub struct GoalHandle{
    id: GoalId,
    outcome: Receiver<GoalOutcome>,
    commands: Sender<MotionCommand>,
}

impl GoalHandle{
    pub fn id(&self) -> GoalId{
        self.id
    }

    /// Block until the goal finishes
    pub fn wait(&self) -> Result<GoalOutcome>{
        self.outcome.recv().map_err(|_| GncError::ChannelClosed("motion goal outcome"))
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<GoalOutcome>{
        self.outcome.recv_timeout(timeout).ok()
    }

    pub fn try_outcome(&self) -> Option<GoalOutcome>{
        self.outcome.try_recv().ok()
    }

    pub fn cancel(&self) -> Result<()>{
        self.commands
            .send(MotionCommand::Cancel(self.id))
            .map_err(|_| GncError::ChannelClosed("motion goal server"))
    }
}

/// Cloneable submit side of a running `MotionGoalServer`
#[derive(Clone)]
pub struct MotionGoalClient{
    commands: Sender<MotionCommand>,
    generation: Arc<AtomicU64>,
}

impl MotionGoalClient{
    pub fn submit(&self, goal: MotionGoal) -> Result<GoalHandle>{
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (reply, outcome) = channel::bounded(1);
        self.commands
            .send(MotionCommand::Submit{ id, goal, reply })
            .map_err(|_| GncError::ChannelClosed("motion goal server"))?;
        Ok(GoalHandle{ id, outcome, commands: self.commands.clone() })
    }

    /// Ask the server thread to stop; an active goal is aborted
    pub fn shutdown(&self){
        let _ = self.commands.send(MotionCommand::Shutdown);
    }
}

struct AxisEnables{
    x: Subscriber<bool>,
    y: Subscriber<bool>,
    z: Subscriber<bool>,
    orientation: Subscriber<bool>,
}

impl AxisEnables{
    fn new(registry: &TopicRegistry) -> Self{
        Self{
            x: registry.subscriber(topics::PID_X_ENABLE),
            y: registry.subscriber(topics::PID_Y_ENABLE),
            z: registry.subscriber(topics::PID_Z_ENABLE),
            orientation: registry.subscriber(topics::PID_QUAT_ENABLE),
        }
    }

    fn disabled(&self) -> Vec<PidAxis>{
        let pairs = [
            (&self.x, PidAxis::Position(PositionAxis::X)),
            (&self.y, PidAxis::Position(PositionAxis::Y)),
            (&self.z, PidAxis::Position(PositionAxis::Z)),
            (&self.orientation, PidAxis::Orientation),
        ];
        pairs
            .into_iter()
            .filter(|(sub, _)| sub.try_recv_latest() == Some(false))
            .map(|(_, axis)| axis)
            .collect()
    }
}

pub struct MotionGoalServer<P: PidInterface>{
    controller: MotionGoalController<P>,
    pose: Subscriber<PoseMsg>,
    enables: AxisEnables,
    settle_check_period: Duration,
    bus_poll_period: Duration,
}

impl<P: PidInterface + 'static> MotionGoalServer<P>{
    pub fn new(config: &ControlsConfig, pid: P, registry: &TopicRegistry) -> Self{
        Self{
            controller: MotionGoalController::new(config, pid),
            pose: registry.subscriber(topics::POSE),
            enables: AxisEnables::new(registry),
            settle_check_period: config.settle_check_period(),
            bus_poll_period: config.bus_poll_period(),
        }
    }

    fn poll_bus(&mut self){
        let now = Instant::now();
        if let Some(msg) = self.pose.try_recv_latest(){
            self.controller.on_pose(msg.into(), now);
        }
        for axis in self.enables.disabled(){
            self.controller.on_axis_disabled(axis);
        }
    }

    pub fn spawn(mut self) -> (MotionGoalClient, JoinHandle<()>){
        let (commands, inbox) = channel::unbounded();
        let client = MotionGoalClient{ commands, generation: Arc::new(AtomicU64::new(0)) };

        let handle = thread::spawn(move ||{
            let settle_ticker = channel::tick(self.settle_check_period);
            let bus_ticker = channel::tick(self.bus_poll_period);
            info!("motion goal server started");

            loop{
                select!{
                    recv(inbox) -> command => match command{
                        Ok(MotionCommand::Submit{ id, goal, reply }) => {
                            //latest pose first so the goal resolves against it
                            self.poll_bus();
                            self.controller.submit(id, goal, reply, Instant::now());
                        }
                        Ok(MotionCommand::Cancel(id)) => {
                            if !self.controller.cancel(id){
                                debug!(goal = id, "cancel for inactive goal ignored");
                            }
                        }
                        Ok(MotionCommand::Shutdown) | Err(_) => break,
                    },
                    recv(bus_ticker) -> _ => self.poll_bus(),
                    recv(settle_ticker) -> tick => {
                        let now = tick.unwrap_or_else(|_| Instant::now());
                        self.controller.on_tick(now);
                    }
                }
            }

            self.controller.shutdown();
            info!("motion goal server stopped");
        });

        (client, handle)
    }
}

#[cfg(test)]
mod tests{
    use super::*;
    use approx::assert_relative_eq;
    use crate::auv::goal::{AxisMask, FrameMode};
    use crate::auv::pid::recording::{PidCall, RecordingPid};

    fn config() -> ControlsConfig{
        ControlsConfig{
            time_to_settle_ms: 300,
            settle_check_period_ms: 100,
            ..ControlsConfig::default()
        }
    }

    fn pose_at(x: f64, y: f64, z: f64) -> PoseSample{
        PoseSample{ position: Vector3::new(x, y, z), orientation: UnitQuaternion::identity() }
    }

    fn ms(t0: Instant, n: u64) -> Instant{
        t0 + Duration::from_millis(n)
    }

    fn controller() -> (MotionGoalController<RecordingPid>, RecordingPid){
        let pid = RecordingPid::default();
        (MotionGoalController::new(&config(), pid.clone()), pid)
    }

    fn only(axes: AxisMask) -> MotionGoal{
        MotionGoal::pose(Vector3::zeros(), UnitQuaternion::identity()).with_axes(axes)
    }

    #[test]
    fn test_aborts_without_pose(){
        let (mut ctrl, pid) = controller();
        let (tx, rx) = channel::bounded(1);
        ctrl.submit(1, only(AxisMask::ALL), tx, Instant::now());

        assert_eq!(rx.try_recv(), Ok(GoalOutcome::Aborted(AbortReason::NoPoseEstimate)));
        assert!(ctrl.active_goal().is_none());
        assert!(pid.take().is_empty());
    }

    #[test]
    fn test_aborts_on_stale_pose(){
        let (mut ctrl, pid) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(1.0, 0.0, -1.0), t0);

        let (tx, rx) = channel::bounded(1);
        let nudge = MotionGoal{ position: Vector3::new(1.0, 0.0, 0.0), ..only(AxisMask{ x: true, ..Default::default() }) }
            .with_mode(FrameMode::Relative);
        ctrl.submit(1, nudge, tx, ms(t0, 60_000));

        assert_eq!(rx.try_recv(), Ok(GoalOutcome::Aborted(AbortReason::NoPoseEstimate)));
        assert!(ctrl.active_goal().is_none());
        assert_eq!(ctrl.sticky().position, [None; 3]);
        assert!(pid.take().is_empty());

        //a pose inside the timeout is accepted again
        ctrl.on_pose(pose_at(1.0, 0.0, -1.0), ms(t0, 60_000));
        let (tx, _rx) = channel::bounded(1);
        ctrl.submit(2, nudge, tx, ms(t0, 60_500));
        assert_eq!(ctrl.active_targets().unwrap().position, [Some(2.0), None, None]);
    }

    #[test]
    fn test_settles_after_continuous_window(){
        let (mut ctrl, _) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), t0);

        let (tx, rx) = channel::bounded(1);
        let goal = MotionGoal::pose(Vector3::new(0.05, 0.0, -1.0), UnitQuaternion::identity());
        ctrl.submit(1, goal, tx, t0);

        for n in [100, 200]{
            ctrl.on_pose(pose_at(0.0, 0.0, -1.0), ms(t0, n));
            ctrl.on_tick(ms(t0, n));
            assert!(rx.try_recv().is_err());
        }
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), ms(t0, 300));
        ctrl.on_tick(ms(t0, 300));
        assert_eq!(rx.try_recv(), Ok(GoalOutcome::Succeeded));
        assert!(ctrl.active_goal().is_none());
    }

    #[test]
    fn test_excursion_restarts_settle_window(){
        let (mut ctrl, _) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), t0);

        let (tx, rx) = channel::bounded(1);
        ctrl.submit(1, only(AxisMask{ x: true, ..Default::default() }), tx, t0);

        ctrl.on_tick(ms(t0, 100));
        //one tick before the deadline the vehicle drifts out
        ctrl.on_pose(pose_at(0.5, 0.0, -1.0), ms(t0, 200));
        ctrl.on_tick(ms(t0, 200));

        for n in [300, 400, 500]{
            ctrl.on_pose(pose_at(0.0, 0.0, -1.0), ms(t0, n));
            ctrl.on_tick(ms(t0, n));
            assert!(rx.try_recv().is_err(), "settled early at {n} ms");
        }
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), ms(t0, 600));
        ctrl.on_tick(ms(t0, 600));
        assert_eq!(rx.try_recv(), Ok(GoalOutcome::Succeeded));
    }

    #[test]
    fn test_stale_pose_blocks_settling(){
        let (mut ctrl, _) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, 0.0), t0);

        let (tx, rx) = channel::bounded(1);
        ctrl.submit(1, only(AxisMask{ x: true, ..Default::default() }), tx, t0);

        //no pose for longer than the timeout
        for n in (1100..=3000).step_by(100){
            ctrl.on_tick(ms(t0, n));
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(ctrl.active_goal(), Some(1));
    }

    #[test]
    fn test_new_goal_preempts_active(){
        let (mut ctrl, pid) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), t0);

        let (tx_a, rx_a) = channel::bounded(1);
        let goal_a = only(AxisMask{ x: true, ..Default::default() });
        ctrl.submit(1, MotionGoal{ position: Vector3::new(5.0, 0.0, 0.0), ..goal_a }, tx_a, t0);

        let (tx_b, rx_b) = channel::bounded(1);
        ctrl.submit(2, MotionGoal{ position: Vector3::new(-3.0, 0.0, 0.0), ..goal_a }, tx_b, ms(t0, 10));

        assert_eq!(rx_a.try_recv(), Ok(GoalOutcome::Preempted));
        assert!(rx_b.try_recv().is_err());
        assert_eq!(ctrl.active_goal(), Some(2));
        assert_eq!(pid.last_position(PositionAxis::X), Some(-3.0));
    }

    #[test]
    fn test_cancel_only_matches_active(){
        let (mut ctrl, _) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, 0.0), t0);

        let (tx, rx) = channel::bounded(1);
        ctrl.submit(7, only(AxisMask{ x: true, ..Default::default() }), tx, t0);

        assert!(!ctrl.cancel(6));
        assert!(ctrl.cancel(7));
        assert_eq!(rx.try_recv(), Ok(GoalOutcome::Aborted(AbortReason::Cancelled)));
    }

    #[test]
    fn test_depth_clamped_to_envelope(){
        let (mut ctrl, pid) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), t0);
        let z_only = AxisMask{ z: true, ..Default::default() };

        let (tx, _rx) = channel::bounded(1);
        ctrl.submit(1, MotionGoal{ position: Vector3::new(0.0, 0.0, -10.0), ..only(z_only) }, tx, t0);
        assert_eq!(pid.last_position(PositionAxis::Z), Some(-4.0));

        let (tx, _rx) = channel::bounded(1);
        ctrl.submit(2, MotionGoal{ position: Vector3::new(0.0, 0.0, 2.0), ..only(z_only) }, tx, t0);
        assert_eq!(pid.last_position(PositionAxis::Z), Some(0.0));
        assert_eq!(ctrl.sticky().position[2], Some(0.0));
    }

    #[test]
    fn test_sticky_setpoints_reused_until_disabled(){
        let (mut ctrl, pid) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), t0);

        let (tx, _rx) = channel::bounded(1);
        let z_goal = MotionGoal{ position: Vector3::new(0.0, 0.0, -2.0), ..only(AxisMask{ z: true, ..Default::default() }) };
        ctrl.submit(1, z_goal, tx, t0);

        let (tx, _rx) = channel::bounded(1);
        let x_goal = MotionGoal{ position: Vector3::new(3.0, 0.0, 0.0), ..only(AxisMask{ x: true, ..Default::default() }) };
        ctrl.submit(2, x_goal, tx, t0);

        let targets = ctrl.active_targets().unwrap();
        assert_eq!(targets.position, [Some(3.0), None, Some(-2.0)]);
        assert_eq!(targets.orientation, None);
        assert!(pid.take().contains(&PidCall::Position(PositionAxis::Z, -2.0)));

        ctrl.on_axis_disabled(PidAxis::Position(PositionAxis::Z));
        let (tx, _rx) = channel::bounded(1);
        ctrl.submit(3, x_goal, tx, t0);
        assert_eq!(ctrl.active_targets().unwrap().position, [Some(3.0), None, None]);
        assert!(!pid.take().iter().any(|c| matches!(c, PidCall::Position(PositionAxis::Z, _))));
    }

    #[test]
    fn test_commanding_axes_zeroes_matching_efforts(){
        let (mut ctrl, pid) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), t0);

        let (tx, _rx) = channel::bounded(1);
        ctrl.submit(1, only(AxisMask{ y: true, orientation: true, ..Default::default() }), tx, t0);
        let calls = pid.take();

        for dof in [EffortDof::Surge, EffortDof::Sway, EffortDof::Roll, EffortDof::Pitch, EffortDof::Yaw]{
            assert!(calls.contains(&PidCall::Effort(dof, 0.0)), "{dof:?} not zeroed");
        }
        assert!(!calls.contains(&PidCall::Effort(EffortDof::Heave, 0.0)));
        assert!(calls.contains(&PidCall::Enabled(PidAxis::Orientation, true)));
    }

    #[test]
    fn test_relative_goal_offsets_from_pose(){
        let (mut ctrl, pid) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(1.0, 2.0, -1.0), t0);

        let (tx, _rx) = channel::bounded(1);
        let goal = MotionGoal::pose(Vector3::new(0.5, 0.0, -0.5), frames::from_rpy_deg([0.0, 0.0, 90.0]))
            .with_mode(FrameMode::Relative);
        ctrl.submit(1, goal, tx, t0);

        let targets = ctrl.active_targets().unwrap();
        assert_eq!(targets.position, [Some(1.5), Some(2.0), Some(-1.5)]);
        let yaw = targets.orientation.unwrap().euler_angles().2;
        assert_relative_eq!(yaw, 90f64.to_radians(), epsilon = 1e-9);
        assert_eq!(pid.last_position(PositionAxis::X), Some(1.5));
    }

    #[test]
    fn test_relative_goal_pivots_on_sticky_setpoint(){
        let (mut ctrl, _) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(pose_at(0.0, 0.0, -1.0), t0);
        let x_only = AxisMask{ x: true, ..Default::default() };

        let (tx, _rx) = channel::bounded(1);
        ctrl.submit(1, MotionGoal{ position: Vector3::new(4.0, 0.0, 0.0), ..only(x_only) }, tx, t0);

        //vehicle has not arrived yet; the displacement stacks on the setpoint
        ctrl.on_pose(pose_at(1.0, 0.0, -1.0), t0);
        let (tx, _rx) = channel::bounded(1);
        let nudge = MotionGoal{ position: Vector3::new(1.0, 0.0, 0.0), ..only(x_only) }.with_mode(FrameMode::Relative);
        ctrl.submit(2, nudge, tx, t0);

        assert_eq!(ctrl.active_targets().unwrap().position[0], Some(5.0));
    }

    #[test]
    fn test_local_goal_rotates_by_heading(){
        let (mut ctrl, _) = controller();
        let t0 = Instant::now();
        ctrl.on_pose(
            PoseSample{ position: Vector3::new(0.0, 0.0, -1.0), orientation: frames::from_rpy_deg([0.0, 0.0, 90.0]) },
            t0,
        );

        let (tx, _rx) = channel::bounded(1);
        let forward = MotionGoal{
            position: Vector3::new(2.0, 0.0, 0.0),
            ..only(AxisMask{ x: true, y: true, ..Default::default() })
        }
        .with_mode(FrameMode::LocalRelative);
        ctrl.submit(1, forward, tx, t0);

        let [x, y, _] = ctrl.active_targets().unwrap().position;
        assert_relative_eq!(x.unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(y.unwrap(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orientation_tolerance(){
        let (mut ctrl, _) = controller();
        let t0 = Instant::now();
        let yawed = |deg: f64| PoseSample{ position: Vector3::zeros(), orientation: frames::from_rpy_deg([0.0, 0.0, deg]) };
        ctrl.on_pose(yawed(0.0), t0);

        let (tx, rx) = channel::bounded(1);
        ctrl.submit(1, only(AxisMask{ orientation: true, ..Default::default() }), tx, t0);

        ctrl.on_pose(yawed(8.0), ms(t0, 100));
        for n in (100..=500).step_by(100){
            ctrl.on_pose(yawed(8.0), ms(t0, n));
            ctrl.on_tick(ms(t0, n));
        }
        assert!(rx.try_recv().is_err());

        for n in (600..=900).step_by(100){
            ctrl.on_pose(yawed(3.0), ms(t0, n));
            ctrl.on_tick(ms(t0, n));
        }
        assert_eq!(rx.try_recv(), Ok(GoalOutcome::Succeeded));
    }

    #[test]
    fn test_server_runs_goal_over_bus(){
        let registry = TopicRegistry::new();
        let pid = RecordingPid::default();
        let config = ControlsConfig{
            time_to_settle_ms: 50,
            settle_check_period_ms: 10,
            bus_poll_period_ms: 5,
            ..ControlsConfig::default()
        };
        let (client, handle) = MotionGoalServer::new(&config, pid, &registry).spawn();

        let pose = registry.publisher::<PoseMsg>(topics::POSE);
        pose.publish(PoseMsg{ position: Vector3::new(1.0, 0.0, -1.0).into(), ..Default::default() });
        thread::sleep(Duration::from_millis(20));

        let goal = client.submit(only(AxisMask{ x: true, ..Default::default() })).unwrap();
        //x target is 0, vehicle sits at 1
        assert_eq!(goal.wait_timeout(Duration::from_millis(150)), None);

        let keep_publishing = thread::spawn(move ||{
            for _ in 0..40{
                pose.publish(PoseMsg{ position: Vector3::new(0.02, 0.0, -1.0).into(), ..Default::default() });
                thread::sleep(Duration::from_millis(5));
            }
        });
        assert_eq!(goal.wait_timeout(Duration::from_secs(2)), Some(GoalOutcome::Succeeded));
        keep_publishing.join().unwrap();

        let unreachable = MotionGoal{ position: Vector3::new(10.0, 0.0, 0.0), ..only(AxisMask{ x: true, ..Default::default() }) };
        let second = client.submit(unreachable).unwrap();
        assert!(second.id() > goal.id());
        client.shutdown();
        handle.join().unwrap();
        assert_eq!(second.wait().unwrap(), GoalOutcome::Aborted(AbortReason::Shutdown));
    }
}
