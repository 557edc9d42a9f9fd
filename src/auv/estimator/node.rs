/**
 * Estimator bus node
 *
 * Drains the sensor topics into the estimator and publishes the world-frame
 * pose on a fixed period. Fix updates and the publish computation run under
 * the same lock, so `EstimatorHandle::current_estimate` never observes a
 * half-applied update.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EstimatorConfig;
use crate::pubsub::{Publisher, Subscriber, TopicRegistry};
use super::{PoseEstimate, StateEstimator};
use crate::auv::messages::{
    DeadReckonReport, DepthMsg, ImuQuaternion, ImuRate, PoseMsg, Vector3Msg,
};
use crate::auv::topics;

/// Shared read access to the estimator for in-process consumers
#[derive(Clone)]
pub struct EstimatorHandle{
    inner: Arc<Mutex<StateEstimator>>,
}

impl EstimatorHandle{
    pub fn current_estimate(&self) -> Option<PoseEstimate>{
        self.inner.lock().current_estimate()
    }
}

struct Inputs{
    imu: Subscriber<ImuQuaternion>,
    imu_rate: Subscriber<ImuRate>,
    depth: Subscriber<DepthMsg>,
    dead_reckon: Subscriber<DeadReckonReport>,
    reset_full: Subscriber<()>,
    reset_planar: Subscriber<()>,
}

struct Outputs{
    pose_world: Publisher<PoseMsg>,
    world_offset: Publisher<PoseMsg>,
    angular_velocity: Publisher<Vector3Msg>,
    components: [Publisher<f64>; 6],
}

pub struct EstimatorNode{
    estimator: Arc<Mutex<StateEstimator>>,
    inputs: Inputs,
    outputs: Outputs,
    poll_period: Duration,
    publish_period: Duration,
}

impl EstimatorNode{
    pub fn new(config: &EstimatorConfig, registry: &TopicRegistry) -> Self{
        let inputs = Inputs{
            imu: registry.subscriber(topics::IMU_QUATERNION),
            imu_rate: registry.subscriber(topics::IMU_RATE),
            depth: registry.subscriber(topics::DEPTH),
            dead_reckon: registry.subscriber(topics::DEAD_RECKON_REPORT),
            reset_full: registry.subscriber(topics::RESET_STATE_FULL),
            reset_planar: registry.subscriber(topics::RESET_STATE_PLANAR),
        };
        let outputs = Outputs{
            pose_world: registry.publisher(topics::POSE),
            world_offset: registry.publisher(topics::POSE_WORLD),
            angular_velocity: registry.publisher(topics::ANGULAR_VELOCITY),
            components: [
                registry.publisher(topics::STATE_X),
                registry.publisher(topics::STATE_Y),
                registry.publisher(topics::STATE_Z),
                registry.publisher(topics::STATE_THETA_X),
                registry.publisher(topics::STATE_THETA_Y),
                registry.publisher(topics::STATE_THETA_Z),
            ],
        };

        Self{
            estimator: Arc::new(Mutex::new(StateEstimator::new(config))),
            inputs,
            outputs,
            poll_period: config.poll_period(),
            publish_period: config.publish_period(),
        }
    }

    pub fn handle(&self) -> EstimatorHandle{
        EstimatorHandle{ inner: Arc::clone(&self.estimator) }
    }

    /// Apply every pending sensor fix and reset trigger. Returns how many
    /// messages were consumed.
    pub fn poll(&self) -> usize{
        let mut est = self.estimator.lock();
        let mut consumed = 0;

        if let Some(msg) = self.inputs.imu.try_recv_latest(){
            est.update_imu(msg.quaternion.into());
            consumed += 1;
        }
        if let Some(msg) = self.inputs.imu_rate.try_recv_latest(){
            est.update_imu_rate(msg.gyro.into());
            consumed += 1;
        }
        if let Some(msg) = self.inputs.depth.try_recv_latest(){
            est.update_depth(msg.depth);
            consumed += 1;
        }
        if let Some(msg) = self.inputs.dead_reckon.try_recv_latest(){
            est.update_dead_reckon(&msg);
            consumed += 1;
        }

        if self.inputs.reset_full.try_recv_latest().is_some(){
            consumed += 1;
            if let Err(err) = est.reset_full(){
                warn!(%err, "full reset ignored");
            }
        }
        if self.inputs.reset_planar.try_recv_latest().is_some(){
            consumed += 1;
            if let Err(err) = est.reset_planar(){
                warn!(%err, "planar reset ignored");
            }
        }

        consumed
    }

    /// Publish the current estimate. Returns false, without publishing,
    /// while the estimate is not ready.
    pub fn publish(&self) -> bool{
        let Some(pose) = self.estimator.lock().current_estimate() else{
            return false;
        };

        self.outputs.pose_world.publish(PoseMsg{
            position: pose.position_world.into(),
            orientation: pose.orientation_world.into(),
        });
        self.outputs.world_offset.publish(PoseMsg{
            position: pose.world_offset.position.into(),
            orientation: pose.world_offset.orientation.into(),
        });
        self.outputs.angular_velocity.publish(pose.angular_velocity.into());

        let [theta_x, theta_y, theta_z] = pose.theta_world_deg();
        let p = pose.position_world;
        let values = [p.x, p.y, p.z, theta_x, theta_y, theta_z];
        for (publisher, value) in self.outputs.components.iter().zip(values){
            publisher.publish(value);
        }
        true
    }

    /// Run until `running` is cleared
    pub fn spawn(self, running: Arc<AtomicBool>) -> JoinHandle<()>{
        thread::spawn(move ||{
            info!(period_ms = self.publish_period.as_millis() as u64, "state estimator started");
            let mut last_publish = Instant::now();
            let mut was_ready = false;

            while running.load(Ordering::SeqCst){
                self.poll();

                if last_publish.elapsed() >= self.publish_period{
                    last_publish = Instant::now();
                    let ready = self.publish();
                    if ready != was_ready{
                        debug!(ready, "estimate readiness changed");
                        was_ready = ready;
                    }
                }

                thread::sleep(self.poll_period);
            }
            info!("state estimator stopped");
        })
    }
}
