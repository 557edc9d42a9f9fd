/**
 * AUV Controller
 *
 * Wires every GNC component onto one topic registry:
 * 1. State estimator (sensor topics -> pose topics)
 * 2. Motion goal server and effort server (goals -> PID setpoints/efforts)
 * 3. Thrust allocator (effort wrench -> thruster PWM)
 * 4. Optional serial link forwarding PWM to the STM32
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::config::GncConfig;
use crate::error::Result;
use crate::pubsub::{Publisher, TopicRegistry};
use crate::uart::ThrusterLink;
use super::effort::{EffortClient, EffortServer};
use super::estimator::{EstimatorHandle, EstimatorNode};
use super::motion::{MotionGoalClient, MotionGoalServer};
use super::pid::BusPidInterface;
use super::thrust_allocator::AllocatorNode;
use super::topics;

/// Serial port carrying thruster commands
#[derive(Debug, Clone)]
pub struct SerialSettings{
    pub port: String,
    pub baud_rate: u32,
}

pub struct AuvController{
    registry: Arc<TopicRegistry>,
    running: Arc<AtomicBool>,
    link_running: Arc<AtomicBool>,
    estimator: EstimatorHandle,
    motion: MotionGoalClient,
    effort: EffortClient<BusPidInterface>,
    reset_full: Publisher<()>,
    reset_planar: Publisher<()>,
    //stopped in order: goals, sensors and propulsion, then the serial link
    motion_thread: Option<JoinHandle<()>>,
    node_threads: Vec<(&'static str, JoinHandle<()>)>,
    link_thread: Option<JoinHandle<()>>,
}

impl AuvController{
    /// Build every component and start its thread
    pub fn start(config: &GncConfig, serial: Option<&SerialSettings>) -> Result<Self>{
        config.validate()?;
        let registry = Arc::new(TopicRegistry::new());
        let running = Arc::new(AtomicBool::new(true));
        let link_running = Arc::new(AtomicBool::new(true));

        //fail before spawning anything
        let allocator = AllocatorNode::new(&config.propulsion, &registry)?;
        let link = match serial{
            Some(s) => Some(ThrusterLink::open(&s.port, s.baud_rate, config.propulsion.pwm_neutral, &registry)?),
            None => None,
        };

        let estimator_node = EstimatorNode::new(&config.estimator, &registry);
        let estimator = estimator_node.handle();

        let (motion, motion_thread) = MotionGoalServer::new(
            &config.controls,
            BusPidInterface::new(&registry),
            &registry,
        )
        .spawn();
        let effort = EffortClient::new(EffortServer::new(BusPidInterface::new(&registry)));

        let node_threads = vec![
            ("estimator", estimator_node.spawn(Arc::clone(&running))),
            ("allocator", allocator.spawn(Arc::clone(&running))),
        ];
        let link_thread = link.map(|l| l.spawn(Arc::clone(&link_running)));

        info!(serial = serial.is_some(), topics = registry.topic_count(), "auv controller started");

        Ok(Self{
            reset_full: registry.publisher(topics::RESET_STATE_FULL),
            reset_planar: registry.publisher(topics::RESET_STATE_PLANAR),
            registry,
            running,
            link_running,
            estimator,
            motion,
            effort,
            motion_thread: Some(motion_thread),
            node_threads,
            link_thread,
        })
    }

    /// Shared bus, for sensor drivers and the external PID loops
    pub fn registry(&self) -> &Arc<TopicRegistry>{
        &self.registry
    }

    pub fn estimator(&self) -> &EstimatorHandle{
        &self.estimator
    }

    pub fn motion(&self) -> &MotionGoalClient{
        &self.motion
    }

    pub fn effort(&self) -> &EffortClient<BusPidInterface>{
        &self.effort
    }

    /// Make the current pose the world origin
    pub fn reset_full(&self){
        self.reset_full.publish(());
    }

    /// Re-zero x, y and heading only
    pub fn reset_planar(&self){
        self.reset_planar.publish(());
    }

    pub fn is_running(&self) -> bool{
        self.running.load(Ordering::SeqCst)
    }

    /// Stop every component. Thrusters end at neutral.
    pub fn shutdown(&mut self){
        if !self.running.swap(false, Ordering::SeqCst){
            return;
        }
        info!("auv controller shutting down");

        self.motion.shutdown();
        if let Some(handle) = self.motion_thread.take(){
            join("motion", handle);
        }
        for (name, handle) in self.node_threads.drain(..){
            join(name, handle);
        }

        self.link_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.link_thread.take(){
            join("serial link", handle);
        }
        info!("auv controller stopped");
    }
}

impl Drop for AuvController{
    fn drop(&mut self){
        self.shutdown();
    }
}

fn join(name: &str, handle: JoinHandle<()>){
    if handle.join().is_err(){
        error!(component = name, "thread panicked");
    }
}
