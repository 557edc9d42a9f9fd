/**
 * Thruster serial link
 *
 * Forwards every new PWM command from the bus to the STM32 and drains the
 * frames it sends back. The last frame written on exit is always
 * all-neutral.
 */

pub mod protocol;
pub use protocol::*;

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, error, info, warn};

use crate::auv::messages::ThrusterMicroseconds;
use crate::auv::topics;
use crate::error::{GncError, Result};
use crate::pubsub::{Subscriber, TopicRegistry};

const READ_TIMEOUT: Duration = Duration::from_millis(10);

pub struct ThrusterLink<P: Read + Write + Send>{
    port: P,
    commands: Subscriber<ThrusterMicroseconds>,
    neutral: ThrusterMicroseconds,
    decoder: FrameDecoder,
}

impl ThrusterLink<Box<dyn SerialPort>>{
    pub fn open(port_name: &str, baud_rate: u32, neutral: u16, registry: &TopicRegistry) -> Result<Self>{
        let port = serialport::new(port_name, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        info!(port = port_name, baud_rate, "serial port open");
        Ok(Self::new(port, neutral, registry))
    }
}

impl<P: Read + Write + Send + 'static> ThrusterLink<P>{
    pub fn new(port: P, neutral: u16, registry: &TopicRegistry) -> Self{
        Self{
            port,
            commands: registry.subscriber(topics::THRUSTER_MICROSECONDS),
            neutral: ThrusterMicroseconds::uniform(neutral),
            decoder: FrameDecoder::new(),
        }
    }

    pub fn send_pwm(&mut self, command: &ThrusterMicroseconds) -> Result<()>{
        let payload = ThrusterPwmCmd::new(command.microseconds).to_bytes();
        let frame = encode_frame(MsgType::Thruster, &payload)
            .ok_or(GncError::FrameTooLarge(payload.len()))?;
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }

    /// Send the newest unseen command, if any
    pub fn forward(&mut self) -> Result<bool>{
        let Some(command) = self.commands.try_recv_latest() else{
            return Ok(false);
        };
        self.send_pwm(&command)?;
        Ok(true)
    }

    /// Read whatever the board sent and log the frames
    pub fn drain_incoming(&mut self) -> Result<usize>{
        let mut read_buf = [0u8; 256];
        match self.port.read(&mut read_buf){
            Ok(n) => self.decoder.extend(&read_buf[..n]),
            Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
            Err(e) => return Err(e.into()),
        }

        let mut frames = 0;
        while let Some(frame) = self.decoder.next_frame(){
            frames += 1;
            match frame.msg_type{
                MsgType::Heartbeat => debug!("stm32 heartbeat"),
                MsgType::Thruster => debug!(len = frame.payload.len(), "stm32 thruster echo"),
            }
        }
        Ok(frames)
    }

    pub fn spawn(mut self, running: Arc<AtomicBool>) -> JoinHandle<()>{
        thread::spawn(move ||{
            info!("thruster link started");
            while running.load(Ordering::SeqCst){
                if let Err(err) = self.forward(){
                    warn!(%err, "thruster command not sent");
                }
                if let Err(err) = self.drain_incoming(){
                    warn!(%err, "serial read failed");
                    thread::sleep(READ_TIMEOUT);
                }
            }

            let neutral = self.neutral;
            match self.send_pwm(&neutral){
                Ok(()) => info!("thruster link stopped, neutral sent"),
                Err(err) => error!(%err, "could not send neutral on shutdown"),
            }
        })
    }
}
