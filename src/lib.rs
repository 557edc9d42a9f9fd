pub mod config;
pub mod error;
pub mod ring_buffer;
pub mod pubsub;
pub mod uart;
pub mod auv;

pub use config::GncConfig;
pub use error::{GncError, Result};
pub use ring_buffer::RingBuffer;

pub use pubsub::{
    Message, Topic,
    Publisher,
    Subscriber,
    TopicRegistry,
};
