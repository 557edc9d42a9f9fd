use crate::ring_buffer::RingBuffer;
use super::message::Message;

/// Queue depth used across the bus: a newer message always supersedes an
/// unconsumed older one
pub const LATEST_ONLY: usize = 1;

pub struct Topic<T: Message>{
    name: String,
    buffer: RingBuffer<T>,
}

impl<T: Message> Topic<T>{
    pub fn new(name: &str, capacity: usize) -> Self{
        Topic{
            name: name.to_string(),
            buffer: RingBuffer::new(capacity),
        }
    }

    pub fn name(&self) -> &str{
        &self.name
    }

    pub fn publish(&self, msg: T) -> u64{
        self.buffer.push(msg)
    }

    pub fn peek_latest(&self) -> Option<(T, u64)>{
        self.buffer.peek_latest()
    }

    pub fn latest_epoch(&self) -> u64{
        self.buffer.latest_epoch()
    }
}
