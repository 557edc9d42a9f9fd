use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use super::topic::Topic;
use super::message::Message;

/// Reader handle on a topic. Each subscriber keeps its own last-seen epoch,
/// so any number of them can follow the same topic with `try_recv_latest`
/// without stealing messages from one another.
pub struct Subscriber<T: Message>{
    topic: Arc<Topic<T>>,
    last_seen_epoch: AtomicU64,
}

impl<T: Message> Subscriber<T>{
    pub fn new(topic: Arc<Topic<T>>) -> Self{
        Subscriber{
            topic,
            last_seen_epoch: AtomicU64::new(0),
        }
    }

    /// Latest message this subscriber has not seen yet
    pub fn try_recv_latest(&self) -> Option<T>{
        let (msg, epoch) = self.topic.peek_latest()?;
        let last = self.last_seen_epoch.fetch_max(epoch, Ordering::SeqCst);
        (epoch > last).then_some(msg)
    }

    pub fn mark_seen(&self){
        let current = self.topic.latest_epoch();
        self.last_seen_epoch.fetch_max(current, Ordering::SeqCst);
    }

    pub fn topic_name(&self) -> &str{
        self.topic.name()
    }
}
