use std::sync::Arc;
use std::collections::HashMap;
use std::any::Any;
use parking_lot::RwLock;
use super::topic::Topic;
use super::message::Message;
use super::publisher::Publisher;
use super::subscriber::Subscriber;

/// Process-wide table of named topics. Components only ever talk to each
/// other through topics obtained here.
pub struct TopicRegistry{
    typed_topics: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl TopicRegistry{
    pub fn new() -> Self{
        TopicRegistry{
            typed_topics: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the existing topic under `name`, or creates it. A name that is
    /// already bound to another message type gets replaced.
    pub fn get_or_create<T: Message>(&self, name: &str, capacity: usize) -> Arc<Topic<T>>{
        let mut topics = self.typed_topics.write();
        if let Some(existing) = topics.get(name){
            if let Ok(topic) = existing.clone().downcast::<Topic<T>>(){
                return topic;
            }
            tracing::warn!(topic = name, "topic re-registered with a different message type");
        }
        let topic = Arc::new(Topic::<T>::new(name, capacity));
        topics.insert(name.to_string(), topic.clone() as Arc<dyn Any + Send + Sync>);
        topic
    }

    pub fn publisher<T: Message>(&self, name: &str) -> Publisher<T>{
        Publisher::new(self.get_or_create(name, super::topic::LATEST_ONLY))
    }

    pub fn subscriber<T: Message>(&self, name: &str) -> Subscriber<T>{
        Subscriber::new(self.get_or_create(name, super::topic::LATEST_ONLY))
    }

    pub fn topic_count(&self) -> usize{
        self.typed_topics.read().len()
    }
}

impl Default for TopicRegistry{
    fn default() -> Self{
        Self::new()
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_registry_get_or_create(){
        let registry = TopicRegistry::new();
        let topic1: Arc<Topic<f64>> = registry.get_or_create("/depth", 1);
        let topic2: Arc<Topic<bool>> = registry.get_or_create("/controls/pid/z/enable", 1);
        assert_eq!(topic1.name(), "/depth");
        assert_eq!(topic2.name(), "/controls/pid/z/enable");
        assert_eq!(registry.topic_count(), 2);
    }

    #[test]
    fn test_registry_same_topic_returns_same(){
        let registry = TopicRegistry::new();
        let publisher = registry.publisher::<i32>("/imu");
        let subscriber = registry.subscriber::<i32>("/imu");
        publisher.publish(42);
        assert_eq!(subscriber.try_recv_latest(), Some(42));
        assert_eq!(registry.topic_count(), 1);
    }
}
