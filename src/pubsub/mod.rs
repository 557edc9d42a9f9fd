pub mod message;
pub mod topic;
pub mod publisher;
pub mod subscriber;
pub mod registry;

pub use message::Message;
pub use topic::{Topic, LATEST_ONLY};
pub use publisher::Publisher;
pub use subscriber::Subscriber;
pub use registry::TopicRegistry;

#[cfg(test)]
mod tests{
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_pubsub_threaded_latest_wins(){
        let registry = Arc::new(TopicRegistry::new());
        let publisher = registry.publisher::<u32>("/threaded");
        let subscriber = registry.subscriber::<u32>("/threaded");

        let done = Arc::new(AtomicBool::new(false));
        let done_flag = Arc::clone(&done);

        let num_items = 1000;

        let producer = thread::spawn(move ||{
            for i in 1..=num_items{
                publisher.publish(i);
            }
            done_flag.store(true, Ordering::SeqCst);
        });

        let consumer = thread::spawn(move ||{
            let mut received = Vec::new();
            loop{
                match subscriber.try_recv_latest(){
                    Some(val) => received.push(val),
                    None =>{
                        if done.load(Ordering::SeqCst){
                            if let Some(val) = subscriber.try_recv_latest(){
                                received.push(val);
                            }
                            break;
                        }
                        std::hint::spin_loop();
                    }
                }
            }
            received
        });

        producer.join().unwrap();
        let received = consumer.join().unwrap();

        //stale values may be skipped but never reordered, and the last one always lands
        assert_eq!(received.last(), Some(&num_items));
        for i in 1..received.len(){
            assert!(received[i] > received[i - 1]);
        }
    }
}
