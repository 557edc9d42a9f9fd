use std::collections::VecDeque;
use parking_lot::Mutex;

//slots plus the epoch counter, guarded together so a reader never sees
//a slot whose epoch disagrees with the writer's count
struct Inner<T>{
    slots: VecDeque<(T, u64)>,
    write_epoch: u64, //inc on push
}

//bounded ring buffer with per-slot epochs and freshness bias:
//pushing into a full buffer drops the oldest entry instead of blocking
pub struct RingBuffer<T>{
    inner: Mutex<Inner<T>>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T>{
    pub fn new(capacity: usize) -> Self{
        assert!(capacity > 0, "ring buffer capacity must be greater than 0");

        RingBuffer{
            inner: Mutex::new(Inner{
                slots: VecDeque::with_capacity(capacity),
                write_epoch: 0,
            }),
            capacity,
        }
    }

    //push item, discarding the oldest if full
    //returns the epoch num. of the push
    pub fn push(&self, item: T) -> u64{
        let mut inner = self.inner.lock();

        if inner.slots.len() == self.capacity{
            inner.slots.pop_front();
        }

        inner.write_epoch += 1;
        let epoch = inner.write_epoch;
        inner.slots.push_back((item, epoch));
        epoch
    }

    //peek at latest item without removing
    pub fn peek_latest(&self) -> Option<(T, u64)>{
        self.inner.lock().slots.back().cloned()
    }

    //latest epoch ever written, survives overwrites
    pub fn latest_epoch(&self) -> u64{
        self.inner.lock().write_epoch
    }

    pub fn len(&self) -> usize{
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool{
        self.inner.lock().slots.is_empty()
    }

}
