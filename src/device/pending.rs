//! Deferred host frames
//!
//! Host frames that arrive while a bulk transfer is running are parked here
//! unaltered and replayed in arrival order once the transfer ends. The queue
//! never drops: a full queue is a fatal condition.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::constants::PENDING_QUEUE_CAPACITY;
use crate::error::FatalError;
use crate::protocol::Frame;

pub struct PendingFrameQueue {
    queue: ArrayQueue<Frame>,
    high_water: AtomicUsize,
}

impl PendingFrameQueue {
    pub fn new() -> Self {
        Self::with_capacity(PENDING_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            high_water: AtomicUsize::new(0),
        }
    }

    /// Park a frame
    pub fn push(&self, frame: Frame) -> Result<(), FatalError> {
        self.queue.push(frame).map_err(|_| FatalError::PendingQueueOverflow {
            capacity: self.queue.capacity(),
        })?;
        self.high_water.fetch_max(self.queue.len(), Ordering::Relaxed);
        Ok(())
    }

    /// Oldest parked frame
    pub fn pop(&self) -> Option<Frame> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Deepest the queue has been
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }
}

impl Default for PendingFrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
