//! Size-capped queue of outbound unreliable messages.

use log::warn;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Buffers small messages and packs them into chunks no larger than the
/// peer's maximum unreliable message size. Safe to call from any thread.
#[derive(Debug)]
pub struct SendQueue {
    max_size: usize,
    chunks: Mutex<VecDeque<Vec<u8>>>,
}

impl SendQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            chunks: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Appends `data` to the last chunk when it still fits, otherwise starts a
    /// new chunk. Messages larger than a whole chunk are dropped.
    pub fn enqueue(&self, data: &[u8]) -> bool {
        if data.is_empty() {
            return true;
        }
        if data.len() > self.max_size {
            warn!(
                "Dropping unreliable message of {} bytes (limit {})",
                data.len(),
                self.max_size
            );
            return false;
        }

        let mut chunks = self.chunks.lock();
        match chunks.back_mut() {
            Some(last) if last.len() + data.len() <= self.max_size => last.extend_from_slice(data),
            _ => chunks.push_back(data.to_vec()),
        }
        true
    }

    pub fn dequeue(&self) -> Option<Vec<u8>> {
        self.chunks.lock().pop_front()
    }

    /// Number of pending chunks.
    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    pub fn clear(&self) {
        self.chunks.lock().clear();
    }
}
