//! Bounded, overwrite-oldest line buffer used by Overwatch to retain
//! recent process output per request.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A fixed-capacity FIFO of `String`s. When full, writing drops the oldest
/// entry. Capacity <= 0 coerces to the default of 50.
pub struct RingBuffer {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

const DEFAULT_CAPACITY: usize = 50;

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a line, overwriting the oldest entry if at capacity.
    pub fn write(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// The last `min(k, len)` entries, in arrival order.
    pub fn last(&self, k: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(k);
        lines.iter().skip(skip).cloned().collect()
    }

    /// All retained entries, in arrival order.
    pub fn all(&self) -> Vec<String> {
        self.last(self.capacity)
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
