//! Per-link diagnostic ring buffer.

use chrono::Local;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Default number of entries a link keeps.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Bounded, timestamped log of what a data link did.
///
/// Appending never fails: a poisoned lock is recovered and the oldest entry is
/// evicted once the buffer is full.
#[derive(Debug)]
pub struct LinkLog {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl Default for LinkLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LinkLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, message: &str) {
        debug!(target: "triai::link", "{}", message);
        let entry = format!("[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
