//! Sliding window failure tracker.
//!
//! # Responsibilities
//! - Remember the last `size` probe outcomes of one host
//! - Report the failure rate over those outcomes in O(1)
//!
//! # Design Decisions
//! - Starts as all successes so a new host is not penalized
//! - No internal locking; the scorer owns every window

/// Fixed-capacity ring of probe outcomes (`true` = success).
#[derive(Debug, Clone)]
pub struct Window {
    items: Vec<bool>,
    /// Slot that the next outcome overwrites (the oldest one).
    next: usize,
    failure_count: usize,
}

impl Window {
    /// Create a new window. A size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            items: vec![true; size],
            next: 0,
            failure_count: 0,
        }
    }

    /// Record one outcome, evicting the oldest.
    pub fn put(&mut self, success: bool) {
        let evicted = std::mem::replace(&mut self.items[self.next], success);
        if !evicted {
            self.failure_count -= 1;
        }
        if !success {
            self.failure_count += 1;
        }
        self.next = (self.next + 1) % self.items.len();
    }

    /// Fraction of failures among the remembered outcomes.
    pub fn failure_rate(&self) -> f64 {
        self.failure_count as f64 / self.items.len() as f64
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }
}
