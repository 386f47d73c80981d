//! Bounded history of deleted documents.

use crate::placeables::Placeable;
use std::collections::VecDeque;

/// Default number of deletion batches kept.
pub const DEFAULT_DELETION_HISTORY: usize = 10;

/// Recent deletion batches, newest last. Only deletions are recorded;
/// this is not a general undo stack.
#[derive(Debug, Clone)]
pub struct DeletionHistory {
    batches: VecDeque<Vec<Placeable>>,
    capacity: usize,
}

impl Default for DeletionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_DELETION_HISTORY)
    }
}

impl DeletionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            batches: VecDeque::new(),
            capacity,
        }
    }

    /// Record a deletion batch, dropping the oldest when full.
    pub fn push(&mut self, batch: Vec<Placeable>) {
        if batch.is_empty() || self.capacity == 0 {
            return;
        }
        self.batches.push_back(batch);
        while self.batches.len() > self.capacity {
            self.batches.pop_front();
        }
    }

    /// Take the most recent batch.
    pub fn pop(&mut self) -> Option<Vec<Placeable>> {
        self.batches.pop_back()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
