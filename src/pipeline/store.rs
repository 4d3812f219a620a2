use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::metrics::Sample;

/// Fixed-capacity ring of samples, oldest first.
///
/// Appends never fail: once full, the oldest entry is overwritten. Time
/// eviction assumes samples arrive in timestamp order and does not reorder
/// anything that did not.
#[derive(Debug, Clone)]
pub struct SampleStore {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleStore {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Returns `ZeroCapacity` when `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(PipelineError::ZeroCapacity);
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity.min(INITIAL_ALLOCATION)),
            capacity,
        })
    }

    pub fn append(&mut self, sample: Sample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    #[must_use]
    pub fn all(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// Drops samples from the front while they are older than `cutoff` and
    /// returns how many were removed.
    pub fn evict_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut evicted = 0usize;
        while self
            .samples
            .front()
            .is_some_and(|sample| sample.timestamp < cutoff)
        {
            self.samples.pop_front();
            evicted = evicted.saturating_add(1);
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

const INITIAL_ALLOCATION: usize = 4096;
