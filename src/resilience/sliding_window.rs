//! Count-based sliding window of call outcomes.
//!
//! A fixed-capacity ring of bits (`1` = failure). Once full, each new
//! sample evicts the oldest one and the failure count is adjusted by the
//! evicted slot's contribution.
//!
//! # Design Decisions
//! - Bits packed into `u64` words so cloning a snapshot stays cheap
//! - Not thread-aware; the owning breaker swaps whole snapshots
//! - Denominator is the number of samples held, not the capacity

const WORD_BITS: usize = 64;

/// Ring buffer of the most recent `capacity` recorded outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindow {
    slots: Vec<u64>,
    capacity: usize,
    minimum_calls: usize,
    write_index: usize,
    filled: usize,
    failures: usize,
}

impl SlidingWindow {
    /// Create an empty window.
    ///
    /// A zero `capacity` is clamped to one; `minimum_calls` is clamped into
    /// `1..=capacity`. Validated configs never hit either clamp.
    pub fn new(capacity: usize, minimum_calls: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
            minimum_calls: minimum_calls.clamp(1, capacity),
            write_index: 0,
            filled: 0,
            failures: 0,
        }
    }

    /// Record one outcome, evicting the oldest sample once full.
    pub fn record(&mut self, is_failure: bool) {
        let word = self.write_index / WORD_BITS;
        let mask = 1u64 << (self.write_index % WORD_BITS);

        if self.filled == self.capacity {
            if self.slots[word] & mask != 0 {
                self.failures -= 1;
            }
        } else {
            self.filled += 1;
        }

        if is_failure {
            self.slots[word] |= mask;
            self.failures += 1;
        } else {
            self.slots[word] &= !mask;
        }

        self.write_index = (self.write_index + 1) % self.capacity;
    }

    /// Failure rate in whole percent, or `None` while fewer than
    /// `minimum_calls` samples are held.
    pub fn failure_rate_percent(&self) -> Option<u32> {
        if self.filled < self.minimum_calls {
            return None;
        }
        let rate = self.failures.saturating_mul(100) / self.filled;
        Some(rate.min(100) as u32)
    }

    /// Number of samples currently in the window.
    pub fn buffered_calls(&self) -> usize {
        self.filled
    }

    /// Number of failures among the buffered samples.
    pub fn failed_calls(&self) -> usize {
        self.failures
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every sample.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|w| *w = 0);
        self.write_index = 0;
        self.filled = 0;
        self.failures = 0;
    }
}
