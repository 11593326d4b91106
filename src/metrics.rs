use std::time::Duration;

use serde::Serialize;

use crate::sample::Sample;

/// Sum over a run of completed buckets, plus how much time those buckets span.
///
/// `covered` is `buckets_included * granularity`; it is shorter than the
/// requested duration when the request exceeds the window or is not a whole
/// number of buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Total<T> {
    pub sum: T,
    pub covered: Duration,
}

impl<T: Sample> Total<T> {
    pub fn zero() -> Self {
        Self {
            sum: T::default(),
            covered: Duration::ZERO,
        }
    }

    /// Events per second over the covered span, 0 when nothing was covered.
    pub fn per_second(&self) -> f64 {
        let secs = self.covered.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.sum.to_f64() / secs
    }
}

impl<T: Sample> Default for Total<T> {
    fn default() -> Self {
        Self::zero()
    }
}

/// Point-in-time view of a window, newest completed bucket first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub window_ms: u128,
    pub granularity_ms: u128,
    pub bucket_count: usize,
    pub cursor: u64,
    pub running: bool,
    pub buckets: Vec<f64>,
}

impl Snapshot {
    pub fn total(&self) -> f64 {
        self.buckets.iter().sum()
    }
}
