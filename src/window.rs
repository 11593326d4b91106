use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::clock::Clock;
use crate::error::{Result, WindowError};
use crate::metrics::{Snapshot, Total};
use crate::sample::Sample;
use crate::state::Buckets;

pub type FloatWindow = SlidingWindow<f64>;
pub type IntWindow = SlidingWindow<i64>;

/// Checks a window/granularity pair and returns the number of buckets.
pub fn validate(window: Duration, granularity: Duration) -> Result<usize> {
    if window.is_zero() {
        return Err(WindowError::ZeroWindow);
    }
    if granularity.is_zero() {
        return Err(WindowError::ZeroGranularity);
    }
    // a single bucket would be both the current and the only completed one
    if window <= granularity || window.as_nanos() % granularity.as_nanos() != 0 {
        return Err(WindowError::NotMultiple);
    }
    usize::try_from(window.as_nanos() / granularity.as_nanos())
        .map_err(|_| WindowError::TooManyBuckets)
}

/// Counter that keeps the last `window` of activity in `granularity`-sized
/// buckets, aged out by a background clock thread.
///
/// All operations take `&self`; share the counter across threads with `Arc`.
pub struct SlidingWindow<T: Sample> {
    window: Duration,
    granularity: Duration,
    state: Arc<Mutex<Buckets<T>>>,
    clock: Mutex<Option<Clock>>,
}

impl<T: Sample> SlidingWindow<T> {
    /// Creates the counter and starts its clock.
    pub fn new(window: Duration, granularity: Duration) -> Result<Self> {
        let counter = Self::manual(window, granularity)?;
        let clock = Clock::start(Arc::clone(&counter.state), granularity)?;
        *counter.clock_slot() = Some(clock);
        debug!(?window, ?granularity, buckets = counter.bucket_count(), "Sliding window created");
        Ok(counter)
    }

    /// Like [`SlidingWindow::new`] but treats misconfiguration as a bug.
    ///
    /// # Panics
    ///
    /// Panics with the validation message if the arguments are invalid or the
    /// clock thread cannot be spawned.
    pub fn must_new(window: Duration, granularity: Duration) -> Self {
        match Self::new(window, granularity) {
            Ok(counter) => counter,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a counter without a clock. Buckets only rotate when
    /// [`SlidingWindow::advance`] is called.
    pub fn manual(window: Duration, granularity: Duration) -> Result<Self> {
        let count = validate(window, granularity)?;
        Ok(Self {
            window,
            granularity,
            state: Arc::new(Mutex::new(Buckets::new(window, granularity, count))),
            clock: Mutex::new(None),
        })
    }

    fn buckets(&self) -> MutexGuard<'_, Buckets<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clock_slot(&self) -> MutexGuard<'_, Option<Clock>> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets().len()
    }

    /// Number of granularity ticks since creation.
    pub fn cursor(&self) -> u64 {
        self.buckets().cursor()
    }

    pub fn is_running(&self) -> bool {
        self.clock_slot().as_ref().map_or(false, Clock::is_running)
    }

    /// Accumulates `value` into the bucket currently being written.
    pub fn add(&self, value: T) {
        self.buckets().add(value);
    }

    /// Performs one clock step by hand.
    pub fn advance(&self) {
        self.buckets().advance();
    }

    /// Sum of the most recent `duration / granularity` completed buckets,
    /// capped at the window. Remainders shorter than a bucket are dropped.
    pub fn total(&self, duration: Duration) -> Total<T> {
        self.buckets().total(duration)
    }

    /// Mean per bucket over the same buckets [`SlidingWindow::total`] sums.
    pub fn average(&self, duration: Duration) -> f64 {
        self.buckets().average(duration)
    }

    /// Events per second over the last `duration`.
    pub fn rate(&self, duration: Duration) -> f64 {
        self.total(duration).per_second()
    }

    /// Sum over an offset range of the window, where `0` is the oldest
    /// retained instant and `window` is now. Empty or inverted ranges are zero.
    pub fn range_total(&self, from: Duration, to: Duration) -> Total<T> {
        self.buckets().range_total(from, to)
    }

    pub fn range_average(&self, from: Duration, to: Duration) -> f64 {
        self.buckets().range_average(from, to)
    }

    /// Zeroes every bucket. The clock keeps running.
    pub fn reset(&self) {
        self.buckets().reset();
        trace!("Sliding window reset");
    }

    /// Halts the clock for good. The counter stays usable but stops aging.
    pub fn stop(&self) {
        let clock = self.clock_slot().take();
        if let Some(mut clock) = clock {
            clock.stop();
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let running = self.is_running();
        let buckets = self.buckets();
        Snapshot {
            window_ms: self.window.as_millis(),
            granularity_ms: self.granularity.as_millis(),
            bucket_count: buckets.len(),
            cursor: buckets.cursor(),
            running,
            buckets: buckets.by_age().into_iter().map(T::to_f64).collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn seeded(window: Duration, granularity: Duration, samples: &[T], cursor: u64) -> Self {
        let counter = Self::manual(window, granularity).unwrap();
        counter.buckets().seed(samples, cursor);
        counter
    }
}

impl<T: Sample> fmt::Debug for SlidingWindow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindow")
            .field("window", &self.window)
            .field("granularity", &self.granularity)
            .field("cursor", &self.cursor())
            .field("running", &self.is_running())
            .finish()
    }
}

impl<T: Sample> Drop for SlidingWindow<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
