use std::ops::Range;
use std::time::Duration;

use crate::metrics::Total;
use crate::sample::Sample;

/// Ring of per-granularity accumulators plus the tick cursor.
///
/// A completed bucket of age `k` (0 = newest) lives at physical index
/// `(cursor - 1 - k) mod len`; the bucket at `cursor mod len` is the one
/// being written.
#[derive(Debug)]
pub(crate) struct Buckets<T> {
    window: Duration,
    granularity: Duration,
    samples: Box<[T]>,
    cursor: u64,
}

impl<T: Sample> Buckets<T> {
    pub(crate) fn new(window: Duration, granularity: Duration, count: usize) -> Self {
        Self {
            window,
            granularity,
            samples: vec![T::default(); count].into_boxed_slice(),
            cursor: 0,
        }
    }

    pub(crate) fn cursor(&self) -> u64 {
        self.cursor
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    fn current(&self) -> usize {
        (self.cursor % self.samples.len() as u64) as usize
    }

    fn index_for_age(&self, age: usize) -> usize {
        let len = self.samples.len();
        (self.current() + len - 1 - age) % len
    }

    pub(crate) fn add(&mut self, value: T) {
        let idx = self.current();
        self.samples[idx] = self.samples[idx].accumulate(value);
    }

    /// One clock step: move to the next bucket and clear it.
    pub(crate) fn advance(&mut self) {
        self.cursor += 1;
        let idx = self.current();
        self.samples[idx] = T::default();
    }

    pub(crate) fn reset(&mut self) {
        self.samples.fill(T::default());
    }

    fn sum_ages(&self, ages: Range<usize>) -> (T, usize) {
        let count = ages.len();
        let mut sum = T::default();
        for age in ages {
            sum = sum.accumulate(self.samples[self.index_for_age(age)]);
        }
        (sum, count)
    }

    fn covered(&self, buckets: usize) -> Duration {
        u32::try_from(buckets).map_or(Duration::MAX, |n| self.granularity.saturating_mul(n))
    }

    fn suffix_ages(&self, duration: Duration) -> Range<usize> {
        let n = duration.as_nanos() / self.granularity.as_nanos();
        0..n.min(self.samples.len() as u128) as usize
    }

    /// Maps an offset range measured from the oldest retained instant onto
    /// bucket ages. Ages below `window - to` are excluded, the upper age bound
    /// truncates like a suffix query, and both ends clip to the ring.
    fn range_ages(&self, from: Duration, to: Duration) -> Range<usize> {
        let window = self.window.as_nanos() as i128;
        let g = self.granularity.as_nanos() as i128;
        let len = self.samples.len() as i128;

        let age_from = window - to.as_nanos() as i128;
        let age_to = window - from.as_nanos() as i128;

        let lo = (-(-age_from).div_euclid(g)).clamp(0, len);
        let hi = age_to.div_euclid(g).clamp(0, len);
        if hi <= lo {
            return 0..0;
        }
        lo as usize..hi as usize
    }

    fn total_of(&self, ages: Range<usize>) -> Total<T> {
        let (sum, count) = self.sum_ages(ages);
        Total {
            sum,
            covered: self.covered(count),
        }
    }

    fn average_of(&self, ages: Range<usize>) -> f64 {
        let (sum, count) = self.sum_ages(ages);
        if count == 0 {
            return 0.0;
        }
        sum.to_f64() / count as f64
    }

    pub(crate) fn total(&self, duration: Duration) -> Total<T> {
        self.total_of(self.suffix_ages(duration))
    }

    pub(crate) fn average(&self, duration: Duration) -> f64 {
        self.average_of(self.suffix_ages(duration))
    }

    pub(crate) fn range_total(&self, from: Duration, to: Duration) -> Total<T> {
        self.total_of(self.range_ages(from, to))
    }

    pub(crate) fn range_average(&self, from: Duration, to: Duration) -> f64 {
        self.average_of(self.range_ages(from, to))
    }

    /// Buckets ordered by age, newest first.
    pub(crate) fn by_age(&self) -> Vec<T> {
        (0..self.samples.len())
            .map(|age| self.samples[self.index_for_age(age)])
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn seed(&mut self, samples: &[T], cursor: u64) {
        assert_eq!(samples.len(), self.samples.len());
        self.samples.copy_from_slice(samples);
        self.cursor = cursor;
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &[T] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn seeded<T: Sample>(samples: &[T], cursor: u64) -> Buckets<T> {
        let g = secs(1);
        let mut b = Buckets::new(g * samples.len() as u32, g, samples.len());
        b.seed(samples, cursor);
        b
    }

    fn scenario() -> Buckets<f64> {
        seeded(&[1.0, 2.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 4.0, 0.0], 2)
    }

    #[test]
    fn add_goes_to_current_bucket() {
        let mut b = seeded(&[1.0, 1.0], 1);
        b.add(1.0);
        assert_eq!(b.raw()[1], 2.0);
        assert_eq!(b.raw()[0], 1.0);
    }

    #[test]
    fn average_over_recent_buckets() {
        let b = scenario();
        assert_eq!(b.average(Duration::ZERO), 0.0);
        assert_eq!(b.average(secs(1)), 2.0);
        assert_eq!(b.average(secs(2)), 1.5);
        assert_eq!(b.average(secs(4)), 1.75);
        assert_eq!(b.average(secs(10)), 1.2);
        assert_eq!(b.average(secs(20)), 1.2);
    }

    #[test]
    fn total_over_recent_buckets() {
        let b = scenario();
        assert_eq!(b.total(Duration::ZERO), Total::zero());
        assert_eq!(b.total(secs(1)).sum, 2.0);
        assert_eq!(b.total(secs(2)).sum, 3.0);
        assert_eq!(b.total(secs(4)).sum, 7.0);
        assert_eq!(b.total(secs(10)).sum, 12.0);
        assert_eq!(b.total(secs(20)).sum, 12.0);
    }

    #[test]
    fn total_reports_covered_span() {
        let b = scenario();
        assert_eq!(b.total(secs(4)).covered, secs(4));
        assert_eq!(b.total(secs(20)).covered, secs(10));
        assert_eq!(b.total(Duration::from_millis(2500)).covered, secs(2));
        assert_eq!(b.total(Duration::from_millis(999)), Total::zero());
    }

    #[test]
    fn sub_granularity_average_is_zero() {
        let b = scenario();
        assert_eq!(b.average(Duration::from_millis(999)), 0.0);
        assert_eq!(b.average(Duration::from_nanos(1)), 0.0);
    }

    #[test]
    fn range_average_over_offsets() {
        let b = scenario();
        assert_eq!(b.range_average(Duration::ZERO, Duration::ZERO), 0.0);
        assert_eq!(b.range_average(secs(9), secs(10)), 2.0);
        assert_eq!(b.range_average(secs(8), secs(10)), 1.5);
        assert_eq!(b.range_average(secs(4), secs(9)), 1.0);
    }

    #[test]
    fn range_total_after_full_rotation() {
        let b = seeded(&[1i64, 2, 5, 0, 0, 0, 0, 0, 4, 8], 10);
        assert_eq!(b.range_total(secs(1), secs(2)).sum, 2);
        assert_eq!(b.range_total(secs(1), secs(3)).sum, 7);
        assert_eq!(b.range_total(secs(3), secs(8)).sum, 0);
        assert_eq!(b.range_total(Duration::ZERO, secs(2)).sum, 3);
        assert_eq!(b.range_total(secs(9), secs(10)).sum, 8);
        assert_eq!(b.range_total(secs(1), secs(3)).covered, secs(2));
    }

    #[test]
    fn range_suffix_matches_total() {
        let b = scenario();
        let window = secs(10);
        for ms in (0..=10_000).step_by(250) {
            let d = Duration::from_millis(ms);
            assert_eq!(b.range_total(window - d, window), b.total(d), "d = {d:?}");
        }
        assert_eq!(b.range_total(Duration::ZERO, window), b.total(window));
    }

    #[test]
    fn malformed_ranges_select_nothing() {
        let b = scenario();
        assert_eq!(b.range_total(secs(5), secs(5)), Total::zero());
        assert_eq!(b.range_total(secs(7), secs(3)), Total::zero());
        assert_eq!(b.range_total(secs(30), secs(40)), Total::zero());
        assert_eq!(b.range_average(secs(7), secs(3)), 0.0);
    }

    #[test]
    fn range_past_window_end_is_clipped() {
        let b = scenario();
        assert_eq!(b.range_total(secs(9), secs(15)).sum, 2.0);
        assert_eq!(b.range_total(Duration::ZERO, secs(25)), b.total(secs(10)));
    }

    #[test]
    fn advance_clears_only_the_new_current_bucket() {
        let mut b = seeded(&[1i64, 2, 3, 4], 0);
        b.advance();
        assert_eq!(b.cursor(), 1);
        assert_eq!(b.raw(), &[1, 0, 3, 4]);
        b.advance();
        b.advance();
        assert_eq!(b.cursor(), 3);
        assert_eq!(b.raw(), &[1, 0, 0, 0]);
        b.advance();
        assert_eq!(b.raw(), &[0, 0, 0, 0]);
        assert_eq!(b.cursor(), 4);
    }

    #[test]
    fn add_is_invisible_to_queries_skipping_current_bucket() {
        let mut b = scenario();
        let before = b.total(secs(9));
        b.add(100.0);
        assert_eq!(b.total(secs(9)), before);
        assert_eq!(b.total(secs(10)).sum, 112.0);
    }

    #[test]
    fn reset_zeroes_everything_but_keeps_cursor() {
        let mut b = scenario();
        b.reset();
        assert_eq!(b.cursor(), 2);
        assert!(b.raw().iter().all(|v| *v == 0.0));
        assert_eq!(b.total(secs(10)).sum, 0.0);
        assert_eq!(b.average(secs(10)), 0.0);
    }

    #[test]
    fn by_age_lists_newest_first() {
        let b = scenario();
        assert_eq!(
            b.by_age(),
            vec![2.0, 1.0, 0.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0]
        );
    }

    #[test]
    fn integer_overflow_wraps_instead_of_panicking() {
        let mut b: Buckets<u32> = Buckets::new(secs(2), secs(1), 2);
        b.add(u32::MAX);
        b.advance();
        b.add(1);
        assert_eq!(b.total(secs(2)).sum, 0);
        assert_eq!(b.total(secs(1)).sum, u32::MAX);

        let mut b: Buckets<i64> = Buckets::new(secs(2), secs(1), 2);
        b.add(i64::MAX);
        b.add(1);
        b.advance();
        assert_eq!(b.total(secs(1)).sum, i64::MIN);
        assert_eq!(b.range_total(secs(1), secs(2)).sum, i64::MIN);
    }
}
