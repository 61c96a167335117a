//! Tick value types
//!
//! Simulated time advances in discrete granules. A [`TimeSpec`] is a
//! validity interval over that lattice, a [`PeriodicTimeSpec`] is a
//! validity window that steps forward one fixed period at a time. Both are
//! plain values: all comparisons and arithmetic are pure, nothing here
//! touches shared state.

use std::fmt;
use std::ops::{Add, Sub};

use crate::{CadenceError, CadenceResult, TimeGranule};

/// Discrete simulated-time counter, in granules since node start.
///
/// Monotonically non-decreasing per node.
pub type TimeTick = u64;

/// Validity interval in ticks, half-open `[start, end)` or a point when
/// `start == end`.
///
/// INVARIANT: `end >= start`, enforced by every constructor and mutator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSpec {
    start: TimeTick,
    end: TimeTick,
}

impl TimeSpec {
    /// Interval from a tick pair; rejects reversed pairs.
    pub fn new(start: TimeTick, end: TimeTick) -> CadenceResult<Self> {
        if end < start {
            return Err(CadenceError::SpanReversed { start, end });
        }
        Ok(TimeSpec { start, end })
    }

    /// Point interval at a single tick.
    #[inline]
    pub fn point(tick: TimeTick) -> Self {
        TimeSpec {
            start: tick,
            end: tick,
        }
    }

    /// Interval from wall-seconds endpoints, each rounded to the nearest
    /// granule.
    ///
    /// When a nonzero real span collapses onto a single tick through
    /// rounding, the end is pushed out one granule: the caller asked for
    /// some duration and keeps one.
    pub fn from_seconds(
        start_seconds: f64,
        end_seconds: f64,
        granule: TimeGranule,
    ) -> CadenceResult<Self> {
        let start = granule.nearest_tick(start_seconds);
        let mut end = granule.nearest_tick(end_seconds);
        if end_seconds < start_seconds {
            return Err(CadenceError::SpanReversed { start, end });
        }
        if end == start && end_seconds > start_seconds {
            end = start + 1;
        }
        Ok(TimeSpec { start, end })
    }

    #[inline]
    pub fn start(self) -> TimeTick {
        self.start
    }

    #[inline]
    pub fn end(self) -> TimeTick {
        self.end
    }

    /// Width of the interval in ticks.
    #[inline]
    pub fn validity_span(self) -> TimeTick {
        self.end - self.start
    }

    /// Replace this interval by `other` iff it differs; reports whether
    /// anything changed.
    pub fn advance(&mut self, other: &TimeSpec) -> bool {
        if self == other {
            false
        } else {
            *self = *other;
            true
        }
    }

    /// Unconditional jump to the point interval at `tick`.
    pub fn force_advance(&mut self, tick: TimeTick) {
        *self = TimeSpec::point(tick);
    }

    /// Signed tick distance from `other` to `self`.
    ///
    /// Only defined between intervals of equal span; anything else is a
    /// usage error.
    pub fn offset_from(self, other: TimeSpec) -> CadenceResult<i64> {
        if self.validity_span() != other.validity_span() {
            return Err(CadenceError::SpanMismatch {
                left: self.validity_span(),
                right: other.validity_span(),
            });
        }
        Ok(self.start as i64 - other.start as i64)
    }

    /// Interval width in seconds.
    #[inline]
    pub fn dt_seconds(self, granule: TimeGranule) -> f64 {
        granule.span_seconds(self.validity_span() as i64)
    }
}

impl Add<TimeTick> for TimeSpec {
    type Output = TimeSpec;

    /// Shift both ends forward by a tick delta.
    #[inline]
    fn add(self, rhs: TimeTick) -> TimeSpec {
        TimeSpec {
            start: self.start + rhs,
            end: self.end + rhs,
        }
    }
}

impl Sub<TimeTick> for TimeSpec {
    type Output = TimeSpec;

    /// Shift both ends back by a tick delta, saturating at tick zero.
    ///
    /// Both ends move by the same clamped amount, so the span and the
    /// `end >= start` invariant survive a shift past the origin.
    #[inline]
    fn sub(self, rhs: TimeTick) -> TimeSpec {
        let shift = rhs.min(self.start);
        TimeSpec {
            start: self.start - shift,
            end: self.end - shift,
        }
    }
}

impl fmt::Debug for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Periodic validity window: a [`TimeSpec`] of fixed width stepping
/// forward one period at a time.
///
/// INVARIANT: `period > 0`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimeSpec {
    spec: TimeSpec,
    period: TimeTick,
}

impl PeriodicTimeSpec {
    /// Window `[start, start + period)`.
    pub fn new(start: TimeTick, period: TimeTick) -> CadenceResult<Self> {
        if period == 0 {
            return Err(CadenceError::InvalidPeriod);
        }
        Ok(PeriodicTimeSpec {
            spec: TimeSpec {
                start,
                end: start + period,
            },
            period,
        })
    }

    #[inline]
    pub fn spec(&self) -> &TimeSpec {
        &self.spec
    }

    #[inline]
    pub fn start(&self) -> TimeTick {
        self.spec.start
    }

    #[inline]
    pub fn end(&self) -> TimeTick {
        self.spec.end
    }

    #[inline]
    pub fn period(&self) -> TimeTick {
        self.period
    }

    /// Advance as soon as `other` has passed the current window end.
    ///
    /// Tolerant policy: the window follows its trigger with up to one
    /// period of lag. Catches up over multiple periods when far behind.
    pub fn greedy_advance(&mut self, other: &TimeSpec) -> bool {
        let mut moved = false;
        while other.end() > self.spec.end {
            self.spec = self.spec + self.period;
            moved = true;
        }
        moved
    }

    /// Advance only once `other` has passed the window plus one further
    /// full period.
    ///
    /// Strict policy: the consumer is guaranteed a complete period of data
    /// behind the window before it moves. Distinct from
    /// [`greedy_advance`](Self::greedy_advance) on purpose.
    pub fn advance(&mut self, other: &TimeSpec) -> bool {
        let mut moved = false;
        while other.end() >= self.spec.end + self.period {
            self.spec = self.spec + self.period;
            moved = true;
        }
        moved
    }

    /// Snap the window onto the period-aligned slot covering `tick`.
    ///
    /// Targets before the current window start are rejected without
    /// mutation; time never runs backwards here.
    pub fn force_advance(&mut self, tick: TimeTick) -> bool {
        if tick < self.spec.start {
            tracing::warn!(
                "rejected window jump to tick {} before current start {}",
                tick,
                self.spec.start
            );
            return false;
        }
        let steps = (tick - self.spec.start) / self.period;
        self.spec = self.spec + steps * self.period;
        true
    }
}

impl fmt::Debug for PeriodicTimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}", self.spec, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granule() -> TimeGranule {
        TimeGranule::new(0.01).unwrap()
    }

    #[test]
    fn test_timespec_span() {
        let ts = TimeSpec::new(10, 25).unwrap();
        assert_eq!(ts.validity_span(), 15);
        assert_eq!(ts.start(), 10);
        assert_eq!(ts.end(), 25);
    }

    #[test]
    fn test_timespec_rejects_reversed() {
        assert!(matches!(
            TimeSpec::new(25, 10),
            Err(CadenceError::SpanReversed { start: 25, end: 10 })
        ));
    }

    #[test]
    fn test_point_interval() {
        let ts = TimeSpec::point(42);
        assert_eq!(ts.validity_span(), 0);
        assert_eq!(ts.start(), ts.end());
    }

    #[test]
    fn test_from_seconds_rounds_endpoints() {
        let ts = TimeSpec::from_seconds(0.10, 0.30, granule()).unwrap();
        assert_eq!(ts.start(), 10);
        assert_eq!(ts.end(), 30);
    }

    #[test]
    fn test_from_seconds_preserves_nonzero_span() {
        // both endpoints round to tick 10
        let ts = TimeSpec::from_seconds(0.099, 0.101, granule()).unwrap();
        assert_eq!(ts.start(), 10);
        assert_eq!(ts.end(), 11);
    }

    #[test]
    fn test_from_seconds_zero_span_stays_point() {
        let ts = TimeSpec::from_seconds(0.10, 0.10, granule()).unwrap();
        assert_eq!(ts.validity_span(), 0);
    }

    #[test]
    fn test_from_seconds_rejects_reversed() {
        assert!(TimeSpec::from_seconds(0.3, 0.1, granule()).is_err());
    }

    #[test]
    fn test_advance_iff_different() {
        let mut ts = TimeSpec::new(0, 10).unwrap();
        let same = TimeSpec::new(0, 10).unwrap();
        let next = TimeSpec::new(10, 20).unwrap();
        assert!(!ts.advance(&same));
        assert!(ts.advance(&next));
        assert_eq!(ts, next);
    }

    #[test]
    fn test_force_advance_makes_point() {
        let mut ts = TimeSpec::new(0, 10).unwrap();
        ts.force_advance(100);
        assert_eq!(ts, TimeSpec::point(100));
    }

    #[test]
    fn test_shift_both_ends() {
        let ts = TimeSpec::new(10, 20).unwrap();
        assert_eq!((ts + 5).start(), 15);
        assert_eq!((ts + 5).end(), 25);
        assert_eq!((ts - 5).start(), 5);
        assert_eq!((ts - 5).end(), 15);
    }

    #[test]
    fn test_shift_back_saturates_at_zero() {
        let ts = TimeSpec::new(5, 20).unwrap();
        let shifted = ts - 10;
        assert_eq!(shifted, TimeSpec::new(0, 15).unwrap());
        assert_eq!(shifted.validity_span(), ts.validity_span());
        // shifting from the origin is a no-op
        assert_eq!(shifted - 100, shifted);
    }

    #[test]
    fn test_offset_from_equal_spans() {
        let a = TimeSpec::new(30, 40).unwrap();
        let b = TimeSpec::new(10, 20).unwrap();
        assert_eq!(a.offset_from(b).unwrap(), 20);
        assert_eq!(b.offset_from(a).unwrap(), -20);
    }

    #[test]
    fn test_offset_from_rejects_span_mismatch() {
        let a = TimeSpec::new(30, 40).unwrap();
        let b = TimeSpec::new(10, 15).unwrap();
        assert!(matches!(
            a.offset_from(b),
            Err(CadenceError::SpanMismatch { left: 10, right: 5 })
        ));
    }

    #[test]
    fn test_dt_seconds() {
        let ts = TimeSpec::new(0, 150).unwrap();
        assert!((ts.dt_seconds(granule()) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_rejects_zero_period() {
        assert!(matches!(
            PeriodicTimeSpec::new(0, 0),
            Err(CadenceError::InvalidPeriod)
        ));
    }

    #[test]
    fn test_greedy_advances_on_passed_end() {
        let mut w = PeriodicTimeSpec::new(0, 10).unwrap();
        let trigger = TimeSpec::new(5, 15).unwrap();
        assert!(w.greedy_advance(&trigger));
        assert_eq!(w.start(), 10);
        assert_eq!(w.end(), 20);
    }

    #[test]
    fn test_strict_requires_full_extra_period() {
        let mut w = PeriodicTimeSpec::new(0, 10).unwrap();
        let trigger = TimeSpec::new(5, 15).unwrap();
        assert!(!w.advance(&trigger));
        assert_eq!(w.start(), 0);

        let later = TimeSpec::new(10, 20).unwrap();
        assert!(w.advance(&later));
        assert_eq!(w.start(), 10);
    }

    #[test]
    fn test_greedy_catches_up_multiple_periods() {
        let mut w = PeriodicTimeSpec::new(0, 10).unwrap();
        let far = TimeSpec::point(35);
        assert!(w.greedy_advance(&far));
        assert_eq!(w.start(), 30);
        assert_eq!(w.end(), 40);
    }

    #[test]
    fn test_periodic_force_advance_snaps_to_slot() {
        let mut w = PeriodicTimeSpec::new(5, 10).unwrap();
        assert!(w.force_advance(32));
        assert_eq!(w.start(), 25);
        assert_eq!(w.end(), 35);
    }

    #[test]
    fn test_periodic_force_advance_exact_boundary() {
        let mut w = PeriodicTimeSpec::new(0, 10).unwrap();
        assert!(w.force_advance(30));
        assert_eq!(w.start(), 30);
    }

    #[test]
    fn test_periodic_force_advance_rejects_past() {
        let mut w = PeriodicTimeSpec::new(50, 10).unwrap();
        assert!(!w.force_advance(49));
        assert_eq!(w.start(), 50);
        assert_eq!(w.end(), 60);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn timespec_span_matches_endpoints(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let ts = TimeSpec::new(lo, hi).unwrap();
            prop_assert_eq!(ts.validity_span(), hi - lo);
            if a != b {
                prop_assert!(TimeSpec::new(hi, lo).is_err());
            }
        }

        #[test]
        fn shift_roundtrips(start in 0u64..1_000_000, span in 0u64..10_000, delta in 0u64..10_000) {
            let ts = TimeSpec::new(start, start + span).unwrap();
            prop_assert_eq!((ts + delta) - delta, ts);
            prop_assert_eq!((ts + delta).validity_span(), ts.validity_span());
        }

        #[test]
        fn shift_back_never_reverses(start in 0u64..10_000, span in 0u64..1_000, delta in 0u64..100_000) {
            let ts = TimeSpec::new(start, start + span).unwrap();
            let shifted = ts - delta;
            prop_assert!(shifted.end() >= shifted.start());
            prop_assert_eq!(shifted.validity_span(), ts.validity_span());
            prop_assert!(shifted.start() <= ts.start());
        }

        #[test]
        fn offset_is_antisymmetric(a in 0u64..1_000_000, b in 0u64..1_000_000, span in 0u64..1_000) {
            let x = TimeSpec::new(a, a + span).unwrap();
            let y = TimeSpec::new(b, b + span).unwrap();
            prop_assert_eq!(x.offset_from(y).unwrap(), -y.offset_from(x).unwrap());
        }

        #[test]
        fn periodic_advance_never_moves_backwards(
            start in 0u64..1_000,
            period in 1u64..100,
            trigger in 0u64..10_000,
        ) {
            let mut greedy = PeriodicTimeSpec::new(start, period).unwrap();
            let mut strict = PeriodicTimeSpec::new(start, period).unwrap();
            let ts = TimeSpec::point(trigger);
            greedy.greedy_advance(&ts);
            strict.advance(&ts);
            prop_assert!(greedy.start() >= start);
            prop_assert!(strict.start() >= start);
            // strict never overtakes greedy
            prop_assert!(strict.start() <= greedy.start());
            // alignment to the period lattice is preserved
            prop_assert_eq!((greedy.start() - start) % period, 0);
            prop_assert_eq!((strict.start() - start) % period, 0);
        }
    }
}
