//! The time granule - mapping between ticks and wall seconds
//!
//! The granule is fixed once at node bootstrap and never changes for the
//! life of the process. It is `Copy` and passed explicitly to everything
//! that converts between the two domains; there is no global accessor.

use std::fmt;

use crate::{CadenceError, CadenceResult, TimeTick};

/// Seconds per tick, fixed at bootstrap.
#[derive(Clone, Copy, PartialEq)]
pub struct TimeGranule(f64);

impl TimeGranule {
    /// Create a granule; rejects non-positive or non-finite values.
    pub fn new(seconds_per_tick: f64) -> CadenceResult<Self> {
        if !seconds_per_tick.is_finite() || seconds_per_tick <= 0.0 {
            return Err(CadenceError::InvalidGranule(seconds_per_tick));
        }
        Ok(TimeGranule(seconds_per_tick))
    }

    #[inline]
    pub fn seconds_per_tick(self) -> f64 {
        self.0
    }

    /// Tick count closest to a span in seconds.
    ///
    /// With `nonzero` set, a span that would round to zero ticks becomes one
    /// tick: a caller asking for some delay never gets none.
    pub fn ticks_for_span(self, span_seconds: f64, nonzero: bool) -> TimeTick {
        let ticks = self.nearest_tick(span_seconds);
        if nonzero && ticks == 0 {
            1
        } else {
            ticks
        }
    }

    /// Round a wall-seconds instant to the nearest tick.
    ///
    /// Negative instants clamp to tick zero; simulated time starts there.
    pub fn nearest_tick(self, seconds: f64) -> TimeTick {
        let rounded = (seconds / self.0).round();
        if rounded <= 0.0 {
            0
        } else {
            rounded as TimeTick
        }
    }

    /// A signed tick count expressed in seconds.
    #[inline]
    pub fn span_seconds(self, dticks: i64) -> f64 {
        dticks as f64 * self.0
    }
}

impl fmt::Debug for TimeGranule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Granule({}s)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granule_rejects_bad_values() {
        assert!(TimeGranule::new(0.0).is_err());
        assert!(TimeGranule::new(-0.001).is_err());
        assert!(TimeGranule::new(f64::NAN).is_err());
        assert!(TimeGranule::new(f64::INFINITY).is_err());
        assert!(TimeGranule::new(0.0001).is_ok());
    }

    #[test]
    fn test_ticks_for_span_rounds_to_nearest() {
        let g = TimeGranule::new(0.01).unwrap();
        assert_eq!(g.ticks_for_span(0.10, false), 10);
        assert_eq!(g.ticks_for_span(0.104, false), 10);
        assert_eq!(g.ticks_for_span(0.106, false), 11);
    }

    #[test]
    fn test_ticks_for_span_nonzero_floor() {
        let g = TimeGranule::new(0.01).unwrap();
        // 1 ms rounds to 0 ticks, but the caller wanted *some* delay
        assert_eq!(g.ticks_for_span(0.001, false), 0);
        assert_eq!(g.ticks_for_span(0.001, true), 1);
        assert_eq!(g.ticks_for_span(0.0, true), 1);
    }

    #[test]
    fn test_span_seconds_is_signed() {
        let g = TimeGranule::new(0.01).unwrap();
        assert_eq!(g.span_seconds(100), 1.0);
        assert_eq!(g.span_seconds(-100), -1.0);
    }
}
