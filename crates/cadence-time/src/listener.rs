//! Pulse fan-out seam

use cadence_core::TimeSpec;

/// Receives the pulse train from a tick source.
///
/// Callbacks run synchronously inside the tick deadline, in registration
/// order. Implementations must be non-blocking and bounded in cost; a
/// callback that outruns the tick period makes the whole step late.
pub trait TickListener: Send {
    fn on_tick(&mut self, ts: &TimeSpec);
}

impl<F> TickListener for F
where
    F: FnMut(&TimeSpec) + Send,
{
    fn on_tick(&mut self, ts: &TimeSpec) {
        self(ts)
    }
}
