//! One-shot wake-up ticks driven by the tick source

use std::collections::VecDeque;

use cadence_core::{TimeSpec, TimeTick};

use crate::TickListener;

/// Monotonic FIFO of pending one-shot wake-up ticks.
///
/// Alarms may only stack up in the future: each accepted request must be
/// strictly later than the newest one remembered, so the queue is sorted
/// by construction. The queue is itself a [`TickListener`]; on every pulse
/// it fires all alarms whose tick has been reached, re-publishing a point
/// interval to its own listeners.
pub struct AlarmQueue {
    pending: VecDeque<TimeTick>,
    newest: TimeTick,
    listeners: Vec<Box<dyn TickListener>>,
}

impl AlarmQueue {
    /// Empty queue; `initial` is the newest tick already considered spent,
    /// normally the current tick at creation.
    pub fn new(initial: TimeTick) -> Self {
        AlarmQueue {
            pending: VecDeque::new(),
            newest: initial,
            listeners: Vec::new(),
        }
    }

    /// Register a consumer of the fired alarms.
    pub fn add_listener(&mut self, listener: Box<dyn TickListener>) {
        self.listeners.push(listener);
    }

    /// Schedule a wake-up at `tick`.
    ///
    /// Rejected without effect when `tick` is not past the newest request;
    /// the caller must not assume the alarm was scheduled.
    pub fn request_alarm(&mut self, tick: TimeTick) -> bool {
        if tick <= self.newest {
            tracing::debug!(
                "alarm for tick {} rejected, newest request is {}",
                tick,
                self.newest
            );
            return false;
        }
        self.pending.push_back(tick);
        self.newest = tick;
        true
    }

    /// Schedule a wake-up at the next free tick; always succeeds. Returns
    /// the tick that was scheduled.
    pub fn request_next_alarm(&mut self) -> TimeTick {
        self.newest += 1;
        self.pending.push_back(self.newest);
        self.newest
    }

    /// Withdraw a still-pending alarm. Returns whether it was found; the
    /// newest-request watermark is not rolled back.
    pub fn cancel(&mut self, tick: TimeTick) -> bool {
        match self.pending.iter().position(|&t| t == tick) {
            Some(at) => {
                self.pending.remove(at);
                true
            }
            None => false,
        }
    }

    /// Number of alarms still queued.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl TickListener for AlarmQueue {
    /// Pop and fire, in increasing order, every alarm at or before the
    /// start of the current interval; stop at the first future tick.
    fn on_tick(&mut self, current: &TimeSpec) {
        while let Some(&tick) = self.pending.front() {
            if tick > current.start() {
                break;
            }
            self.pending.pop_front();
            let point = TimeSpec::point(tick);
            for listener in &mut self.listeners {
                listener.on_tick(&point);
            }
        }
    }
}
