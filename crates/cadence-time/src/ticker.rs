//! Tick source - generates the pulse that drives all time-triggered work
//!
//! The ticker runs a small state machine:
//! `Stopped -> CompatibleTicking -> SyncedTicking`, with `Stopped`
//! re-enterable at any time. Before the node is confirmed against the
//! master clock it pulses at the compatible increment, the coarsest step
//! any node in the federation can sustain; once a master signal
//! establishes agreement it pulses at its own base increment.
//!
//! The wait for the next pulse edge is the single intentionally blocking
//! operation in the whole core; everything downstream of a pulse runs
//! inside the deadline the tick period establishes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use cadence_core::{
    CadenceError, CadenceResult, PeriodicTimeSpec, TimeGranule, TimeSpec, TimeTick,
};

use crate::TickListener;

/// Run state of the tick source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickerState {
    /// No pulses emitted.
    Stopped,
    /// Pulsing at the compatible increment, not yet confirmed against the
    /// master clock.
    CompatibleTicking,
    /// Confirmed against the master clock, pulsing at the base increment.
    SyncedTicking,
}

/// Scheduling discipline for the pulse wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RtMode {
    /// Plain blocking wait, no real-time guarantees.
    #[default]
    BestEffort,
    /// Hard-deadline operation. Elevating the timing thread's OS priority
    /// is the embedder's job; the ticker reports deadline misses at error
    /// severity instead of warning severity.
    RealTime,
}

/// Ticker construction parameters.
#[derive(Clone, Copy, Debug)]
pub struct TickerConfig {
    pub granule: TimeGranule,
    /// Native pulse period in seconds.
    pub base_dt: f64,
    /// Startup pulse period in seconds, the coarsest rate in the
    /// federation.
    pub compatible_dt: f64,
    pub rt_mode: RtMode,
    /// Fraction of a reported master offset applied per correction,
    /// in (0, 1]. Keeps `data_from_master` a nudge, never a jump.
    pub sync_gain: f64,
}

impl TickerConfig {
    pub fn new(granule: TimeGranule, base_dt: f64, compatible_dt: f64) -> Self {
        TickerConfig {
            granule,
            base_dt,
            compatible_dt,
            rt_mode: RtMode::default(),
            sync_gain: 0.1,
        }
    }
}

/// Synchronization-quality counters, readable by external reporting.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncStats {
    /// Pulses emitted since creation.
    pub pulses: u64,
    /// Pulses whose listener fan-out outran the tick period.
    pub late_steps: u64,
    /// Worst observed overrun, in microseconds.
    pub worst_lateness_usecs: i64,
    /// Most recent offset reported by the master, in microseconds.
    pub last_master_offset_usecs: i64,
    /// Hard re-synchronizations accepted from the master.
    pub hard_resyncs: u64,
}

/// Atomics-backed view of the tick source for other priority levels.
///
/// The pulse path stores into this; lower-priority paths poll it. The
/// pending-reset flag is raised whenever the wall anchor moves and is
/// consumed by whoever re-derives wall-clock projections from it.
pub struct TickerShared {
    tick: AtomicU64,
    ticking: AtomicBool,
    synced: AtomicBool,
    pending_reset: AtomicBool,
}

impl TickerShared {
    fn new() -> Self {
        TickerShared {
            tick: AtomicU64::new(0),
            ticking: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            pending_reset: AtomicBool::new(false),
        }
    }

    /// Start tick of the most recent pulse interval.
    pub fn tick(&self) -> TimeTick {
        self.tick.load(Ordering::Acquire)
    }

    pub fn is_ticking(&self) -> bool {
        self.ticking.load(Ordering::Acquire)
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Ask the timing thread to stop; takes effect before its next wait.
    pub fn request_stop(&self) {
        self.ticking.store(false, Ordering::Release);
    }

    /// Consume the pending-reset flag; true when the wall anchor has moved
    /// since the last poll.
    pub fn take_pending_reset(&self) -> bool {
        self.pending_reset.swap(false, Ordering::AcqRel)
    }

    fn raise_pending_reset(&self) {
        self.pending_reset.store(true, Ordering::Release);
    }
}

/// The blocking wait for the next pulse edge.
///
/// This seam keeps the OS wait primitive out of the ticker itself; tests
/// substitute an immediate return.
pub trait PulseWait: Send {
    /// Block until `deadline`, or earlier when interrupted. Returns the
    /// instant the wait ended.
    fn wait_until(&mut self, deadline: Instant) -> Instant;
}

/// Condvar-backed wall-clock wait, interruptible through a
/// [`WaitInterrupt`] so a stop request does not linger for a full period.
pub struct ClockWait {
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl ClockWait {
    pub fn new() -> Self {
        ClockWait {
            gate: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Handle for waking the wait from another thread.
    pub fn interrupter(&self) -> WaitInterrupt {
        WaitInterrupt {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl Default for ClockWait {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseWait for ClockWait {
    fn wait_until(&mut self, deadline: Instant) -> Instant {
        let (lock, cvar) = &*self.gate;
        let mut raised = lock.lock();
        while !*raised {
            if cvar.wait_until(&mut raised, deadline).timed_out() {
                break;
            }
        }
        *raised = false;
        Instant::now()
    }
}

/// Wakes a [`ClockWait`] before its deadline.
pub struct WaitInterrupt {
    gate: Arc<(Mutex<bool>, Condvar)>,
}

impl WaitInterrupt {
    pub fn raise(&self) {
        let (lock, cvar) = &*self.gate;
        *lock.lock() = true;
        cvar.notify_one();
    }
}

/// The per-node tick source.
///
/// Created once at node bootstrap and kept for the process lifetime;
/// collaborators on other priority levels observe it through the
/// [`TickerShared`] handle.
pub struct Ticker {
    granule: TimeGranule,
    base_increment: TimeTick,
    compatible_increment: TimeTick,
    current_spec: PeriodicTimeSpec,
    compatible_spec: PeriodicTimeSpec,
    state: TickerState,
    rt_mode: RtMode,
    sync_gain: f64,
    listeners: Vec<Box<dyn TickListener>>,
    shared: Arc<TickerShared>,
    /// Wall instant corresponding to tick zero; anchored at the first
    /// pulse, nudged by master corrections.
    anchor: Option<Instant>,
    stats: SyncStats,
}

impl Ticker {
    pub fn new(config: TickerConfig) -> CadenceResult<Self> {
        let base_increment = config.granule.ticks_for_span(config.base_dt, true);
        let compatible_increment = config.granule.ticks_for_span(config.compatible_dt, true);
        Ok(Ticker {
            granule: config.granule,
            base_increment,
            compatible_increment,
            current_spec: PeriodicTimeSpec::new(0, base_increment)?,
            compatible_spec: PeriodicTimeSpec::new(0, compatible_increment)?,
            state: TickerState::Stopped,
            rt_mode: config.rt_mode,
            sync_gain: config.sync_gain.clamp(f64::MIN_POSITIVE, 1.0),
            listeners: Vec::new(),
            shared: Arc::new(TickerShared::new()),
            anchor: None,
            stats: SyncStats::default(),
        })
    }

    /// Shared snapshot handle for other priority levels.
    pub fn shared(&self) -> Arc<TickerShared> {
        Arc::clone(&self.shared)
    }

    /// Register a pulse consumer; pulses arrive in registration order.
    pub fn add_listener(&mut self, listener: Box<dyn TickListener>) {
        self.listeners.push(listener);
    }

    pub fn state(&self) -> TickerState {
        self.state
    }

    pub fn rt_mode(&self) -> RtMode {
        self.rt_mode
    }

    /// Begin pulsing at the compatible rate.
    pub fn start_ticking(&mut self) {
        if self.state != TickerState::Stopped {
            return;
        }
        self.state = TickerState::CompatibleTicking;
        self.shared.ticking.store(true, Ordering::Release);
        tracing::info!(
            "ticking started, compatible increment {} ticks",
            self.compatible_increment
        );
    }

    /// Stop pulsing; takes effect before the next wait begins, an
    /// in-flight pulse completes. Synchronization must be re-established
    /// after a restart.
    pub fn stop_ticking(&mut self) {
        self.state = TickerState::Stopped;
        self.shared.ticking.store(false, Ordering::Release);
        self.shared.synced.store(false, Ordering::Release);
        tracing::info!("ticking stopped");
    }

    /// Whether agreement with the master clock has been established.
    pub fn is_synced(&self) -> bool {
        self.state == TickerState::SyncedTicking
    }

    /// Native step, in ticks.
    pub fn base_increment(&self) -> TimeTick {
        self.base_increment
    }

    /// Startup step, the coarsest in the federation, in ticks.
    pub fn compatible_increment(&self) -> TimeTick {
        self.compatible_increment
    }

    pub fn time_granule(&self) -> TimeGranule {
        self.granule
    }

    /// Native step, in seconds.
    pub fn dt(&self) -> f64 {
        self.granule.span_seconds(self.base_increment as i64)
    }

    /// Tick count closest to a span in seconds; at least one tick when
    /// `nonzero` is requested.
    pub fn increment_for(&self, span_seconds: f64, nonzero: bool) -> TimeTick {
        self.granule.ticks_for_span(span_seconds, nonzero)
    }

    /// Current validity window of the active rate.
    pub fn current_spec(&self) -> &TimeSpec {
        match self.state {
            TickerState::SyncedTicking => self.current_spec.spec(),
            _ => self.compatible_spec.spec(),
        }
    }

    pub fn sync_stats(&self) -> SyncStats {
        self.stats
    }

    /// Microseconds of wall time elapsed since `tick` was (or will be)
    /// current; negative when the tick lies in the future.
    ///
    /// The time base only exists once the first pulse has anchored wall
    /// time; querying earlier is a bootstrap-order error.
    pub fn usecs_since_tick(&self, tick: TimeTick) -> CadenceResult<i64> {
        let anchor = self
            .anchor
            .ok_or(CadenceError::NotInitialized("tick source has not pulsed yet"))?;
        let tick_wall = anchor + Duration::from_secs_f64(self.granule.span_seconds(tick as i64));
        let now = Instant::now();
        if now >= tick_wall {
            Ok((now - tick_wall).as_micros() as i64)
        } else {
            Ok(-((tick_wall - now).as_micros() as i64))
        }
    }

    /// Filtered correction from the master's periodic timing data.
    ///
    /// A positive `offset_usecs` means this node's anchor lags the master;
    /// only `sync_gain` of the offset is applied per report, so the local
    /// notion of "now" drifts toward the master's without a hard jump.
    /// The first master signal also confirms synchronization.
    pub fn data_from_master(&mut self, tick: TimeTick, offset_usecs: i64) {
        self.stats.last_master_offset_usecs = offset_usecs;
        if let Some(anchor) = self.anchor {
            let nudge = (offset_usecs as f64 * self.sync_gain) as i64;
            if nudge != 0 {
                self.anchor = Some(shift_instant(anchor, -nudge));
                self.shared.raise_pending_reset();
            }
        }
        if self.state == TickerState::CompatibleTicking {
            self.enter_synced(tick);
        }
    }

    /// Hard re-synchronization onto the master's tick, used when drift has
    /// exceeded what filtering can absorb.
    ///
    /// Ticks never run backwards; a master tick behind the current window
    /// is rejected and logged.
    pub fn tick_from_master(&mut self, tick: TimeTick) {
        if !self.current_spec.force_advance(tick) {
            return;
        }
        self.compatible_spec.force_advance(tick);
        self.stats.hard_resyncs += 1;
        let aligned = self.current_spec.start();
        self.anchor =
            Some(shift_instant_back(Instant::now(), self.granule.span_seconds(aligned as i64)));
        self.shared.raise_pending_reset();
        self.shared.tick.store(aligned, Ordering::Release);
        if self.state == TickerState::CompatibleTicking {
            self.enter_synced(aligned);
        }
        tracing::info!("hard resync to master tick {}", tick);
    }

    fn enter_synced(&mut self, tick: TimeTick) {
        self.current_spec.force_advance(tick);
        self.compatible_spec.force_advance(tick);
        self.state = TickerState::SyncedTicking;
        self.shared.synced.store(true, Ordering::Release);
        tracing::info!(
            "synchronized with master at tick {}, base increment {} ticks",
            tick,
            self.base_increment
        );
    }

    /// One pulse: advance the active window and fan listeners out.
    ///
    /// A step whose fan-out outruns the tick period is late and is
    /// reported, never silently absorbed.
    pub fn pulse(&mut self) {
        if self.state == TickerState::Stopped {
            return;
        }
        let started = Instant::now();

        let ts = match self.state {
            TickerState::CompatibleTicking => {
                let next = self.compatible_spec.end();
                self.compatible_spec.force_advance(next);
                // keep the native window trailing the compatible one, so
                // entering synced mode needs no catch-up
                self.current_spec.force_advance(self.compatible_spec.start());
                *self.compatible_spec.spec()
            }
            TickerState::SyncedTicking => {
                let next = self.current_spec.end();
                self.current_spec.force_advance(next);
                *self.current_spec.spec()
            }
            TickerState::Stopped => unreachable!(),
        };

        if self.anchor.is_none() {
            self.anchor = Some(shift_instant_back(
                started,
                self.granule.span_seconds(ts.start() as i64),
            ));
        }
        self.shared.tick.store(ts.start(), Ordering::Release);

        for listener in &mut self.listeners {
            listener.on_tick(&ts);
        }

        self.stats.pulses += 1;
        let budget = self.granule.span_seconds(self.active_increment() as i64);
        let busy = started.elapsed().as_secs_f64();
        if busy > budget {
            let lateness = ((busy - budget) * 1e6) as i64;
            self.stats.late_steps += 1;
            self.stats.worst_lateness_usecs = self.stats.worst_lateness_usecs.max(lateness);
            match self.rt_mode {
                RtMode::RealTime => tracing::error!(
                    "tick {} ran {}us past its {}us period",
                    ts.start(),
                    lateness,
                    (budget * 1e6) as i64
                ),
                RtMode::BestEffort => tracing::warn!(
                    "tick {} ran {}us past its {}us period",
                    ts.start(),
                    lateness,
                    (budget * 1e6) as i64
                ),
            }
        }
    }

    /// Drive wait -> pulse until a stop is requested. The wait is the only
    /// blocking call in the core.
    pub fn run<W: PulseWait>(&mut self, wait: &mut W) {
        while self.shared.is_ticking() {
            let deadline = self.next_deadline();
            wait.wait_until(deadline);
            if !self.shared.is_ticking() {
                break;
            }
            self.pulse();
        }
        self.stop_ticking();
    }

    fn active_increment(&self) -> TimeTick {
        match self.state {
            TickerState::SyncedTicking => self.base_increment,
            _ => self.compatible_increment,
        }
    }

    fn next_deadline(&self) -> Instant {
        let end = match self.state {
            TickerState::SyncedTicking => self.current_spec.end(),
            _ => self.compatible_spec.end(),
        };
        match self.anchor {
            Some(anchor) => {
                anchor + Duration::from_secs_f64(self.granule.span_seconds(end as i64))
            }
            None => {
                Instant::now()
                    + Duration::from_secs_f64(
                        self.granule.span_seconds(self.active_increment() as i64),
                    )
            }
        }
    }
}

fn shift_instant(at: Instant, usecs: i64) -> Instant {
    if usecs >= 0 {
        at + Duration::from_micros(usecs as u64)
    } else {
        at - Duration::from_micros(usecs.unsigned_abs())
    }
}

fn shift_instant_back(at: Instant, seconds: f64) -> Instant {
    at.checked_sub(Duration::from_secs_f64(seconds)).unwrap_or(at)
}
