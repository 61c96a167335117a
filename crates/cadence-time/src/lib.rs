//! Cadence Time - the per-node real-time pulse
//!
//! This crate implements the timing core:
//! - [`Ticker`]: the tick source, with compatible and synced rates and
//!   master-clock synchronization
//! - [`AlarmQueue`]: one-shot wake-up ticks driven by the tick source
//! - [`TickListener`]: the fan-out seam every time-triggered consumer
//!   registers through

pub mod alarm;
pub mod listener;
pub mod ticker;

pub use alarm::*;
pub use listener::*;
pub use ticker::*;
