//! Error types for the cadence core

use thiserror::Error;

use crate::{GlobalId, TimeTick};

/// Core cadence errors
#[derive(Error, Debug)]
pub enum CadenceError {
    // Time errors
    #[error("Reversed time span: start {start} after end {end}")]
    SpanReversed { start: TimeTick, end: TimeTick },

    #[error("Span mismatch: {left} ticks vs {right} ticks")]
    SpanMismatch { left: TimeTick, right: TimeTick },

    #[error("Invalid time granule: {0} seconds per tick")]
    InvalidGranule(f64),

    #[error("Periodic spec requires a nonzero period")]
    InvalidPeriod,

    #[error("Time base not initialized: {0}")]
    NotInitialized(&'static str),

    // Wire errors
    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Record payload too large: {0} bytes")]
    RecordTooLarge(usize),

    #[error(
        "Protocol corruption on channel {key}: declared {declared} bytes, consumed {consumed}"
    )]
    ProtocolCorruption {
        key: GlobalId,
        declared: usize,
        consumed: usize,
    },

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Result type for cadence operations
pub type CadenceResult<T> = Result<T, CadenceError>;
