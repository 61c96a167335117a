//! Cadence Core - Fundamental types for the timing and coordination core
//!
//! This crate defines the types shared by every part of the middleware:
//! - Identifiers (NodeId, ObjectId, GlobalId)
//! - The time granule and tick value types (TimeSpec, PeriodicTimeSpec)
//! - The common error enum

pub mod error;
pub mod granule;
pub mod id;
pub mod time;

pub use error::*;
pub use granule::*;
pub use id::*;
pub use time::*;
