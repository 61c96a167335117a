//! Cadence Node - membership and readiness of the federation
//!
//! The coordinator (node 0) periodically queries every node's status and
//! folds the replies into a readiness table; any collaborator can read
//! the aggregate answers: is the federation complete, still completing,
//! complete and time-synchronized. An emergency broadcast bypasses all of
//! it.

pub mod manager;
pub mod state;

pub use manager::*;
pub use state::*;
