//! The seam to the channel layer
//!
//! The typed-channel read/write machinery lives elsewhere; the unpacker
//! only needs to look a key up and hand a payload over.

use cadence_core::{GlobalId, TimeSpec};

/// Decoder side of one locally open channel.
pub trait ChannelSink {
    /// Decode one record payload delivered in the `arrival` interval;
    /// returns the number of bytes consumed, which must equal the
    /// payload length for a well-formed record.
    fn deliver(&mut self, payload: &[u8], arrival: &TimeSpec) -> usize;
}

/// Lookup of channel end-points by federation-wide key.
pub trait ChannelRegistry {
    /// `None` is a valid outcome: the record's destination simply has no
    /// end on this node, and the record is skipped.
    fn resolve(&mut self, key: GlobalId) -> Option<&mut dyn ChannelSink>;
}
