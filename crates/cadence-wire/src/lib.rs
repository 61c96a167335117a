//! Cadence Wire - inbound buffer demultiplexing
//!
//! Network buffers arrive as one blob per transport read; this crate
//! splits them back into per-channel records:
//! - [`WireBuffer`]: a shared-ownership inbound buffer plus arrival stamp
//! - the record format: `[channel key][u16 length][payload]`, repeated
//! - [`Unpacker`]: walks a buffer and hands each payload to the channel
//!   registry, containing corruption to the one buffer it occurs in

pub mod buffer;
pub mod record;
pub mod registry;
pub mod unpacker;

pub use buffer::*;
pub use record::*;
pub use registry::*;
pub use unpacker::*;
