//! Inbound wire buffers

use bytes::Bytes;

use cadence_core::TimeSpec;

/// One inbound network buffer plus the interval it arrived in.
///
/// Ownership is shared with the receive layer through the `Bytes` handle:
/// the clone moved into the unpack queue is the claim, dropping it after
/// the buffer is consumed is the release. The backing storage is freed on
/// the last drop, wherever that happens.
#[derive(Clone, Debug)]
pub struct WireBuffer {
    bytes: Bytes,
    arrival: TimeSpec,
    regular: bool,
}

impl WireBuffer {
    /// Buffer from the regular, full-rate transport.
    pub fn new(bytes: Bytes, arrival: TimeSpec) -> Self {
        WireBuffer {
            bytes,
            arrival,
            regular: true,
        }
    }

    /// Buffer from the compatible, startup-rate transport.
    pub fn compatible(bytes: Bytes, arrival: TimeSpec) -> Self {
        WireBuffer {
            bytes,
            arrival,
            regular: false,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn arrival(&self) -> &TimeSpec {
        &self.arrival
    }

    #[inline]
    pub fn is_regular(&self) -> bool {
        self.regular
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
