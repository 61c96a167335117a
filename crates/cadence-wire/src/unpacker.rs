//! Wire buffer demultiplexer
//!
//! Pure transform from "byte buffer plus arrival interval" to decoded
//! writes into already-open channels. Record order within one buffer is
//! preserved; nothing is guaranteed between buffers from different
//! transports.

use std::collections::VecDeque;

use bytes::Buf;

use cadence_core::{CadenceError, CadenceResult, GlobalId};

use crate::{ChannelRegistry, WireBuffer, RECORD_HEADER_SIZE};

/// Demultiplexing counters, for external monitoring.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnpackStats {
    /// Buffers fully processed.
    pub buffers: u64,
    /// Records delivered to a local channel.
    pub records: u64,
    /// Records skipped for lack of a local channel end.
    pub skipped: u64,
    /// Buffers dropped part-way through on a protocol fault.
    pub dropped: u64,
}

/// Splits inbound wire buffers into per-channel records.
///
/// Owns no state besides the pending-buffer queue and its counters; a
/// malformed record costs the remainder of its own buffer, nothing more.
pub struct Unpacker {
    queue: VecDeque<WireBuffer>,
    stats: UnpackStats,
}

impl Unpacker {
    pub fn new() -> Self {
        Unpacker {
            queue: VecDeque::new(),
            stats: UnpackStats::default(),
        }
    }

    /// Take over one claimed buffer for demultiplexing; the claim is
    /// released when processing of the buffer completes.
    pub fn accept(&mut self, buffer: WireBuffer) {
        self.queue.push_back(buffer);
    }

    /// Buffers waiting to be processed.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> UnpackStats {
        self.stats
    }

    /// Drain the queue in arrival order.
    ///
    /// A corrupt buffer is logged and dropped from the point of the fault
    /// on; its successors are processed normally.
    pub fn process(&mut self, registry: &mut dyn ChannelRegistry) {
        while let Some(buffer) = self.queue.pop_front() {
            match self.unpack_one(&buffer, registry) {
                Ok(()) => self.stats.buffers += 1,
                Err(e) => {
                    self.stats.dropped += 1;
                    tracing::warn!("dropping remainder of wire buffer: {}", e);
                }
            }
            // buffer handle dropped here: claim released
        }
    }

    fn unpack_one(
        &mut self,
        buffer: &WireBuffer,
        registry: &mut dyn ChannelRegistry,
    ) -> CadenceResult<()> {
        let mut cursor = buffer.as_slice();
        while !cursor.is_empty() {
            if cursor.remaining() < RECORD_HEADER_SIZE {
                return Err(CadenceError::BufferTooShort {
                    expected: RECORD_HEADER_SIZE,
                    actual: cursor.remaining(),
                });
            }
            let mut key_bytes = [0u8; GlobalId::WIRE_SIZE];
            cursor.copy_to_slice(&mut key_bytes);
            let key = GlobalId::from_bytes(key_bytes);
            let declared = cursor.get_u16() as usize;
            if cursor.remaining() < declared {
                return Err(CadenceError::BufferTooShort {
                    expected: declared,
                    actual: cursor.remaining(),
                });
            }
            match registry.resolve(key) {
                None => {
                    tracing::debug!("no local end for channel {}, skipping {} bytes", key, declared);
                    self.stats.skipped += 1;
                }
                Some(sink) => {
                    let consumed = sink.deliver(&cursor[..declared], buffer.arrival());
                    if consumed != declared {
                        return Err(CadenceError::ProtocolCorruption {
                            key,
                            declared,
                            consumed,
                        });
                    }
                    self.stats.records += 1;
                }
            }
            cursor.advance(declared);
        }
        Ok(())
    }
}

impl Default for Unpacker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use bytes::BytesMut;

    use cadence_core::{NodeId, ObjectId, TimeSpec};

    use crate::{write_record, ChannelSink};

    /// Records everything it is handed; can be told to under- or
    /// over-consume to emulate a broken decoder.
    #[derive(Default)]
    struct RecordingSink {
        received: Vec<(Vec<u8>, TimeSpec)>,
        consume_bias: i64,
    }

    impl ChannelSink for RecordingSink {
        fn deliver(&mut self, payload: &[u8], arrival: &TimeSpec) -> usize {
            self.received.push((payload.to_vec(), *arrival));
            (payload.len() as i64 + self.consume_bias) as usize
        }
    }

    #[derive(Default)]
    struct TestRegistry {
        sinks: HashMap<GlobalId, RecordingSink>,
    }

    impl TestRegistry {
        fn open(&mut self, key: GlobalId) {
            self.sinks.insert(key, RecordingSink::default());
        }

        fn received(&self, key: GlobalId) -> Vec<Vec<u8>> {
            self.sinks[&key]
                .received
                .iter()
                .map(|(bytes, _)| bytes.clone())
                .collect()
        }
    }

    impl ChannelRegistry for TestRegistry {
        fn resolve(&mut self, key: GlobalId) -> Option<&mut dyn ChannelSink> {
            self.sinks.get_mut(&key).map(|s| s as &mut dyn ChannelSink)
        }
    }

    fn key(location: u16, object: u16) -> GlobalId {
        GlobalId::new(NodeId::new(location), ObjectId::new(object))
    }

    fn buffer_of(records: &[(GlobalId, &[u8])], arrival: TimeSpec) -> WireBuffer {
        let mut buf = BytesMut::new();
        for (k, payload) in records {
            write_record(&mut buf, *k, payload).unwrap();
        }
        WireBuffer::new(buf.freeze(), arrival)
    }

    #[test]
    fn test_roundtrip_preserves_order_and_payloads() {
        let key_a = key(0, 1);
        let key_b = key(1, 2);
        let mut registry = TestRegistry::default();
        registry.open(key_a);
        registry.open(key_b);

        let mut unpacker = Unpacker::new();
        unpacker.accept(buffer_of(
            &[(key_a, b"hi"), (key_b, b"bye")],
            TimeSpec::point(7),
        ));
        unpacker.process(&mut registry);

        assert_eq!(registry.received(key_a), vec![b"hi".to_vec()]);
        assert_eq!(registry.received(key_b), vec![b"bye".to_vec()]);
        assert_eq!(registry.sinks[&key_a].received[0].1, TimeSpec::point(7));
        let stats = unpacker.stats();
        assert_eq!(stats.buffers, 1);
        assert_eq!(stats.records, 2);
    }

    #[test]
    fn test_in_buffer_order_within_one_channel() {
        let k = key(2, 2);
        let mut registry = TestRegistry::default();
        registry.open(k);

        let mut unpacker = Unpacker::new();
        unpacker.accept(buffer_of(
            &[(k, b"first"), (k, b"second"), (k, b"third")],
            TimeSpec::point(0),
        ));
        unpacker.process(&mut registry);

        assert_eq!(
            registry.received(k),
            vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
        );
    }

    #[test]
    fn test_unresolved_key_skipped_without_damage() {
        let known = key(0, 1);
        let unknown = key(9, 9);
        let mut registry = TestRegistry::default();
        registry.open(known);

        let mut unpacker = Unpacker::new();
        unpacker.accept(buffer_of(
            &[(known, b"hi"), (unknown, b"lost"), (known, b"bye")],
            TimeSpec::point(0),
        ));
        unpacker.process(&mut registry);

        assert_eq!(
            registry.received(known),
            vec![b"hi".to_vec(), b"bye".to_vec()]
        );
        assert_eq!(unpacker.stats().skipped, 1);
    }

    #[test]
    fn test_short_consumption_is_protocol_corruption() {
        let bad = key(0, 1);
        let good = key(0, 2);
        let mut registry = TestRegistry::default();
        registry.open(bad);
        registry.open(good);
        registry.sinks.get_mut(&bad).unwrap().consume_bias = -1;

        let mut unpacker = Unpacker::new();
        // the record after the fault is lost with its buffer
        unpacker.accept(buffer_of(
            &[(bad, b"oops"), (good, b"never")],
            TimeSpec::point(0),
        ));
        // a following buffer is unaffected
        unpacker.accept(buffer_of(&[(good, b"fine")], TimeSpec::point(1)));
        unpacker.process(&mut registry);

        assert_eq!(registry.received(good), vec![b"fine".to_vec()]);
        let stats = unpacker.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.buffers, 1);
    }

    #[test]
    fn test_over_consumption_is_protocol_corruption() {
        let bad = key(3, 3);
        let mut registry = TestRegistry::default();
        registry.open(bad);
        registry.sinks.get_mut(&bad).unwrap().consume_bias = 2;

        let mut unpacker = Unpacker::new();
        unpacker.accept(buffer_of(&[(bad, b"data")], TimeSpec::point(0)));
        unpacker.process(&mut registry);
        assert_eq!(unpacker.stats().dropped, 1);
    }

    #[test]
    fn test_truncated_header_is_contained() {
        let mut registry = TestRegistry::default();
        let mut unpacker = Unpacker::new();
        unpacker.accept(WireBuffer::new(
            bytes::Bytes::from_static(&[0, 1, 0]),
            TimeSpec::point(0),
        ));
        unpacker.process(&mut registry);
        assert_eq!(unpacker.stats().dropped, 1);
        assert_eq!(unpacker.queued(), 0);
    }

    #[test]
    fn test_truncated_payload_is_contained() {
        let k = key(0, 1);
        let mut registry = TestRegistry::default();
        registry.open(k);

        let mut full = BytesMut::new();
        write_record(&mut full, k, b"hello").unwrap();
        let truncated = full.freeze().slice(..RECORD_HEADER_SIZE + 2);

        let mut unpacker = Unpacker::new();
        unpacker.accept(WireBuffer::new(truncated, TimeSpec::point(0)));
        unpacker.process(&mut registry);

        assert!(registry.received(k).is_empty());
        assert_eq!(unpacker.stats().dropped, 1);
    }

    #[test]
    fn test_empty_buffer_is_exhausted_cleanly() {
        let mut registry = TestRegistry::default();
        let mut unpacker = Unpacker::new();
        unpacker.accept(WireBuffer::new(bytes::Bytes::new(), TimeSpec::point(0)));
        unpacker.process(&mut registry);
        assert_eq!(unpacker.stats().buffers, 1);
        assert_eq!(unpacker.stats().dropped, 0);
    }
}
