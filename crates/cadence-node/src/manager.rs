//! Membership state machine
//!
//! Node 0 coordinates: it broadcasts a status query on a periodic window
//! and folds the replies into a per-node table. All derived readiness
//! summaries are pure reads over that table. Every entry point runs from
//! one priority level (the manager is a tick listener), so the table
//! needs no locking.

use std::sync::Arc;

use cadence_core::{CadenceResult, NodeId, PeriodicTimeSpec, TimeSpec, TimeTick};
use cadence_time::{TickListener, TickerShared};

use crate::{InboundMessage, NodeState, StatusMessage};

/// Query rounds a known node may stay silent before it is marked
/// timed out.
const TIMEOUT_ROUNDS: u32 = 5;

/// Rounds between forced full broadcasts once the query has slowed down;
/// keeps a late joiner from being starved of status traffic.
const FORCE_QUERY_ROUNDS: u32 = 16;

/// Query-interval stretch factor applied after the federation completes.
const SLOW_QUERY_FACTOR: u32 = 10;

/// The status channel, as seen by the membership machine.
///
/// Carried over the external typed-channel API; the manager only decides
/// what to send and how to aggregate what comes back.
pub trait StatusTransport: Send {
    fn send_query(&mut self) -> CadenceResult<()>;
    fn send_status(&mut self, status: StatusMessage) -> CadenceResult<()>;
    fn send_emergency(&mut self) -> CadenceResult<()>;
    /// Inbound messages received since the last poll.
    fn drain(&mut self) -> Vec<InboundMessage>;
}

struct NodeEntry {
    state: NodeState,
    replied: bool,
    missed_rounds: u32,
}

impl NodeEntry {
    fn new() -> Self {
        NodeEntry {
            state: NodeState::Unseen,
            replied: false,
            missed_rounds: 0,
        }
    }
}

/// Membership and readiness of the whole federation.
pub struct NodeManager {
    node: NodeId,
    local_state: NodeState,
    table: Vec<NodeEntry>,
    query_spec: PeriodicTimeSpec,
    slow_skips: u32,
    force_countdown: u32,
    ticker: Arc<TickerShared>,
    transport: Box<dyn StatusTransport>,
    emergency: bool,
}

impl NodeManager {
    /// A manager for `node` in a federation of `node_count` nodes,
    /// querying every `query_period` ticks.
    pub fn new(
        node: NodeId,
        node_count: usize,
        query_period: TimeTick,
        ticker: Arc<TickerShared>,
        transport: Box<dyn StatusTransport>,
    ) -> CadenceResult<Self> {
        Ok(NodeManager {
            node,
            local_state: NodeState::Communicating,
            table: (0..node_count).map(|_| NodeEntry::new()).collect(),
            query_spec: PeriodicTimeSpec::new(0, query_period)?,
            slow_skips: 0,
            force_countdown: FORCE_QUERY_ROUNDS,
            ticker,
            transport,
            emergency: false,
        })
    }

    /// Report a new local lifecycle state; sent on the next query.
    pub fn set_local_state(&mut self, state: NodeState) {
        self.local_state = state;
    }

    pub fn local_state(&self) -> NodeState {
        self.local_state
    }

    /// State of one node as last reported; `Unseen` for unknown ids.
    pub fn node_state(&self, node: NodeId) -> NodeState {
        self.table
            .get(node.index())
            .map(|e| e.state)
            .unwrap_or_default()
    }

    /// True iff every node in the federation has fully joined.
    pub fn is_complete(&self) -> bool {
        !self.table.is_empty() && self.table.iter().all(|e| e.state.is_joined())
    }

    /// True iff this node communicates but not all peers have confirmed.
    pub fn is_completing(&self) -> bool {
        self.local_state.is_communicating() && !self.is_complete()
    }

    /// True iff the federation is complete and the tick source reports
    /// synchronized timing.
    pub fn is_synced(&self) -> bool {
        self.is_complete() && self.ticker.is_synced()
    }

    /// Broadcast an immediate forced-safe transition.
    ///
    /// Unconditional: runs regardless of readiness level and bypasses the
    /// normal query machinery.
    pub fn emergency(&mut self) {
        self.emergency = true;
        tracing::error!("emergency stop, broadcasting forced-safe transition");
        if let Err(e) = self.transport.send_emergency() {
            tracing::error!("emergency broadcast failed: {}", e);
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }

    /// Handle one inbound status-channel message.
    pub fn deliver(&mut self, msg: InboundMessage) {
        match msg {
            InboundMessage::Query => {
                let status = StatusMessage {
                    node: self.node,
                    state: self.local_state,
                };
                if let Err(e) = self.transport.send_status(status) {
                    tracing::warn!("status reply failed: {}", e);
                }
            }
            InboundMessage::Status(status) => self.apply_status(status),
            InboundMessage::Emergency => {
                self.emergency = true;
                tracing::error!("emergency stop received from peer");
            }
        }
    }

    fn apply_status(&mut self, status: StatusMessage) {
        let Some(entry) = self.table.get_mut(status.node.index()) else {
            tracing::warn!("status from node {} outside the federation", status.node);
            return;
        };
        entry.state = status.state;
        entry.replied = true;
        entry.missed_rounds = 0;
    }

    /// Settle the previous round and open a new one.
    fn query_round(&mut self) {
        for (index, entry) in self.table.iter_mut().enumerate() {
            if !entry.replied && entry.state != NodeState::Unseen {
                entry.missed_rounds += 1;
                if entry.missed_rounds >= TIMEOUT_ROUNDS && entry.state.is_communicating() {
                    entry.state = NodeState::TimedOut;
                    tracing::warn!(
                        "node {} timed out after {} silent query rounds",
                        index,
                        entry.missed_rounds
                    );
                }
            }
            entry.replied = false;
        }

        if let Err(e) = self.transport.send_query() {
            tracing::warn!("status query failed: {}", e);
        }
        // the coordinator answers its own query directly, replies from the
        // other nodes arrive through the transport
        self.apply_status(StatusMessage {
            node: self.node,
            state: self.local_state,
        });
    }
}

impl TickListener for NodeManager {
    fn on_tick(&mut self, ts: &TimeSpec) {
        for msg in self.transport.drain() {
            self.deliver(msg);
        }
        if !self.node.is_coordinator() {
            return;
        }
        if !self.query_spec.greedy_advance(ts) {
            return;
        }

        if self.is_complete() {
            // steady state: stretch the query interval, with a periodic
            // forced broadcast so a late joiner still hears from us
            self.slow_skips += 1;
            self.force_countdown = self.force_countdown.saturating_sub(1);
            if self.slow_skips < SLOW_QUERY_FACTOR && self.force_countdown > 0 {
                return;
            }
            if self.force_countdown == 0 {
                tracing::debug!("forced full status broadcast");
                self.force_countdown = FORCE_QUERY_ROUNDS;
            }
            self.slow_skips = 0;
        } else {
            self.force_countdown = FORCE_QUERY_ROUNDS;
        }
        self.query_round();
    }
}
