//! Node lifecycle states and status messages

use std::fmt;

use cadence_core::NodeId;

/// Lifecycle of a node as seen by the membership table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeState {
    /// No status message received yet.
    #[default]
    Unseen,
    /// Basic communication established, channels not all confirmed.
    Communicating,
    /// Fully joined the federation.
    Joined,
    /// Stopped answering status queries.
    TimedOut,
}

impl NodeState {
    #[inline]
    pub fn is_joined(self) -> bool {
        self == NodeState::Joined
    }

    /// Whether the node is at least exchanging messages.
    #[inline]
    pub fn is_communicating(self) -> bool {
        matches!(self, NodeState::Communicating | NodeState::Joined)
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Unseen => "unseen",
            NodeState::Communicating => "communicating",
            NodeState::Joined => "joined",
            NodeState::TimedOut => "timed-out",
        };
        f.write_str(name)
    }
}

/// One node's answer to the status query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusMessage {
    pub node: NodeId,
    pub state: NodeState,
}

/// Inbound traffic on the status channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// The coordinator asks every node to report.
    Query,
    /// A node's report.
    Status(StatusMessage),
    /// Forced-safe transition, effective immediately.
    Emergency,
}
