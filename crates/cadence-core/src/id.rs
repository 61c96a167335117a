//! Identity types for the cadence middleware
//!
//! Nodes and the objects they host are identified by 16-bit indices; a
//! channel end-point anywhere in the federation is the pair of the two.

use std::fmt;

/// Node identity - index of a node within the federation.
///
/// Node 0 is the coordinator for membership queries and timing.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub u16);

impl NodeId {
    pub const ZERO: NodeId = NodeId(0);

    #[inline]
    pub fn new(id: u16) -> Self {
        NodeId(id)
    }

    /// Index into per-node tables.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this node coordinates membership and timing.
    #[inline]
    pub fn is_coordinator(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object identity - index of an object within its node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId(pub u16);

impl ObjectId {
    #[inline]
    pub fn new(id: u16) -> Self {
        ObjectId(id)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Federation-wide channel end-point key: the hosting node plus the object
/// index on that node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GlobalId {
    pub location: NodeId,
    pub object: ObjectId,
}

impl GlobalId {
    /// Encoded size on the wire.
    pub const WIRE_SIZE: usize = 4;

    #[inline]
    pub fn new(location: NodeId, object: ObjectId) -> Self {
        GlobalId { location, object }
    }

    /// Wire form: location then object, big-endian.
    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        let l = self.location.0.to_be_bytes();
        let o = self.object.0.to_be_bytes();
        [l[0], l[1], o[0], o[1]]
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        GlobalId {
            location: NodeId(u16::from_be_bytes([bytes[0], bytes[1]])),
            object: ObjectId(u16::from_be_bytes([bytes[2], bytes[3]])),
        }
    }
}

impl fmt::Debug for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({}/{})", self.location, self.object)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location, self.object)
    }
}
