//! Index node address type.

use std::fmt;

/// Byte address of a B-tree node within the index file.
///
/// Nodes are written at fixed addresses and rewritten in place, so an
/// address stays valid for the lifetime of the index. `-1` on disk means
/// "no node" (e.g. the `next` link of the rightmost leaf).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress(pub u64);

impl NodeAddress {
    /// Invalid/sentinel address.
    pub const INVALID: NodeAddress = NodeAddress(u64::MAX);

    /// Create a new NodeAddress.
    #[inline]
    pub fn new(address: u64) -> Self {
        NodeAddress(address)
    }

    /// Check if this address is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    #[inline]
    pub fn to_wire(self) -> i64 {
        if self.is_valid() {
            self.0 as i64
        } else {
            -1
        }
    }

    #[inline]
    pub fn from_wire(raw: i64) -> Self {
        if raw < 0 {
            Self::INVALID
        } else {
            NodeAddress(raw as u64)
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Node(INVALID)")
        } else {
            write!(f, "Node({})", self.0)
        }
    }
}
