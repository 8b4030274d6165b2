//! B-tree node and its on-disk format.

use crate::common::{Error, NodeAddress, Result, SlotOffset};

/// Top bit of a stored leaf pointer: set when the entry is tombstoned.
///
/// Heap offsets never reach 2^63, so the bit is free, and tombstoning an
/// entry is a single in-place bit flip that leaves the pointer readable.
pub const TOMBSTONE_BIT: u64 = 1 << 63;

/// Fixed part of a node: `is_leaf (1) + next (8) + prev (8) + key_count (4)`.
const NODE_HEADER_SIZE: usize = 21;

/// A leaf's view of one index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    pub pointer: SlotOffset,
    pub alive: bool,
}

impl LeafEntry {
    pub fn live(pointer: SlotOffset) -> Self {
        Self {
            pointer,
            alive: true,
        }
    }

    fn to_wire(self) -> u64 {
        let raw = self.pointer.0 & !TOMBSTONE_BIT;
        if self.alive {
            raw
        } else {
            raw | TOMBSTONE_BIT
        }
    }

    fn from_wire(raw: u64) -> Self {
        Self {
            pointer: SlotOffset::new(raw & !TOMBSTONE_BIT),
            alive: raw & TOMBSTONE_BIT == 0,
        }
    }
}

/// The part of a node that differs between leaves and internal nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    /// Routing node: `children.len() == keys.len() + 1`.
    Internal { children: Vec<NodeAddress> },
    /// Leaf: `entries.len() == keys.len()`.
    Leaf { entries: Vec<LeafEntry> },
}

/// One B-tree node.
///
/// # On-disk format (big-endian)
/// ```text
/// is_leaf (1) │ next (8) │ prev (8) │ key_count (4) │ keys (key_count × 4)
///   internal: children (key_count+1 × 8)
///   leaf:     pointers (key_count × 8, top bit = tombstone)
/// ```
///
/// Every node owns a fixed-size region of [`BTreeNode::disk_size`] bytes,
/// enough for a full node, so it can be rewritten in place as it grows.
/// The unused tail of the region is zeroed.
///
/// `next`/`prev` link leaves in key order; internal nodes keep them invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTreeNode {
    pub address: NodeAddress,
    pub keys: Vec<i32>,
    pub body: NodeBody,
    pub next: NodeAddress,
    pub prev: NodeAddress,
}

impl BTreeNode {
    /// An empty, unlinked leaf.
    pub fn new_leaf(address: NodeAddress) -> Self {
        Self {
            address,
            keys: Vec::new(),
            body: NodeBody::Leaf {
                entries: Vec::new(),
            },
            next: NodeAddress::INVALID,
            prev: NodeAddress::INVALID,
        }
    }

    /// An internal node with no keys and a single child.
    pub fn new_internal(address: NodeAddress, first_child: NodeAddress) -> Self {
        Self {
            address,
            keys: Vec::new(),
            body: NodeBody::Internal {
                children: vec![first_child],
            },
            next: NodeAddress::INVALID,
            prev: NodeAddress::INVALID,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf { .. })
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Bytes reserved for one node of a tree with minimum degree `degree`.
    pub fn disk_size(degree: u16) -> usize {
        let max_keys = 2 * degree as usize - 1;
        let max_children = 2 * degree as usize;
        NODE_HEADER_SIZE + max_keys * 4 + max_children * 8
    }

    /// Index of the child whose subtree may contain `key`.
    ///
    /// Keys equal to a separator go right: a separator is the smallest key
    /// of the subtree to its right.
    #[inline]
    pub fn child_index(&self, key: i32) -> usize {
        self.keys.partition_point(|&k| k <= key)
    }

    /// Encode into a zero-padded buffer of `disk_size(degree)` bytes.
    ///
    /// # Errors
    /// Returns `Error::CorruptIndex` if the node holds more than `2t-1` keys
    /// or its body doesn't match its key count. Callers split first.
    pub fn encode(&self, degree: u16) -> Result<Vec<u8>> {
        let max_keys = 2 * degree as usize - 1;
        if self.keys.len() > max_keys {
            return Err(Error::corrupt(
                self.address,
                format!("{} keys exceed node capacity {}", self.keys.len(), max_keys),
            ));
        }

        let mut buf = Vec::with_capacity(Self::disk_size(degree));
        buf.push(self.is_leaf() as u8);
        buf.extend_from_slice(&self.next.to_wire().to_be_bytes());
        buf.extend_from_slice(&self.prev.to_wire().to_be_bytes());
        buf.extend_from_slice(&(self.keys.len() as i32).to_be_bytes());
        for key in &self.keys {
            buf.extend_from_slice(&key.to_be_bytes());
        }

        match &self.body {
            NodeBody::Internal { children } => {
                if children.len() != self.keys.len() + 1 {
                    return Err(Error::corrupt(
                        self.address,
                        format!("{} children for {} keys", children.len(), self.keys.len()),
                    ));
                }
                for child in children {
                    buf.extend_from_slice(&child.to_wire().to_be_bytes());
                }
            }
            NodeBody::Leaf { entries } => {
                if entries.len() != self.keys.len() {
                    return Err(Error::corrupt(
                        self.address,
                        format!("{} pointers for {} keys", entries.len(), self.keys.len()),
                    ));
                }
                for entry in entries {
                    buf.extend_from_slice(&entry.to_wire().to_be_bytes());
                }
            }
        }

        buf.resize(Self::disk_size(degree), 0);
        Ok(buf)
    }

    /// Decode the node stored at `address`.
    ///
    /// # Errors
    /// Returns `Error::CorruptIndex` if the buffer is too short for the key
    /// count it declares, or the key count is out of range.
    pub fn decode(address: NodeAddress, bytes: &[u8], degree: u16) -> Result<Self> {
        if bytes.len() < NODE_HEADER_SIZE {
            return Err(Error::corrupt(address, "node shorter than its header"));
        }

        let is_leaf = bytes[0] != 0;
        let next = NodeAddress::from_wire(read_i64(bytes, 1));
        let prev = NodeAddress::from_wire(read_i64(bytes, 9));
        let key_count = read_i32(bytes, 17);

        let max_keys = 2 * degree as usize - 1;
        let key_count = usize::try_from(key_count)
            .ok()
            .filter(|&n| n <= max_keys)
            .ok_or_else(|| Error::corrupt(address, format!("key count {} out of range", key_count)))?;

        let tail = if is_leaf { key_count } else { key_count + 1 };
        let needed = NODE_HEADER_SIZE + key_count * 4 + tail * 8;
        if bytes.len() < needed {
            return Err(Error::corrupt(
                address,
                format!("node needs {} bytes, have {}", needed, bytes.len()),
            ));
        }

        let mut pos = NODE_HEADER_SIZE;
        let mut keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            keys.push(read_i32(bytes, pos));
            pos += 4;
        }

        let body = if is_leaf {
            let entries = (0..key_count)
                .map(|i| LeafEntry::from_wire(read_i64(bytes, pos + i * 8) as u64))
                .collect();
            NodeBody::Leaf { entries }
        } else {
            let children = (0..=key_count)
                .map(|i| NodeAddress::from_wire(read_i64(bytes, pos + i * 8)))
                .collect();
            NodeBody::Internal { children }
        };

        Ok(Self {
            address,
            keys,
            body,
            next,
            prev,
        })
    }
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    i32::from_be_bytes(raw)
}

fn read_i64(bytes: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    i64::from_be_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> BTreeNode {
        let mut node = BTreeNode::new_leaf(NodeAddress::new(100));
        node.keys = vec![1, 5, 9];
        node.body = NodeBody::Leaf {
            entries: vec![
                LeafEntry::live(SlotOffset::new(4)),
                LeafEntry {
                    pointer: SlotOffset::new(40),
                    alive: false,
                },
                LeafEntry::live(SlotOffset::new(80)),
            ],
        };
        node.next = NodeAddress::new(300);
        node
    }

    #[test]
    fn test_disk_size() {
        // t=2: header 21 + 3 keys × 4 + 4 children × 8
        assert_eq!(BTreeNode::disk_size(2), 21 + 12 + 32);
    }

    #[test]
    fn test_leaf_roundtrip() {
        let node = leaf();
        let bytes = node.encode(2).unwrap();
        assert_eq!(bytes.len(), BTreeNode::disk_size(2));
        assert_eq!(BTreeNode::decode(node.address, &bytes, 2).unwrap(), node);
    }

    #[test]
    fn test_internal_roundtrip() {
        let mut node = BTreeNode::new_internal(NodeAddress::new(7), NodeAddress::new(100));
        node.keys = vec![10];
        if let NodeBody::Internal { children } = &mut node.body {
            children.push(NodeAddress::new(200));
        }
        let bytes = node.encode(2).unwrap();
        assert_eq!(BTreeNode::decode(node.address, &bytes, 2).unwrap(), node);
    }

    #[test]
    fn test_leaf_layout() {
        let bytes = leaf().encode(2).unwrap();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..9], &300i64.to_be_bytes());
        assert_eq!(&bytes[9..17], &(-1i64).to_be_bytes());
        assert_eq!(&bytes[17..21], &3i32.to_be_bytes());
        assert_eq!(&bytes[21..25], &1i32.to_be_bytes());
        // Second pointer carries the tombstone bit
        let second = &bytes[33 + 8..33 + 16];
        assert_eq!(second, &(40u64 | TOMBSTONE_BIT).to_be_bytes());
    }

    #[test]
    fn test_encode_overfull_fails() {
        let mut node = leaf();
        node.keys.push(12);
        if let NodeBody::Leaf { entries } = &mut node.body {
            entries.push(LeafEntry::live(SlotOffset::new(120)));
        }
        assert!(matches!(node.encode(2), Err(Error::CorruptIndex { .. })));
    }

    #[test]
    fn test_encode_mismatched_body_fails() {
        let mut node = leaf();
        node.keys.pop();
        assert!(node.encode(2).is_err());
    }

    #[test]
    fn test_decode_bad_key_count_fails() {
        let mut bytes = leaf().encode(2).unwrap();
        bytes[17..21].copy_from_slice(&9i32.to_be_bytes());
        assert!(BTreeNode::decode(NodeAddress::new(100), &bytes, 2).is_err());

        bytes[17..21].copy_from_slice(&(-1i32).to_be_bytes());
        assert!(BTreeNode::decode(NodeAddress::new(100), &bytes, 2).is_err());
    }

    #[test]
    fn test_child_index() {
        let mut node = BTreeNode::new_internal(NodeAddress::new(0), NodeAddress::new(1));
        node.keys = vec![10, 20];
        assert_eq!(node.child_index(5), 0);
        assert_eq!(node.child_index(10), 1);
        assert_eq!(node.child_index(15), 1);
        assert_eq!(node.child_index(20), 2);
        assert_eq!(node.child_index(99), 2);
    }
}
