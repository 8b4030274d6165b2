//! B-tree search, insert, and tombstone delete.

use std::path::Path;

use tracing::{debug, info};

use crate::common::{Error, NodeAddress, Result, SlotOffset};

use super::metadata::IndexConfig;
use super::node::{BTreeNode, LeafEntry, NodeBody};
use super::node_file::NodeFile;

/// Disk-resident B-tree mapping `int32` keys to heap slot offsets.
///
/// # Invariants
/// - Keys within a node are strictly ascending.
/// - For an internal node, every key in `children[i]` is `< keys[i]` and
///   `>= keys[i-1]`.
/// - Every non-root node holds between `t-1` and `2t-1` keys after each
///   operation; all leaves are at the same depth.
/// - Leaves are doubly linked in key order.
///
/// The tree only grows at the root. `delete` tombstones a leaf entry and
/// never restructures the tree.
///
/// # Example
/// ```no_run
/// use slotdb::{BTreeIndex, IndexConfig, SlotOffset};
///
/// let config = IndexConfig::new(2, "records.idx", "records.db");
/// let mut index = BTreeIndex::create("records.idx", config).unwrap();
/// index.insert(5, SlotOffset::new(4)).unwrap();
/// assert_eq!(index.search(5).unwrap(), Some(SlotOffset::new(4)));
/// ```
pub struct BTreeIndex {
    nodes: NodeFile,
}

/// Result of a one-level split: the separator to push into the parent and
/// the address of the new right sibling.
struct Split {
    separator: i32,
    right: NodeAddress,
}

impl BTreeIndex {
    /// Create a new, empty index file.
    pub fn create<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        Ok(Self {
            nodes: NodeFile::create(path, config)?,
        })
    }

    /// Open an existing index file. Its persisted configuration is used.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            nodes: NodeFile::open(path)?,
        })
    }

    /// Open an existing index file, or create it with `config`.
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        Ok(Self {
            nodes: NodeFile::open_or_create(path, config)?,
        })
    }

    pub fn set_sync_writes(&mut self, sync_writes: bool) {
        self.nodes.set_sync_writes(sync_writes);
    }

    #[inline]
    pub fn config(&self) -> &IndexConfig {
        self.nodes.config()
    }

    #[inline]
    pub fn degree(&self) -> u16 {
        self.nodes.degree()
    }

    #[inline]
    pub fn root_address(&self) -> NodeAddress {
        self.nodes.root_address()
    }

    /// Number of nodes ever allocated.
    pub fn node_count(&self) -> u64 {
        self.nodes.node_count()
    }

    /// Read any node by address.
    pub fn read_node(&mut self, address: NodeAddress) -> Result<BTreeNode> {
        self.nodes.read_node(address)
    }

    /// Find the live pointer stored for `key`.
    ///
    /// Returns `Ok(None)` when the key is absent or tombstoned.
    pub fn search(&mut self, key: i32) -> Result<Option<SlotOffset>> {
        Ok(self
            .lookup_entry(key)?
            .filter(|entry| entry.alive)
            .map(|entry| entry.pointer))
    }

    /// Find the leaf entry for `key`, tombstoned or not.
    pub fn lookup_entry(&mut self, key: i32) -> Result<Option<LeafEntry>> {
        let (_, leaf) = self.find_leaf(key)?;
        let NodeBody::Leaf { entries } = &leaf.body else {
            return Err(Error::corrupt(leaf.address, "descent ended at internal node"));
        };
        Ok(leaf
            .keys
            .binary_search(&key)
            .ok()
            .map(|i| entries[i]))
    }

    /// Map `key` to `pointer`.
    ///
    /// If the key already has an entry, live or tombstoned, it is repointed
    /// and revived in place. Otherwise the entry goes into its leaf in sorted
    /// position, splitting full nodes on the way back up to the root.
    pub fn insert(&mut self, key: i32, pointer: SlotOffset) -> Result<()> {
        let max_keys = self.config().max_keys();
        let (mut path, mut leaf) = self.find_leaf(key)?;

        let pos = match leaf.keys.binary_search(&key) {
            Ok(i) => {
                if let NodeBody::Leaf { entries } = &mut leaf.body {
                    entries[i] = LeafEntry::live(pointer);
                }
                self.nodes.write_node(&leaf)?;
                debug!(key, %pointer, "repointed index entry");
                return Ok(());
            }
            Err(i) => i,
        };

        leaf.keys.insert(pos, key);
        if let NodeBody::Leaf { entries } = &mut leaf.body {
            entries.insert(pos, LeafEntry::live(pointer));
        }

        if leaf.key_count() <= max_keys {
            return self.nodes.write_node(&leaf);
        }

        let mut left = leaf.address;
        let mut split = self.split_leaf(leaf)?;

        loop {
            let Some((mut parent, child_idx)) = path.pop() else {
                self.grow_root(left, split)?;
                return Ok(());
            };

            parent.keys.insert(child_idx, split.separator);
            if let NodeBody::Internal { children } = &mut parent.body {
                children.insert(child_idx + 1, split.right);
            }

            if parent.key_count() <= max_keys {
                return self.nodes.write_node(&parent);
            }

            left = parent.address;
            split = self.split_internal(parent)?;
        }
    }

    /// Tombstone the entry for `key`.
    ///
    /// Returns `false` if there was no live entry. The entry stays physically
    /// in its leaf with its pointer intact.
    pub fn delete(&mut self, key: i32) -> Result<bool> {
        let (_, mut leaf) = self.find_leaf(key)?;
        let Ok(i) = leaf.keys.binary_search(&key) else {
            return Ok(false);
        };

        let NodeBody::Leaf { entries } = &mut leaf.body else {
            return Err(Error::corrupt(leaf.address, "descent ended at internal node"));
        };
        if !entries[i].alive {
            return Ok(false);
        }
        entries[i].alive = false;
        self.nodes.write_node(&leaf)?;

        debug!(key, leaf = %leaf.address, "tombstoned index entry");
        Ok(true)
    }

    /// Iterate live `(key, pointer)` pairs in ascending key order.
    ///
    /// Walks the leaf chain from the leftmost leaf without re-descending.
    pub fn entries(&mut self) -> Result<Entries<'_>> {
        let mut node = self.nodes.read_node(self.root_address())?;
        while let NodeBody::Internal { children } = &node.body {
            let first = children[0];
            node = self.nodes.read_node(first)?;
        }
        Ok(Entries {
            nodes: &mut self.nodes,
            leaf: Some(node),
            pos: 0,
        })
    }

    /// Check every structural invariant of the tree.
    ///
    /// # Errors
    /// Returns `Error::CorruptIndex` naming the first offending node.
    pub fn validate(&mut self) -> Result<IndexShape> {
        let min_keys = self.config().min_keys();
        let max_keys = self.config().max_keys();
        let root = self.root_address();

        let mut shape = IndexShape::default();
        let mut leaf_depth = None;
        let mut leaves = Vec::new();

        // (address, depth, lower bound inclusive, upper bound exclusive)
        let mut stack = vec![(root, 0usize, None::<i32>, None::<i32>)];
        while let Some((address, depth, lo, hi)) = stack.pop() {
            let node = self.nodes.read_node(address)?;
            shape.nodes += 1;

            let n = node.key_count();
            if n > max_keys || (address != root && n < min_keys) {
                return Err(Error::corrupt(
                    address,
                    format!("{} keys outside [{}, {}]", n, min_keys, max_keys),
                ));
            }
            if node.keys.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::corrupt(address, "keys not strictly ascending"));
            }
            let in_range = |k: &i32| lo.map_or(true, |lo| *k >= lo) && hi.map_or(true, |hi| *k < hi);
            if !node.keys.iter().all(in_range) {
                return Err(Error::corrupt(address, "key outside parent separator range"));
            }

            match &node.body {
                NodeBody::Internal { children } => {
                    if n == 0 {
                        return Err(Error::corrupt(address, "internal node without keys"));
                    }
                    // Push right-to-left so leaves are visited left-to-right
                    for (i, &child) in children.iter().enumerate().rev() {
                        let child_lo = if i == 0 { lo } else { Some(node.keys[i - 1]) };
                        let child_hi = if i == n { hi } else { Some(node.keys[i]) };
                        stack.push((child, depth + 1, child_lo, child_hi));
                    }
                }
                NodeBody::Leaf { entries } => {
                    match leaf_depth {
                        None => leaf_depth = Some(depth),
                        Some(d) if d != depth => {
                            return Err(Error::corrupt(
                                address,
                                format!("leaf at depth {}, expected {}", depth, d),
                            ));
                        }
                        Some(_) => {}
                    }
                    shape.leaves += 1;
                    shape.live_entries += entries.iter().filter(|e| e.alive).count();
                    shape.dead_entries += entries.iter().filter(|e| !e.alive).count();
                    leaves.push((node.address, node.prev, node.next));
                }
            }
        }

        for (i, &(address, prev, next)) in leaves.iter().enumerate() {
            let expected_prev = if i == 0 { NodeAddress::INVALID } else { leaves[i - 1].0 };
            let expected_next = leaves.get(i + 1).map_or(NodeAddress::INVALID, |l| l.0);
            if prev != expected_prev || next != expected_next {
                return Err(Error::corrupt(address, "leaf chain out of order"));
            }
        }

        shape.height = leaf_depth.unwrap_or(0) + 1;
        Ok(shape)
    }

    /// Flush written data to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.nodes.sync()
    }

    /// Descend from the root to the leaf that would hold `key`.
    ///
    /// Returns the internal nodes on the way down, each with the index of
    /// the child that was taken, and the leaf itself.
    fn find_leaf(&mut self, key: i32) -> Result<(Vec<(BTreeNode, usize)>, BTreeNode)> {
        let mut path = Vec::new();
        let mut node = self.nodes.read_node(self.root_address())?;

        loop {
            let child = match &node.body {
                NodeBody::Leaf { .. } => return Ok((path, node)),
                NodeBody::Internal { children } => {
                    let idx = node.child_index(key);
                    let child = children[idx];
                    path.push((node, idx));
                    child
                }
            };
            node = self.nodes.read_node(child)?;
        }
    }

    /// Split an overfull leaf. The first key of the new right leaf is copied
    /// up as separator.
    fn split_leaf(&mut self, mut leaf: BTreeNode) -> Result<Split> {
        let mid = leaf.key_count() / 2;
        let mut right = self.nodes.allocate_leaf()?;

        right.keys = leaf.keys.split_off(mid);
        if let (NodeBody::Leaf { entries }, NodeBody::Leaf { entries: right_entries }) =
            (&mut leaf.body, &mut right.body)
        {
            *right_entries = entries.split_off(mid);
        }

        right.prev = leaf.address;
        right.next = leaf.next;
        if leaf.next.is_valid() {
            let mut old_next = self.nodes.read_node(leaf.next)?;
            old_next.prev = right.address;
            self.nodes.write_node(&old_next)?;
        }
        leaf.next = right.address;

        self.nodes.write_node(&right)?;
        self.nodes.write_node(&leaf)?;

        debug!(left = %leaf.address, right = %right.address, separator = right.keys[0], "split leaf");
        Ok(Split {
            separator: right.keys[0],
            right: right.address,
        })
    }

    /// Split an overfull internal node. The middle key moves up.
    fn split_internal(&mut self, mut node: BTreeNode) -> Result<Split> {
        let mid = node.key_count() / 2;

        let NodeBody::Internal { children } = &mut node.body else {
            return Err(Error::corrupt(node.address, "expected internal node"));
        };
        let right_children = children.split_off(mid + 1);
        let mut right_keys = node.keys.split_off(mid);
        let separator = right_keys.remove(0);

        let mut right = self.nodes.allocate_internal(right_children[0])?;
        right.keys = right_keys;
        right.body = NodeBody::Internal {
            children: right_children,
        };

        self.nodes.write_node(&right)?;
        self.nodes.write_node(&node)?;

        debug!(left = %node.address, right = %right.address, separator, "split internal node");
        Ok(Split {
            separator,
            right: right.address,
        })
    }

    /// Put a new root above a split root.
    fn grow_root(&mut self, left: NodeAddress, split: Split) -> Result<()> {
        let mut root = self.nodes.allocate_internal(left)?;
        root.keys.push(split.separator);
        if let NodeBody::Internal { children } = &mut root.body {
            children.push(split.right);
        }
        self.nodes.write_node(&root)?;
        self.nodes.set_root(root.address)?;

        info!(root = %root.address, "index grew a level");
        Ok(())
    }
}

/// Summary of a validated tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexShape {
    /// Levels from root to leaves; 1 for a single leaf.
    pub height: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub live_entries: usize,
    pub dead_entries: usize,
}

/// Ordered iterator over live index entries. See [`BTreeIndex::entries`].
pub struct Entries<'a> {
    nodes: &'a mut NodeFile,
    leaf: Option<BTreeNode>,
    pos: usize,
}

impl Iterator for Entries<'_> {
    type Item = Result<(i32, SlotOffset)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf.as_ref()?;

            if let NodeBody::Leaf { entries } = &leaf.body {
                while self.pos < leaf.keys.len() {
                    let i = self.pos;
                    self.pos += 1;
                    if entries[i].alive {
                        return Some(Ok((leaf.keys[i], entries[i].pointer)));
                    }
                }
            }

            let next = leaf.next;
            self.pos = 0;
            if !next.is_valid() {
                self.leaf = None;
                return None;
            }
            match self.nodes.read_node(next) {
                Ok(node) => self.leaf = Some(node),
                Err(e) => {
                    self.leaf = None;
                    return Some(Err(e));
                }
            }
        }
    }
}
