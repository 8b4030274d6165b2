//! Disk-resident B-tree index.
//!
//! Maps `int32` primary keys to heap-file slot offsets. Every node lives at
//! a fixed address in the index file and is read and written individually;
//! the tree is never materialised in memory as a whole.
//!
//! # Components
//! - [`IndexConfig`] / [`IndexMetadata`] - The file-level metadata block
//! - [`BTreeNode`] - One node and its on-disk format
//! - [`NodeFile`] - Offset-addressed node persistence
//! - [`BTreeIndex`] - Search, insert, and tombstone delete
//!
//! # Structure
//! Keys and heap pointers live in the leaves; internal nodes only route.
//! Leaves are doubly linked through `next`/`prev` so ordered traversal never
//! re-descends the tree. Deletes only tombstone leaf entries; nodes are
//! never merged or freed.

mod metadata;
mod node;
mod node_file;
mod tree;

pub use metadata::{IndexConfig, IndexMetadata};
pub use node::{BTreeNode, LeafEntry, NodeBody};
pub use node_file::NodeFile;
pub use tree::{BTreeIndex, Entries, IndexShape};
