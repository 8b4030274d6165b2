//! Index structures.
//!
//! - [`btree`] - Disk-resident B-tree mapping primary keys to heap offsets

pub mod btree;

pub use btree::{BTreeIndex, IndexConfig};
