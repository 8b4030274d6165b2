//! slotdb - A variable-length record heap file with a disk-resident B-tree
//! primary index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            slotdb                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Record Store (store/)                       │   │
//! │  │   insert / get / update / delete / scan + statistics     │   │
//! │  │   UpdateCoordinator (in place ←─OR─→ relocate)           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                 ↓                              ↓                │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐   │
//! │  │   Index (index/btree/)   │   │   Heap File (storage/)   │   │
//! │  │  BTreeIndex + NodeFile   │──→│  HeapFile + SlotHeader   │   │
//! │  │  key → slot offset       │   │  tombstoned slots        │   │
//! │  └──────────────────────────┘   └──────────────────────────┘   │
//! │                                               ↑                 │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Records (record/)                           │   │
//! │  │         FieldValue + Record + RecordCodec                │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (SlotOffset, NodeAddress, Error, config)
//! - [`record`] - Record model and payload encoding
//! - [`storage`] - Heap file and slot format
//! - [`index`] - Disk-resident B-tree
//! - [`store`] - The heap/index pair behind the record operations
//! - [`logging`] - Subscriber setup for binaries
//!
//! # Quick Start
//! ```no_run
//! use slotdb::{FieldValue, RecordStore, StoreConfig, UpdateOutcome};
//!
//! let mut store = RecordStore::open(StoreConfig::new("/tmp/accidents")).unwrap();
//!
//! let id = store.insert(vec![FieldValue::from("BR-101"), FieldValue::from(2)]).unwrap();
//!
//! // A payload that outgrows its slot moves to the end of the file
//! let outcome = store
//!     .update(id, vec![FieldValue::from("BR-101, km 204, northbound lane")])
//!     .unwrap();
//! assert!(matches!(outcome, UpdateOutcome::Relocated { .. }));
//! ```

pub mod common;
pub mod index;
pub mod logging;
pub mod record;
pub mod storage;
pub mod store;

// Re-export commonly used items at crate root for convenience
pub use common::{Error, NodeAddress, Result, SlotOffset, StoreConfig};

pub use index::{BTreeIndex, IndexConfig};
pub use record::{FieldValue, Record, RecordCodec};
pub use storage::{HeapFile, Slot, SlotHeader};
pub use store::{RecordStore, StoreStats, UpdateOutcome};
