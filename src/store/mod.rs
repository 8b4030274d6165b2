//! The record store: a heap file and its primary-key index, used together.
//!
//! # Components
//! - [`RecordStore`] - Insert, read, update, delete, and scan
//! - [`UpdateCoordinator`] - In-place overwrite vs relocation
//! - [`SequentialScanner`] - Full and bounded heap scans
//! - [`StoreStats`] - Operation counters

mod record_store;
mod scan;
mod stats;
mod update;

pub use record_store::RecordStore;
pub use scan::SequentialScanner;
pub use stats::StoreStats;
pub use update::{UpdateCoordinator, UpdateOutcome};
