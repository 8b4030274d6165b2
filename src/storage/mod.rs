//! Storage layer - the heap file and its slot format.
//!
//! This module handles persistent record storage:
//! - [`HeapFile`] - Append-only-with-holes file of framed records
//! - [`SlotHeader`] / [`Slot`] - Per-record framing

mod heap_file;
mod slot;

pub use heap_file::HeapFile;
pub use slot::{Slot, SlotHeader};
