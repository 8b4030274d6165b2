//! Common types and utilities shared across slotdb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`StoreConfig`]
//! - Error types
//! - Identifiers ([`SlotOffset`], [`NodeAddress`])

pub mod config;
pub mod error;
mod node_address;
mod slot_offset;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use node_address::NodeAddress;
pub use slot_offset::SlotOffset;
