//! Error types for slotdb.

use thiserror::Error;

use crate::common::{NodeAddress, SlotOffset};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in slotdb.
///
/// Reaching the end of the heap file is not an error: the read-slot
/// operations return `Ok(None)` there, since every scan ends that way.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying file.
    ///
    /// Fatal for the current operation; never retried.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record payload could not be decoded.
    ///
    /// Indicates corruption. `offset` is the slot offset when the payload
    /// came from the heap file.
    #[error("malformed record{}: {reason}", fmt_offset(.offset))]
    MalformedRecord {
        offset: Option<SlotOffset>,
        reason: String,
    },

    /// A payload does not fit into the slot it was meant to overwrite.
    ///
    /// The update coordinator recovers from this by relocating the record.
    #[error("payload of {requested} bytes exceeds capacity {capacity} of slot at {offset}")]
    CapacityExceeded {
        offset: SlotOffset,
        requested: usize,
        capacity: usize,
    },

    /// No live record with this key.
    #[error("key {0} not found")]
    KeyNotFound(i32),

    /// A live record with this key already exists.
    #[error("key {0} already exists")]
    DuplicateKey(i32),

    /// No slot starts at this offset (it lies past the end of the heap file).
    #[error("no slot at {0}")]
    SlotNotFound(SlotOffset),

    /// An index node could not be decoded or violates a tree invariant.
    #[error("corrupt index node at {address}: {reason}")]
    CorruptIndex { address: NodeAddress, reason: String },

    /// The index and the heap file disagree about a key.
    #[error("index entry for key {key} points at {offset}: {reason}")]
    Inconsistent {
        key: i32,
        offset: SlotOffset,
        reason: String,
    },

    /// Every id up to `i32::MAX` has been handed out; auto-assigned inserts
    /// have nowhere to go.
    #[error("record id space exhausted")]
    IdSpaceExhausted,

    /// Invalid configuration or index metadata.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn fmt_offset(offset: &Option<SlotOffset>) -> String {
    match offset {
        Some(offset) => format!(" at {}", offset),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            offset: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(address: NodeAddress, reason: impl Into<String>) -> Self {
        Error::CorruptIndex {
            address,
            reason: reason.into(),
        }
    }

    /// Attach the slot offset to a `MalformedRecord` that doesn't carry one yet.
    pub(crate) fn at_offset(self, at: SlotOffset) -> Self {
        match self {
            Error::MalformedRecord {
                offset: None,
                reason,
            } => Error::MalformedRecord {
                offset: Some(at),
                reason,
            },
            other => other,
        }
    }
}
