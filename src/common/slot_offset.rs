//! Heap-file slot offset type.

use std::fmt;

/// Byte offset of a slot header within the heap file.
///
/// Offsets are stable for the lifetime of a slot: slots are never moved or
/// compacted, only tombstoned. On disk an offset is an `int64`, with `-1`
/// standing for "no slot".
///
/// # Example
/// ```
/// use slotdb::SlotOffset;
///
/// let offset = SlotOffset::new(4);
/// assert!(offset.is_valid());
/// assert_eq!(SlotOffset::from_wire(-1), SlotOffset::INVALID);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotOffset(pub u64);

impl SlotOffset {
    /// Invalid/sentinel offset.
    pub const INVALID: SlotOffset = SlotOffset(u64::MAX);

    /// Create a new SlotOffset.
    #[inline]
    pub fn new(offset: u64) -> Self {
        SlotOffset(offset)
    }

    /// Check if this offset is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Encode as the signed on-disk representation.
    #[inline]
    pub fn to_wire(self) -> i64 {
        if self.is_valid() {
            self.0 as i64
        } else {
            -1
        }
    }

    /// Decode from the signed on-disk representation.
    #[inline]
    pub fn from_wire(raw: i64) -> Self {
        if raw < 0 {
            Self::INVALID
        } else {
            SlotOffset(raw as u64)
        }
    }
}

impl fmt::Display for SlotOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Slot(INVALID)")
        } else {
            write!(f, "Slot({})", self.0)
        }
    }
}
