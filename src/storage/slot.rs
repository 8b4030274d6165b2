//! Slot header and slot types.
//!
//! Every record in the heap file is framed by a [`SlotHeader`]:
//! - the record id
//! - the tombstone flag
//! - the declared payload length (the slot's capacity)

use crate::common::config::SLOT_HEADER_SIZE;
use crate::common::SlotOffset;

/// Metadata stored in front of every slot payload.
///
/// # Layout (9 bytes, big-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     id (int32)
/// 4       1     alive (bool)
/// 5       4     length (int32)
/// ```
///
/// # Length
/// `length` is the slot's capacity, fixed when the slot is appended. An
/// in-place overwrite with a shorter payload leaves it unchanged, so the
/// slot keeps its reserved size and a scan can always skip `length` bytes
/// to reach the next header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHeader {
    pub id: i32,
    pub alive: bool,
    pub length: u32,
}

impl SlotHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = SLOT_HEADER_SIZE;

    /// Offset of each field within the header.
    pub const OFFSET_ID: usize = 0;
    pub const OFFSET_ALIVE: usize = 4;
    pub const OFFSET_LENGTH: usize = 5;

    /// Header for a freshly appended live slot.
    pub fn new(id: i32, length: u32) -> Self {
        Self {
            id,
            alive: true,
            length,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// Any non-zero alive byte counts as alive.
    ///
    /// # Panics
    /// Panics if `data.len() < SlotHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for SlotHeader");

        let id = i32::from_be_bytes([
            data[Self::OFFSET_ID],
            data[Self::OFFSET_ID + 1],
            data[Self::OFFSET_ID + 2],
            data[Self::OFFSET_ID + 3],
        ]);

        let alive = data[Self::OFFSET_ALIVE] != 0;

        let length = u32::from_be_bytes([
            data[Self::OFFSET_LENGTH],
            data[Self::OFFSET_LENGTH + 1],
            data[Self::OFFSET_LENGTH + 2],
            data[Self::OFFSET_LENGTH + 3],
        ]);

        Self { id, alive, length }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < SlotHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for SlotHeader");

        data[Self::OFFSET_ID..Self::OFFSET_ID + 4].copy_from_slice(&self.id.to_be_bytes());
        data[Self::OFFSET_ALIVE] = self.alive as u8;
        data[Self::OFFSET_LENGTH..Self::OFFSET_LENGTH + 4]
            .copy_from_slice(&self.length.to_be_bytes());
    }

    pub fn to_bytes(&self) -> [u8; SLOT_HEADER_SIZE] {
        let mut buf = [0u8; SLOT_HEADER_SIZE];
        self.write_to(&mut buf);
        buf
    }

    /// Total bytes the slot occupies on disk: header plus capacity.
    #[inline]
    pub fn slot_size(&self) -> u64 {
        Self::SIZE as u64 + self.length as u64
    }
}

/// A slot read back from the heap file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub offset: SlotOffset,
    pub header: SlotHeader,
    /// All `header.length` bytes, including any padding after the record.
    pub payload: Vec<u8>,
}

impl Slot {
    #[inline]
    pub fn id(&self) -> i32 {
        self.header.id
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.header.alive
    }

    /// Declared capacity of the slot in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.header.length as usize
    }

    /// Offset of the slot that follows this one.
    #[inline]
    pub fn next_offset(&self) -> SlotOffset {
        SlotOffset::new(self.offset.0 + self.header.slot_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(SlotHeader::SIZE, 9);
    }

    #[test]
    fn test_header_layout() {
        let header = SlotHeader::new(0x0A0B0C0D, 300);
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x0A, 0x0B, 0x0C, 0x0D, 1, 0, 0, 1, 44]);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = SlotHeader {
            id: -5,
            alive: false,
            length: 77,
        };
        assert_eq!(SlotHeader::from_bytes(&header.to_bytes()), header);
    }

    #[test]
    fn test_any_nonzero_alive_byte_is_alive() {
        let mut bytes = SlotHeader::new(1, 1).to_bytes();
        bytes[SlotHeader::OFFSET_ALIVE] = 0x7F;
        assert!(SlotHeader::from_bytes(&bytes).alive);
    }

    #[test]
    #[should_panic(expected = "buffer too small")]
    fn test_from_short_buffer_panics() {
        SlotHeader::from_bytes(&[0u8; 4]);
    }

    #[test]
    fn test_next_offset() {
        let slot = Slot {
            offset: SlotOffset::new(4),
            header: SlotHeader::new(1, 20),
            payload: vec![0; 20],
        };
        assert_eq!(slot.next_offset(), SlotOffset::new(4 + 9 + 20));
    }
}
