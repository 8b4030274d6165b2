//! Heap File - framed variable-length records at stable byte offsets.
//!
//! The [`HeapFile`] handles all direct file operations on record data:
//! - Appending framed records
//! - Positional slot reads
//! - Tombstoning and in-place payload overwrites

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::common::config::{FIRST_SLOT_OFFSET, HEAP_HEADER_SIZE};
use crate::common::{Error, Result, SlotOffset};
use crate::storage::slot::{Slot, SlotHeader};

/// Manages I/O for a single heap file.
///
/// # File Layout
/// ```text
/// ┌─────────────┬──────────────────────┬──────────────────────┬─────┐
/// │ last_id (4B)│ Slot @4              │ Slot @4+9+len₀       │ ... │
/// │             │ hdr (9B) │ payload   │ hdr (9B) │ payload   │     │
/// └─────────────┴──────────────────────┴──────────────────────┴─────┘
/// ```
///
/// Slots are only ever appended at end-of-file and never overlap. A slot is
/// destroyed logically by clearing its alive byte; its bytes stay in place.
///
/// # Thread Safety
/// `HeapFile` is **single-threaded**. It owns its file handle exclusively
/// and the handle is closed when the `HeapFile` is dropped, on every exit
/// path.
pub struct HeapFile {
    file: File,
    /// Current end-of-file offset.
    len: u64,
    /// Highest record id ever appended (the file header).
    last_id: i32,
    sync_writes: bool,
}

impl HeapFile {
    /// Create a new heap file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        file.write_all(&0i32.to_be_bytes())?;
        file.sync_all()?;

        info!(path = %path.as_ref().display(), "created heap file");
        Ok(Self {
            file,
            len: HEAP_HEADER_SIZE as u64,
            last_id: 0,
            sync_writes: false,
        })
    }

    /// Open an existing heap file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or is
    /// too short to hold the file header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;

        let len = file.metadata()?.len();
        if len < HEAP_HEADER_SIZE as u64 {
            return Err(Error::InvalidConfig(format!(
                "heap file {} is {} bytes, shorter than its header",
                path.as_ref().display(),
                len
            )));
        }

        let mut buf = [0u8; HEAP_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)?;
        let last_id = i32::from_be_bytes(buf);

        info!(path = %path.as_ref().display(), len, last_id, "opened heap file");
        Ok(Self {
            file,
            len,
            last_id,
            sync_writes: false,
        })
    }

    /// Open an existing heap file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// `fsync` after every mutating write.
    pub fn set_sync_writes(&mut self, sync_writes: bool) {
        self.sync_writes = sync_writes;
    }

    /// Append a slot at end-of-file.
    ///
    /// With `id == None` the slot gets `last_id + 1`. An explicit id larger
    /// than `last_id` raises it, so auto-assigned ids never collide with
    /// explicit ones.
    ///
    /// Returns the offset of the new slot's header.
    pub fn append(&mut self, id: Option<i32>, payload: &[u8]) -> Result<SlotOffset> {
        let length = u32::try_from(payload.len())
            .ok()
            .filter(|&l| l <= i32::MAX as u32)
            .ok_or_else(|| {
                Error::malformed(format!("payload of {} bytes is too large", payload.len()))
            })?;

        let id = match id {
            Some(id) => id,
            None => self.next_id()?,
        };

        let offset = SlotOffset::new(self.len);
        let header = SlotHeader::new(id, length);

        let mut buf = Vec::with_capacity(SlotHeader::SIZE + payload.len());
        buf.extend_from_slice(&header.to_bytes());
        buf.extend_from_slice(payload);

        self.file.seek(SeekFrom::Start(offset.0))?;
        self.file.write_all(&buf)?;
        self.len += buf.len() as u64;

        if id > self.last_id {
            self.last_id = id;
            self.file.seek(SeekFrom::Start(0))?;
            self.file.write_all(&id.to_be_bytes())?;
        }
        self.maybe_sync()?;

        debug!(%offset, id, length, "appended slot");
        Ok(offset)
    }

    /// Read the header of the slot at `offset`.
    ///
    /// Returns `Ok(None)` when `offset` is at or past end-of-file; that is
    /// how every scan terminates.
    ///
    /// # Errors
    /// Returns `Error::MalformedRecord` if the file ends inside the header or
    /// inside the payload it declares.
    pub fn read_header(&mut self, offset: SlotOffset) -> Result<Option<SlotHeader>> {
        if offset.0 >= self.len {
            return Ok(None);
        }
        if offset.0 + SlotHeader::SIZE as u64 > self.len {
            return Err(Error::malformed("file ends inside slot header").at_offset(offset));
        }

        let mut buf = [0u8; SlotHeader::SIZE];
        self.file.seek(SeekFrom::Start(offset.0))?;
        self.file.read_exact(&mut buf)?;
        let header = SlotHeader::from_bytes(&buf);

        if offset.0 + header.slot_size() > self.len {
            return Err(Error::malformed(format!(
                "slot declares {} payload bytes past end-of-file",
                header.length
            ))
            .at_offset(offset));
        }
        Ok(Some(header))
    }

    /// Read the payload of a slot whose header was already read.
    pub fn read_payload(&mut self, offset: SlotOffset, header: &SlotHeader) -> Result<Vec<u8>> {
        let mut payload = vec![0u8; header.length as usize];
        self.file
            .seek(SeekFrom::Start(offset.0 + SlotHeader::SIZE as u64))?;
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Read the whole slot at `offset`: header plus exactly `length` payload bytes.
    ///
    /// Returns `Ok(None)` past the last slot.
    pub fn read_slot(&mut self, offset: SlotOffset) -> Result<Option<Slot>> {
        let Some(header) = self.read_header(offset)? else {
            return Ok(None);
        };
        let payload = self.read_payload(offset, &header)?;
        Ok(Some(Slot {
            offset,
            header,
            payload,
        }))
    }

    /// Declared capacity of the slot at `offset`.
    pub fn capacity(&mut self, offset: SlotOffset) -> Result<usize> {
        let header = self
            .read_header(offset)?
            .ok_or(Error::SlotNotFound(offset))?;
        Ok(header.length as usize)
    }

    /// Tombstone the slot at `offset` with a single-byte write.
    ///
    /// Idempotent: marking a dead slot dead again changes nothing.
    pub fn mark_dead(&mut self, offset: SlotOffset) -> Result<()> {
        if offset.0 + SlotHeader::SIZE as u64 > self.len {
            return Err(Error::SlotNotFound(offset));
        }

        self.file
            .seek(SeekFrom::Start(offset.0 + SlotHeader::OFFSET_ALIVE as u64))?;
        self.file.write_all(&[0u8])?;
        self.maybe_sync()?;

        debug!(%offset, "tombstoned slot");
        Ok(())
    }

    /// Rewrite the payload of the slot at `offset` in place.
    ///
    /// The header, including its length, is left untouched so the slot keeps
    /// its reserved capacity. Bytes between the end of `payload` and the end
    /// of the slot are zeroed.
    ///
    /// # Errors
    /// Returns `Error::CapacityExceeded` if `payload` is longer than the
    /// slot's capacity; nothing is written in that case.
    pub fn overwrite_payload(&mut self, offset: SlotOffset, payload: &[u8]) -> Result<()> {
        let capacity = self.capacity(offset)?;
        if payload.len() > capacity {
            return Err(Error::CapacityExceeded {
                offset,
                requested: payload.len(),
                capacity,
            });
        }

        let mut buf = vec![0u8; capacity];
        buf[..payload.len()].copy_from_slice(payload);

        self.file
            .seek(SeekFrom::Start(offset.0 + SlotHeader::SIZE as u64))?;
        self.file.write_all(&buf)?;
        self.maybe_sync()?;

        debug!(%offset, len = payload.len(), capacity, "overwrote slot payload");
        Ok(())
    }

    /// Highest record id ever appended (0 for an empty file).
    #[inline]
    pub fn last_id(&self) -> i32 {
        self.last_id
    }

    /// Id the next auto-assigned append will get.
    ///
    /// # Errors
    /// Returns `Error::IdSpaceExhausted` once `last_id` is `i32::MAX`.
    #[inline]
    pub fn next_id(&self) -> Result<i32> {
        self.last_id.checked_add(1).ok_or(Error::IdSpaceExhausted)
    }

    /// Offset of the first slot.
    #[inline]
    pub fn first_offset(&self) -> SlotOffset {
        SlotOffset::new(FIRST_SLOT_OFFSET)
    }

    /// Current end-of-file offset (where the next slot will start).
    #[inline]
    pub fn end_offset(&self) -> SlotOffset {
        SlotOffset::new(self.len)
    }

    /// Flush written data to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn maybe_sync(&mut self) -> Result<()> {
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
