//! Update coordination between the heap file and the index.

use tracing::debug;

use crate::common::{Error, Result, SlotOffset};
use crate::index::BTreeIndex;
use crate::record::{Record, RecordCodec};
use crate::storage::HeapFile;

/// How an update was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The new payload fit; the slot was overwritten and the index is unchanged.
    InPlace(SlotOffset),
    /// The new payload didn't fit; the old slot was tombstoned, a new slot
    /// appended, and the index repointed.
    Relocated { from: SlotOffset, to: SlotOffset },
}

impl UpdateOutcome {
    /// Offset the record lives at after the update.
    pub fn offset(&self) -> SlotOffset {
        match *self {
            UpdateOutcome::InPlace(offset) => offset,
            UpdateOutcome::Relocated { to, .. } => to,
        }
    }
}

/// Decides, per update, between overwriting a slot in place and relocating
/// the record to the end of the heap file.
pub struct UpdateCoordinator<'a> {
    heap: &'a mut HeapFile,
    index: &'a mut BTreeIndex,
}

impl<'a> UpdateCoordinator<'a> {
    pub fn new(heap: &'a mut HeapFile, index: &'a mut BTreeIndex) -> Self {
        Self { heap, index }
    }

    /// Replace the record stored under `key` with `record`.
    ///
    /// `record`'s id is set to `key`. After success, `index.search(key)`
    /// resolves to a slot that decodes to `record`; a relocated record's old
    /// slot is dead and unreachable from the index.
    ///
    /// # Errors
    /// Returns `Error::KeyNotFound` if the key is absent from the index or
    /// its slot is tombstoned.
    pub fn update(&mut self, key: i32, mut record: Record) -> Result<UpdateOutcome> {
        record.set_id(key);

        let pointer = self.index.search(key)?.ok_or(Error::KeyNotFound(key))?;
        let header = self
            .heap
            .read_header(pointer)?
            .ok_or(Error::SlotNotFound(pointer))?;
        if !header.alive {
            return Err(Error::KeyNotFound(key));
        }

        let payload = RecordCodec::encode(&record);

        match self.heap.overwrite_payload(pointer, &payload) {
            Ok(()) => {
                debug!(key, offset = %pointer, "updated record in place");
                Ok(UpdateOutcome::InPlace(pointer))
            }
            Err(Error::CapacityExceeded { .. }) => {
                self.heap.mark_dead(pointer)?;
                let new_offset = self.heap.append(Some(key), &payload)?;
                self.index.delete(key)?;
                self.index.insert(key, new_offset)?;

                debug!(key, from = %pointer, to = %new_offset, "relocated record");
                Ok(UpdateOutcome::Relocated {
                    from: pointer,
                    to: new_offset,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexConfig;
    use crate::record::FieldValue;
    use tempfile::tempdir;

    struct Fixture {
        heap: HeapFile,
        index: BTreeIndex,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let heap = HeapFile::create(dir.path().join("test.db")).unwrap();
        let index = BTreeIndex::create(
            dir.path().join("test.idx"),
            IndexConfig::new(2, "test.idx", "test.db"),
        )
        .unwrap();
        Fixture {
            heap,
            index,
            _dir: dir,
        }
    }

    fn text_record(id: i32, text: &str) -> Record {
        Record::new(id, vec![FieldValue::from(text)])
    }

    fn put(f: &mut Fixture, record: &Record) -> SlotOffset {
        let offset = f
            .heap
            .append(Some(record.id()), &RecordCodec::encode(record))
            .unwrap();
        f.index.insert(record.id(), offset).unwrap();
        offset
    }

    fn load(f: &mut Fixture, key: i32) -> Record {
        let offset = f.index.search(key).unwrap().unwrap();
        let slot = f.heap.read_slot(offset).unwrap().unwrap();
        RecordCodec::decode(&slot.payload).unwrap()
    }

    #[test]
    fn test_smaller_payload_updates_in_place() {
        let mut f = fixture();
        let offset = put(&mut f, &text_record(1, "a long original value"));

        let outcome = UpdateCoordinator::new(&mut f.heap, &mut f.index)
            .update(1, text_record(0, "short"))
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::InPlace(offset));
        assert_eq!(f.index.search(1).unwrap(), Some(offset));
        assert_eq!(load(&mut f, 1), text_record(1, "short"));
    }

    #[test]
    fn test_larger_payload_relocates() {
        let mut f = fixture();
        let old = put(&mut f, &text_record(1, "tiny"));
        put(&mut f, &text_record(2, "neighbour"));

        let outcome = UpdateCoordinator::new(&mut f.heap, &mut f.index)
            .update(1, text_record(1, "this no longer fits in the old slot"))
            .unwrap();

        let UpdateOutcome::Relocated { from, to } = outcome else {
            panic!("expected relocation, got {:?}", outcome);
        };
        assert_eq!(from, old);
        assert!(to > old);
        assert!(!f.heap.read_slot(old).unwrap().unwrap().is_alive());
        assert_eq!(f.index.search(1).unwrap(), Some(to));
        assert_eq!(
            load(&mut f, 1),
            text_record(1, "this no longer fits in the old slot")
        );
        assert_eq!(load(&mut f, 2), text_record(2, "neighbour"));
    }

    #[test]
    fn test_update_missing_key() {
        let mut f = fixture();
        let result = UpdateCoordinator::new(&mut f.heap, &mut f.index).update(9, text_record(9, "x"));
        assert!(matches!(result, Err(Error::KeyNotFound(9))));
    }

    #[test]
    fn test_update_tombstoned_slot() {
        let mut f = fixture();
        let offset = put(&mut f, &text_record(1, "value"));
        // Heap tombstone without the index one
        f.heap.mark_dead(offset).unwrap();

        let result = UpdateCoordinator::new(&mut f.heap, &mut f.index).update(1, text_record(1, "v"));
        assert!(matches!(result, Err(Error::KeyNotFound(1))));
    }
}
