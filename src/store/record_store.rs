//! The heap file and its primary index behind one handle.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::common::{Error, Result, SlotOffset, StoreConfig};
use crate::index::btree::{IndexShape, LeafEntry};
use crate::index::{BTreeIndex, IndexConfig};
use crate::record::{FieldValue, Record, RecordCodec};
use crate::storage::{HeapFile, Slot};

use super::scan::SequentialScanner;
use super::stats::StoreStats;
use super::update::{UpdateCoordinator, UpdateOutcome};

/// A record store: variable-length records in a heap file, keyed by id
/// through a disk-resident B-tree.
///
/// The store owns both file handles; they are closed when it is dropped.
/// It is a single-writer structure with no internal locking.
///
/// # Example
/// ```no_run
/// use slotdb::{FieldValue, RecordStore, StoreConfig};
///
/// let mut store = RecordStore::open(StoreConfig::new("/tmp/accidents")).unwrap();
/// let id = store
///     .insert(vec![FieldValue::from("BR-116"), FieldValue::from(3)])
///     .unwrap();
/// let record = store.get(id).unwrap().unwrap();
/// assert_eq!(record.field(0), Some(&FieldValue::from("BR-116")));
/// ```
pub struct RecordStore {
    heap: HeapFile,
    index: BTreeIndex,
    config: StoreConfig,
    stats: StoreStats,
}

impl RecordStore {
    /// Open the store described by `config`, creating missing files.
    ///
    /// An existing index keeps its persisted degree. If the heap file has
    /// records but the index file is missing, the index is rebuilt from the
    /// live slots.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let index_existed = config.index_path.exists();
        let mut heap = HeapFile::open_or_create(&config.data_path)?;

        let index_config = IndexConfig::new(
            config.degree,
            file_name(&config.index_path),
            file_name(&config.data_path),
        );
        let mut index = BTreeIndex::open_or_create(&config.index_path, index_config.clone())?;

        if index.config().data_filename != index_config.data_filename {
            warn!(
                recorded = %index.config().data_filename,
                actual = %index_config.data_filename,
                "index was built for a different data file"
            );
        }
        if index.degree() != config.degree {
            debug!(
                persisted = index.degree(),
                requested = config.degree,
                "using persisted index degree"
            );
        }

        heap.set_sync_writes(config.sync_writes);
        index.set_sync_writes(config.sync_writes);

        let mut store = Self {
            heap,
            index,
            config,
            stats: StoreStats::default(),
        };

        if !index_existed && store.heap.end_offset() > store.heap.first_offset() {
            store.rebuild_index()?;
        }
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Degree of the open index (the persisted one, not necessarily
    /// `config().degree`).
    pub fn degree(&self) -> u16 {
        self.index.degree()
    }

    /// Highest record id ever appended.
    pub fn last_id(&self) -> i32 {
        self.heap.last_id()
    }

    /// Size of the heap file in bytes.
    pub fn data_len(&self) -> u64 {
        self.heap.end_offset().0
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Append a record with an auto-assigned id and index it.
    ///
    /// Returns the new id.
    ///
    /// # Errors
    /// Returns `Error::IdSpaceExhausted` once an id of `i32::MAX` exists.
    pub fn insert(&mut self, fields: Vec<FieldValue>) -> Result<i32> {
        let record = Record::new(self.heap.next_id()?, fields);
        let id = record.id();
        self.insert_record(&record)?;
        Ok(id)
    }

    /// Append a record under its own id and index it.
    ///
    /// A tombstoned id may be reused; the index entry is revived.
    ///
    /// # Errors
    /// Returns `Error::DuplicateKey` if a live record already has this id.
    pub fn insert_record(&mut self, record: &Record) -> Result<SlotOffset> {
        let id = record.id();
        if self.index.search(id)?.is_some() {
            return Err(Error::DuplicateKey(id));
        }

        let offset = self.heap.append(Some(id), &RecordCodec::encode(record))?;
        self.index.insert(id, offset)?;
        self.stats.inserts += 1;

        debug!(id, %offset, "inserted record");
        Ok(offset)
    }

    /// Fetch the live record with this key through the index.
    pub fn get(&mut self, key: i32) -> Result<Option<Record>> {
        let Some(offset) = self.index.search(key)? else {
            return Ok(None);
        };
        let slot = self.heap.read_slot(offset)?.ok_or(Error::SlotNotFound(offset))?;
        if !slot.is_alive() {
            warn!(key, %offset, "index entry points at a dead slot");
            return Ok(None);
        }
        RecordCodec::decode(&slot.payload)
            .map(Some)
            .map_err(|e| e.at_offset(offset))
    }

    /// Offset of the live slot holding `key`, if any.
    pub fn locate(&mut self, key: i32) -> Result<Option<SlotOffset>> {
        self.index.search(key)
    }

    /// Replace the fields of the record stored under `key`.
    ///
    /// # Errors
    /// Returns `Error::KeyNotFound` if there is no live record with this key.
    pub fn update(&mut self, key: i32, fields: Vec<FieldValue>) -> Result<UpdateOutcome> {
        let outcome =
            UpdateCoordinator::new(&mut self.heap, &mut self.index).update(key, Record::new(key, fields))?;

        match outcome {
            UpdateOutcome::InPlace(_) => self.stats.updates_in_place += 1,
            UpdateOutcome::Relocated { .. } => self.stats.relocations += 1,
        }
        Ok(outcome)
    }

    /// Tombstone the record stored under `key`, in the heap and in the index.
    ///
    /// # Errors
    /// Returns `Error::KeyNotFound` if there is no live record with this key.
    pub fn delete(&mut self, key: i32) -> Result<()> {
        let offset = self.index.search(key)?.ok_or(Error::KeyNotFound(key))?;

        self.heap.mark_dead(offset)?;
        self.index.delete(key)?;
        self.stats.deletes += 1;

        debug!(key, %offset, "deleted record");
        Ok(())
    }

    /// Append every row with an auto-assigned id.
    ///
    /// Returns the number of records loaded. Stops at the first error; rows
    /// loaded before it stay in the store.
    pub fn bulk_load<I>(&mut self, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = Vec<FieldValue>>,
    {
        let mut loaded = 0;
        for fields in rows {
            self.insert(fields)?;
            loaded += 1;
        }
        info!(loaded, last_id = self.heap.last_id(), "bulk load finished");
        Ok(loaded)
    }

    // ========================================================================
    // Scans
    // ========================================================================

    /// Visit every live record in file order. Returns the number visited.
    pub fn scan_all<F>(&mut self, visit: F) -> Result<usize>
    where
        F: FnMut(&Record),
    {
        SequentialScanner::new(&mut self.heap).scan_all(visit)
    }

    /// Visit live records in file order until one has an id above `key`.
    ///
    /// See [`SequentialScanner::scan_until`] for why this can miss records.
    pub fn scan_until<F>(&mut self, key: i32, visit: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record),
    {
        SequentialScanner::new(&mut self.heap).scan_until(key, visit)
    }

    /// Look a record up without the index.
    pub fn find_by_scan(&mut self, key: i32) -> Result<Option<Record>> {
        self.scan_until(key, |_| {})
    }

    /// Visit every live record in ascending key order, following the index
    /// leaf chain. Returns the number visited.
    pub fn scan_ordered<F>(&mut self, mut visit: F) -> Result<usize>
    where
        F: FnMut(&Record),
    {
        let mut visited = 0;
        for entry in self.index.entries()? {
            let (key, offset) = entry?;
            let slot = self.heap.read_slot(offset)?.ok_or(Error::SlotNotFound(offset))?;
            if !slot.is_alive() {
                warn!(key, %offset, "index entry points at a dead slot");
                continue;
            }
            let record = RecordCodec::decode(&slot.payload).map_err(|e| e.at_offset(offset))?;
            visit(&record);
            visited += 1;
        }
        Ok(visited)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Raw slot at `offset`, live or dead.
    pub fn slot_at(&mut self, offset: SlotOffset) -> Result<Option<Slot>> {
        self.heap.read_slot(offset)
    }

    /// Raw index entry for `key`, live or tombstoned.
    pub fn index_entry(&mut self, key: i32) -> Result<Option<LeafEntry>> {
        self.index.lookup_entry(key)
    }

    /// Check the index invariants, then check that every live index entry
    /// points at a live slot carrying the same id.
    ///
    /// # Errors
    /// Returns `Error::CorruptIndex` for a broken tree and
    /// `Error::Inconsistent` for an entry the heap disagrees with.
    pub fn validate(&mut self) -> Result<IndexShape> {
        let shape = self.index.validate()?;

        for entry in self.index.entries()? {
            let (key, offset) = entry?;
            let header = self
                .heap
                .read_header(offset)?
                .ok_or_else(|| inconsistent(key, offset, "past end of heap file"))?;
            if !header.alive {
                return Err(inconsistent(key, offset, "slot is dead"));
            }
            if header.id != key {
                return Err(inconsistent(
                    key,
                    offset,
                    format!("slot holds id {}", header.id),
                ));
            }
        }

        debug!(?shape, "store validated");
        Ok(shape)
    }

    /// Flush both files to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.heap.sync()?;
        self.index.sync()
    }

    /// Index every live slot, in file order.
    fn rebuild_index(&mut self) -> Result<()> {
        let mut offset = self.heap.first_offset();
        let mut indexed = 0usize;

        while let Some(header) = self.heap.read_header(offset)? {
            if header.alive {
                self.index.insert(header.id, offset)?;
                indexed += 1;
            }
            offset = SlotOffset::new(offset.0 + header.slot_size());
        }

        info!(indexed, "rebuilt index from heap file");
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn inconsistent(key: i32, offset: SlotOffset, reason: impl Into<String>) -> Error {
    Error::Inconsistent {
        key,
        offset,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path, degree: u16) -> RecordStore {
        RecordStore::open(StoreConfig::new(dir).with_degree(degree)).unwrap()
    }

    fn fields(text: &str, count: i32) -> Vec<FieldValue> {
        vec![FieldValue::from(text), FieldValue::from(count)]
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);

        assert_eq!(store.insert(fields("a", 1)).unwrap(), 1);
        assert_eq!(store.insert(fields("b", 2)).unwrap(), 2);
        assert_eq!(store.insert(fields("c", 3)).unwrap(), 3);
        assert_eq!(store.last_id(), 3);
        assert_eq!(store.stats().inserts, 3);

        let record = store.get(2).unwrap().unwrap();
        assert_eq!(record, Record::new(2, fields("b", 2)));
    }

    #[test]
    fn test_insert_record_rejects_live_duplicate() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);

        store.insert_record(&Record::new(10, fields("x", 0))).unwrap();
        let result = store.insert_record(&Record::new(10, fields("y", 0)));
        assert!(matches!(result, Err(Error::DuplicateKey(10))));

        // Auto ids continue past the explicit one
        assert_eq!(store.insert(fields("z", 0)).unwrap(), 11);
    }

    #[test]
    fn test_insert_after_max_id_is_an_error() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);

        store.insert_record(&Record::new(i32::MAX, fields("top", 0))).unwrap();
        let result = store.insert(fields("next", 1));

        assert!(matches!(result, Err(Error::IdSpaceExhausted)));
        assert_eq!(store.stats().inserts, 1);
        assert_eq!(store.scan_all(|_| {}).unwrap(), 1);
        store.validate().unwrap();
    }

    #[test]
    fn test_insert_record_reuses_deleted_id() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);

        store.insert(fields("first", 1)).unwrap();
        store.delete(1).unwrap();
        let offset = store.insert_record(&Record::new(1, fields("second", 2))).unwrap();

        assert_eq!(store.locate(1).unwrap(), Some(offset));
        assert_eq!(store.get(1).unwrap(), Some(Record::new(1, fields("second", 2))));
    }

    #[test]
    fn test_get_missing_key() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);
        assert_eq!(store.get(1).unwrap(), None);
    }

    #[test]
    fn test_update_counts_outcomes() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);
        let id = store.insert(fields("medium length", 1)).unwrap();

        let outcome = store.update(id, fields("short", 2)).unwrap();
        assert!(matches!(outcome, UpdateOutcome::InPlace(_)));

        let outcome = store
            .update(id, fields("a considerably longer value than before", 3))
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Relocated { .. }));

        let stats = store.stats();
        assert_eq!(stats.updates_in_place, 1);
        assert_eq!(stats.relocations, 1);
        assert_eq!(
            store.get(id).unwrap(),
            Some(Record::new(id, fields("a considerably longer value than before", 3)))
        );
    }

    #[test]
    fn test_update_and_delete_missing_key() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);

        assert!(matches!(store.update(7, fields("x", 0)), Err(Error::KeyNotFound(7))));
        assert!(matches!(store.delete(7), Err(Error::KeyNotFound(7))));
    }

    #[test]
    fn test_delete_tombstones_both_sides() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);
        let id = store.insert(fields("gone", 0)).unwrap();
        let offset = store.locate(id).unwrap().unwrap();

        store.delete(id).unwrap();

        assert_eq!(store.get(id).unwrap(), None);
        assert!(!store.slot_at(offset).unwrap().unwrap().is_alive());
        let entry = store.index_entry(id).unwrap().unwrap();
        assert!(!entry.alive);
        assert_eq!(entry.pointer, offset);
        assert!(matches!(store.delete(id), Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_scan_ordered_follows_keys_not_file_order() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);
        for id in [5, 1, 4, 2, 3] {
            store.insert_record(&Record::new(id, fields("v", id))).unwrap();
        }

        let mut file_order = Vec::new();
        store.scan_all(|r| file_order.push(r.id())).unwrap();
        assert_eq!(file_order, vec![5, 1, 4, 2, 3]);

        let mut key_order = Vec::new();
        let visited = store.scan_ordered(|r| key_order.push(r.id())).unwrap();
        assert_eq!(visited, 5);
        assert_eq!(key_order, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_find_by_scan() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);
        store.bulk_load((0..10).map(|i| fields("row", i))).unwrap();

        let found = store.find_by_scan(7).unwrap().unwrap();
        assert_eq!(found.id(), 7);
        assert_eq!(store.find_by_scan(42).unwrap(), None);
    }

    #[test]
    fn test_bulk_load_then_validate() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);

        let loaded = store.bulk_load((0..50).map(|i| fields("row", i))).unwrap();
        assert_eq!(loaded, 50);
        store.delete(10).unwrap();
        store.update(20, fields("grown well beyond its original size", 0)).unwrap();

        let shape = store.validate().unwrap();
        assert_eq!(shape.live_entries, 49);
        assert_eq!(shape.dead_entries, 1);
        assert!(shape.height > 1);
    }

    #[test]
    fn test_validate_detects_heap_tombstone_without_index_tombstone() {
        let dir = tempdir().unwrap();
        let mut store = open_store(dir.path(), 2);
        let id = store.insert(fields("x", 0)).unwrap();
        let offset = store.locate(id).unwrap().unwrap();

        store.heap.mark_dead(offset).unwrap();

        assert!(matches!(
            store.validate(),
            Err(Error::Inconsistent { key: 1, .. })
        ));
    }

    #[test]
    fn test_reopen_keeps_records_and_degree() {
        let dir = tempdir().unwrap();
        {
            let mut store = open_store(dir.path(), 3);
            store.bulk_load((0..20).map(|i| fields("row", i))).unwrap();
            store.delete(4).unwrap();
            store.sync().unwrap();
        }

        let mut store = open_store(dir.path(), 8);
        assert_eq!(store.degree(), 3);
        assert_eq!(store.last_id(), 20);
        assert_eq!(store.get(4).unwrap(), None);
        assert_eq!(store.get(5).unwrap().unwrap().id(), 5);
        assert_eq!(store.insert(fields("next", 0)).unwrap(), 21);
    }

    #[test]
    fn test_missing_index_is_rebuilt() {
        let dir = tempdir().unwrap();
        {
            let mut store = open_store(dir.path(), 2);
            store.bulk_load((0..12).map(|i| fields("row", i))).unwrap();
            store.delete(3).unwrap();
            store.update(6, fields("relocated to the end of the file", 0)).unwrap();
        }
        std::fs::remove_file(dir.path().join("records.idx")).unwrap();

        let mut store = open_store(dir.path(), 2);
        assert_eq!(store.get(3).unwrap(), None);
        assert_eq!(
            store.get(6).unwrap(),
            Some(Record::new(6, fields("relocated to the end of the file", 0)))
        );
        assert_eq!(store.validate().unwrap().live_entries, 11);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        let result = RecordStore::open(StoreConfig::new(dir.path()).with_degree(1));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
