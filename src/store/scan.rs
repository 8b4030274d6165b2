//! Sequential heap scans.

use tracing::trace;

use crate::common::{Result, SlotOffset};
use crate::record::{Record, RecordCodec};
use crate::storage::HeapFile;

/// Walks the heap file slot by slot, from the first slot to end-of-file.
///
/// Dead slots are skipped by their declared length without reading or
/// decoding their payload.
pub struct SequentialScanner<'a> {
    heap: &'a mut HeapFile,
}

impl<'a> SequentialScanner<'a> {
    pub fn new(heap: &'a mut HeapFile) -> Self {
        Self { heap }
    }

    /// Visit every live record in file order.
    ///
    /// Returns the number of records visited.
    pub fn scan_all<F>(&mut self, mut visit: F) -> Result<usize>
    where
        F: FnMut(&Record),
    {
        let mut visited = 0;
        self.walk(|record| {
            visit(record);
            visited += 1;
            true
        })?;
        Ok(visited)
    }

    /// Visit live records in file order until one has an id above `target`.
    ///
    /// Returns the record whose id equals `target`, if one was seen before
    /// stopping. Assumes ids ascend through the file, which holds for a
    /// bulk load without relocations; a relocated record sits at the end of
    /// the file and may be missed. The index is the reliable lookup path.
    pub fn scan_until<F>(&mut self, target: i32, mut visit: F) -> Result<Option<Record>>
    where
        F: FnMut(&Record),
    {
        let mut found = None;
        self.walk(|record| {
            if record.id() > target {
                return false;
            }
            visit(record);
            if record.id() == target {
                found = Some(record.clone());
            }
            true
        })?;
        Ok(found)
    }

    /// Decode each live slot and hand it to `step` until it returns `false`
    /// or the file ends.
    fn walk<F>(&mut self, mut step: F) -> Result<()>
    where
        F: FnMut(&Record) -> bool,
    {
        let mut offset = self.heap.first_offset();

        while let Some(header) = self.heap.read_header(offset)? {
            if header.alive {
                let payload = self.heap.read_payload(offset, &header)?;
                let record = RecordCodec::decode(&payload).map_err(|e| e.at_offset(offset))?;
                if !step(&record) {
                    trace!(%offset, id = record.id(), "scan stopped early");
                    return Ok(());
                }
            } else {
                trace!(%offset, id = header.id, "skipping dead slot");
            }
            offset = SlotOffset::new(offset.0 + header.slot_size());
        }
        Ok(())
    }
}
