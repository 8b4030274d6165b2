//! Configuration for slotdb.
//!
//! On-disk layout constants live here next to [`StoreConfig`], the runtime
//! settings a [`RecordStore`](crate::store::RecordStore) is opened with.

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Size of the heap file header in bytes.
///
/// The header holds a single big-endian `int32`: the highest record id ever
/// appended. Slots start immediately after it.
pub const HEAP_HEADER_SIZE: usize = 4;

/// Offset of the first slot in the heap file.
pub const FIRST_SLOT_OFFSET: u64 = HEAP_HEADER_SIZE as u64;

/// Size of a slot header in bytes: `id:int32, alive:bool, length:int32`.
pub const SLOT_HEADER_SIZE: usize = 9;

/// Size of an index key in bytes (keys are `int32`).
pub const KEY_LENGTH: i32 = 4;

/// Smallest allowed B-tree minimum degree.
pub const MIN_DEGREE: u16 = 2;

/// Largest allowed B-tree minimum degree.
///
/// Keeps a single node well below 64KB.
pub const MAX_DEGREE: u16 = 1024;

/// Minimum degree used when a new index is created without an explicit one.
pub const DEFAULT_DEGREE: u16 = 16;

/// Default file names inside a store directory.
pub const DEFAULT_DATA_FILE: &str = "records.db";
pub const DEFAULT_INDEX_FILE: &str = "records.idx";

/// Check that `degree` is a usable B-tree minimum degree.
pub fn validate_degree(degree: u16) -> Result<()> {
    if (MIN_DEGREE..=MAX_DEGREE).contains(&degree) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "degree {} outside [{}, {}]",
            degree, MIN_DEGREE, MAX_DEGREE
        )))
    }
}

/// Runtime settings for opening a record store.
///
/// # Example
/// ```
/// use slotdb::StoreConfig;
///
/// let config = StoreConfig::new("/tmp/accidents").with_degree(4);
/// assert!(config.data_path.ends_with("records.db"));
/// assert_eq!(config.degree, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path of the heap file.
    pub data_path: PathBuf,
    /// Path of the B-tree index file.
    pub index_path: PathBuf,
    /// Minimum degree for a newly created index. Ignored when the index
    /// already exists; the persisted degree wins.
    pub degree: u16,
    /// `fsync` after every mutating write.
    pub sync_writes: bool,
}

impl StoreConfig {
    /// Settings for a store whose files live in `dir` under the default names.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            data_path: dir.join(DEFAULT_DATA_FILE),
            index_path: dir.join(DEFAULT_INDEX_FILE),
            degree: DEFAULT_DEGREE,
            sync_writes: false,
        }
    }

    /// Settings with explicit file paths.
    pub fn with_paths<P: Into<PathBuf>, Q: Into<PathBuf>>(data_path: P, index_path: Q) -> Self {
        Self {
            data_path: data_path.into(),
            index_path: index_path.into(),
            degree: DEFAULT_DEGREE,
            sync_writes: false,
        }
    }

    pub fn with_degree(mut self, degree: u16) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_degree(self.degree)?;
        if self.data_path == self.index_path {
            return Err(Error::InvalidConfig(
                "data and index must be different files".into(),
            ));
        }
        Ok(())
    }
}
