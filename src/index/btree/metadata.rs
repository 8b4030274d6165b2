//! Index metadata block.

use crate::common::config::{validate_degree, KEY_LENGTH};
use crate::common::{Error, NodeAddress, Result};

/// Settings fixed when an index is created.
///
/// Constructed once and held by the [`BTreeIndex`](super::BTreeIndex) for
/// its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Minimum degree `t`: non-root nodes hold between `t-1` and `2t-1` keys.
    pub degree: u16,
    /// Name of the index file, recorded for diagnostics.
    pub index_filename: String,
    /// Name of the heap file this index points into.
    pub data_filename: String,
}

impl IndexConfig {
    pub fn new(
        degree: u16,
        index_filename: impl Into<String>,
        data_filename: impl Into<String>,
    ) -> Self {
        Self {
            degree,
            index_filename: index_filename.into(),
            data_filename: data_filename.into(),
        }
    }

    /// Maximum number of keys in a node (`2t - 1`).
    #[inline]
    pub fn max_keys(&self) -> usize {
        2 * self.degree as usize - 1
    }

    /// Minimum number of keys in a non-root node (`t - 1`).
    #[inline]
    pub fn min_keys(&self) -> usize {
        self.degree as usize - 1
    }

    pub fn validate(&self) -> Result<()> {
        validate_degree(self.degree)?;
        for name in [&self.index_filename, &self.data_filename] {
            if name.len() > u16::MAX as usize {
                return Err(Error::InvalidConfig(format!(
                    "file name of {} bytes is too long",
                    name.len()
                )));
            }
        }
        Ok(())
    }
}

/// The metadata block at the start of the index file.
///
/// # Layout (big-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       2     degree (int16)
/// 2       4     key_length (int32)
/// 6       8     root_address (int64)
/// 14      2+n   index_filename (uint16 length + UTF-8)
/// ...     2+m   data_filename (uint16 length + UTF-8)
/// ```
///
/// Written once at creation. Only `root_address` changes afterwards, patched
/// in place when the root splits. The first node starts right after the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    pub config: IndexConfig,
    pub key_length: i32,
    pub root_address: NodeAddress,
}

impl IndexMetadata {
    pub const OFFSET_DEGREE: usize = 0;
    pub const OFFSET_KEY_LENGTH: usize = 2;
    pub const OFFSET_ROOT_ADDRESS: usize = 6;
    pub const OFFSET_NAMES: usize = 14;

    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            key_length: KEY_LENGTH,
            root_address: NodeAddress::INVALID,
        }
    }

    /// Size of the encoded block in bytes.
    pub fn encoded_len(&self) -> usize {
        Self::OFFSET_NAMES
            + 2
            + self.config.index_filename.len()
            + 2
            + self.config.data_filename.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&(self.config.degree as i16).to_be_bytes());
        buf.extend_from_slice(&self.key_length.to_be_bytes());
        buf.extend_from_slice(&self.root_address.to_wire().to_be_bytes());
        for name in [&self.config.index_filename, &self.config.data_filename] {
            buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
            buf.extend_from_slice(name.as_bytes());
        }
        buf
    }

    /// Decode the block from the start of `bytes`.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if the block is truncated, the degree is
    /// out of range, the key length isn't 4, or a name isn't UTF-8.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let short = || Error::InvalidConfig("index metadata block is truncated".into());

        if bytes.len() < Self::OFFSET_NAMES {
            return Err(short());
        }

        let degree = i16::from_be_bytes([bytes[0], bytes[1]]);
        let degree = u16::try_from(degree)
            .map_err(|_| Error::InvalidConfig(format!("negative degree {}", degree)))?;
        validate_degree(degree)?;

        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[Self::OFFSET_KEY_LENGTH..Self::OFFSET_KEY_LENGTH + 4]);
        let key_length = i32::from_be_bytes(raw);
        if key_length != KEY_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "key length {} is not supported (expected {})",
                key_length, KEY_LENGTH
            )));
        }

        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[Self::OFFSET_ROOT_ADDRESS..Self::OFFSET_ROOT_ADDRESS + 8]);
        let root_address = NodeAddress::from_wire(i64::from_be_bytes(raw));

        let mut pos = Self::OFFSET_NAMES;
        let mut names = Vec::with_capacity(2);
        for _ in 0..2 {
            let len_bytes = bytes.get(pos..pos + 2).ok_or_else(short)?;
            let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
            pos += 2;
            let name = bytes.get(pos..pos + len).ok_or_else(short)?;
            let name = String::from_utf8(name.to_vec())
                .map_err(|_| Error::InvalidConfig("index metadata name is not UTF-8".into()))?;
            pos += len;
            names.push(name);
        }
        let data_filename = names.pop().unwrap_or_default();
        let index_filename = names.pop().unwrap_or_default();

        Ok(Self {
            config: IndexConfig {
                degree,
                index_filename,
                data_filename,
            },
            key_length,
            root_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IndexMetadata {
        let mut meta = IndexMetadata::new(IndexConfig::new(3, "records.idx", "records.db"));
        meta.root_address = NodeAddress::new(39);
        meta
    }

    #[test]
    fn test_key_bounds() {
        let config = IndexConfig::new(2, "a", "b");
        assert_eq!(config.max_keys(), 3);
        assert_eq!(config.min_keys(), 1);
    }

    #[test]
    fn test_roundtrip() {
        let meta = sample();
        let bytes = meta.encode();
        assert_eq!(bytes.len(), meta.encoded_len());
        assert_eq!(IndexMetadata::decode(&bytes).unwrap(), meta);
    }

    #[test]
    fn test_layout() {
        let bytes = sample().encode();
        assert_eq!(&bytes[0..2], &[0, 3]);
        assert_eq!(&bytes[2..6], &[0, 0, 0, 4]);
        assert_eq!(&bytes[6..14], &39i64.to_be_bytes());
        assert_eq!(&bytes[14..16], &[0, 11]);
        assert_eq!(&bytes[16..27], b"records.idx");
    }

    #[test]
    fn test_invalid_root_is_minus_one() {
        let meta = IndexMetadata::new(IndexConfig::new(2, "", ""));
        let bytes = meta.encode();
        assert_eq!(&bytes[6..14], &(-1i64).to_be_bytes());
        assert_eq!(
            IndexMetadata::decode(&bytes).unwrap().root_address,
            NodeAddress::INVALID
        );
    }

    #[test]
    fn test_decode_rejects_bad_blocks() {
        let bytes = sample().encode();
        assert!(IndexMetadata::decode(&bytes[..10]).is_err());
        assert!(IndexMetadata::decode(&bytes[..bytes.len() - 1]).is_err());

        let mut bad_degree = bytes.clone();
        bad_degree[1] = 1;
        assert!(IndexMetadata::decode(&bad_degree).is_err());

        let mut bad_key_len = bytes;
        bad_key_len[5] = 8;
        assert!(IndexMetadata::decode(&bad_key_len).is_err());
    }

    #[test]
    fn test_config_validate() {
        assert!(IndexConfig::new(2, "a", "b").validate().is_ok());
        assert!(IndexConfig::new(1, "a", "b").validate().is_err());
        assert!(IndexConfig::new(2, "x".repeat(70_000), "b").validate().is_err());
    }
}
