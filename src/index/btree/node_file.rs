//! Node File - offset-addressed persistence for B-tree nodes.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::common::{Error, NodeAddress, Result};

use super::metadata::{IndexConfig, IndexMetadata};
use super::node::BTreeNode;

/// Manages I/O for a single index file.
///
/// # File Layout
/// ```text
/// ┌────────────────┬──────────┬──────────┬─────┬──────────┐
/// │ Metadata block │ Node     │ Node     │ ... │ Node     │
/// │ (variable)     │ (fixed)  │ (fixed)  │     │ (fixed)  │
/// └────────────────┴──────────┴──────────┴─────┴──────────┘
/// ```
///
/// A node's address is its byte offset. Node `k` (0-based, in allocation
/// order) sits at `metadata_len + k × node_size`.
///
/// # Node lifecycle
/// `allocate_leaf`/`allocate_internal` assign the next address and persist a node
/// there; `write_node` then rewrites it in place any number of times. Nodes
/// are never freed.
pub struct NodeFile {
    file: File,
    metadata: IndexMetadata,
    /// Size of the metadata block; address of the first node.
    metadata_len: u64,
    /// Fixed size of every node region.
    node_size: u64,
    /// Current end-of-file offset.
    len: u64,
    sync_writes: bool,
}

impl NodeFile {
    /// Create a new index file with an empty leaf as root.
    ///
    /// # Errors
    /// Returns an error if the file already exists or `config` is invalid.
    pub fn create<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        config.validate()?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        let metadata = IndexMetadata::new(config);
        let metadata_len = metadata.encoded_len() as u64;
        let node_size = BTreeNode::disk_size(metadata.config.degree) as u64;

        let mut nodes = Self {
            file,
            metadata,
            metadata_len,
            node_size,
            len: metadata_len,
            sync_writes: false,
        };

        // Root address is patched below once the root exists
        nodes.file.write_all(&nodes.metadata.encode())?;
        let root = nodes.allocate_leaf()?;
        nodes.set_root(root.address)?;
        nodes.file.sync_all()?;

        info!(
            path = %path.as_ref().display(),
            degree = nodes.metadata.config.degree,
            "created index file"
        );
        Ok(nodes)
    }

    /// Open an existing index file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or its metadata block is
    /// invalid.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let len = file.metadata()?.len();

        // The block is variable-length; read a prefix big enough for any block.
        let prefix_len = len.min(IndexMetadata::OFFSET_NAMES as u64 + 2 * (2 + u16::MAX as u64));
        let mut prefix = vec![0u8; prefix_len as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut prefix)?;

        let metadata = IndexMetadata::decode(&prefix)?;
        let metadata_len = metadata.encoded_len() as u64;
        let node_size = BTreeNode::disk_size(metadata.config.degree) as u64;

        if !metadata.root_address.is_valid()
            || metadata.root_address.0 < metadata_len
            || metadata.root_address.0 + node_size > len
        {
            return Err(Error::InvalidConfig(format!(
                "root address {} outside index file of {} bytes",
                metadata.root_address, len
            )));
        }

        info!(
            path = %path.as_ref().display(),
            degree = metadata.config.degree,
            root = %metadata.root_address,
            "opened index file"
        );
        Ok(Self {
            file,
            metadata,
            metadata_len,
            node_size,
            len,
            sync_writes: false,
        })
    }

    /// Open an existing index file, or create it with `config` if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path, config)
        }
    }

    pub fn set_sync_writes(&mut self, sync_writes: bool) {
        self.sync_writes = sync_writes;
    }

    #[inline]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    #[inline]
    pub fn config(&self) -> &IndexConfig {
        &self.metadata.config
    }

    #[inline]
    pub fn degree(&self) -> u16 {
        self.metadata.config.degree
    }

    #[inline]
    pub fn root_address(&self) -> NodeAddress {
        self.metadata.root_address
    }

    /// Number of nodes ever allocated.
    pub fn node_count(&self) -> u64 {
        (self.len - self.metadata_len) / self.node_size
    }

    /// Point the metadata block at a new root.
    pub fn set_root(&mut self, address: NodeAddress) -> Result<()> {
        self.check_address(address)?;

        self.file
            .seek(SeekFrom::Start(IndexMetadata::OFFSET_ROOT_ADDRESS as u64))?;
        self.file.write_all(&address.to_wire().to_be_bytes())?;
        self.maybe_sync()?;

        self.metadata.root_address = address;
        Ok(())
    }

    /// Read the node at `address`.
    ///
    /// # Errors
    /// Returns `Error::CorruptIndex` if `address` isn't a node boundary
    /// inside the file or the node doesn't decode.
    pub fn read_node(&mut self, address: NodeAddress) -> Result<BTreeNode> {
        self.check_address(address)?;

        let mut buf = vec![0u8; self.node_size as usize];
        self.file.seek(SeekFrom::Start(address.0))?;
        self.file.read_exact(&mut buf)?;

        BTreeNode::decode(address, &buf, self.degree())
    }

    /// Write `node` back to its own address.
    pub fn write_node(&mut self, node: &BTreeNode) -> Result<()> {
        self.check_address(node.address)?;

        let buf = node.encode(self.degree())?;
        self.file.seek(SeekFrom::Start(node.address.0))?;
        self.file.write_all(&buf)?;
        self.maybe_sync()?;

        Ok(())
    }

    /// Allocate and persist a new empty leaf at end-of-file.
    pub fn allocate_leaf(&mut self) -> Result<BTreeNode> {
        let node = BTreeNode::new_leaf(NodeAddress::new(self.len));
        self.append(&node)?;
        Ok(node)
    }

    /// Allocate and persist a new internal node with a single child.
    pub fn allocate_internal(&mut self, first_child: NodeAddress) -> Result<BTreeNode> {
        let node = BTreeNode::new_internal(NodeAddress::new(self.len), first_child);
        self.append(&node)?;
        Ok(node)
    }

    /// Flush written data to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn append(&mut self, node: &BTreeNode) -> Result<()> {
        let buf = node.encode(self.degree())?;
        self.file.seek(SeekFrom::Start(node.address.0))?;
        self.file.write_all(&buf)?;
        self.len += self.node_size;
        self.maybe_sync()?;

        debug!(address = %node.address, leaf = node.is_leaf(), "allocated index node");
        Ok(())
    }

    fn check_address(&self, address: NodeAddress) -> Result<()> {
        let in_range = address.is_valid()
            && address.0 >= self.metadata_len
            && address.0 + self.node_size <= self.len;
        if in_range && (address.0 - self.metadata_len) % self.node_size == 0 {
            Ok(())
        } else {
            Err(Error::corrupt(address, "not a node address in this index file"))
        }
    }

    fn maybe_sync(&mut self) -> Result<()> {
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
