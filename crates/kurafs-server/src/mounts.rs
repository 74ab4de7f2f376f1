//! The shared mount table and its access capabilities.
//!
//! One fixed-capacity table exists per system; the designated root instance
//! allocates it and is its sole writer. Every other instance registers its
//! own mount by messaging the root instance, never by touching the table.
//! That asymmetry is modeled as two types: a cloneable read handle
//! ([`MountStore`]) and a unique write capability ([`MountWriter`]) created
//! together with the store and handed to the root instance at construction.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::info;

use kurafs_types::{
    FileSystemMount, FsError, FsResult, MountOptions, ProcessId, ResultCode, MOUNT_PATH_MAX,
    MOUNT_TABLE_SIZE,
};

/// The fixed-capacity table of active mounts. A record with an empty path
/// is a free slot.
pub struct MountTable {
    records: [FileSystemMount; MOUNT_TABLE_SIZE],
}

impl MountTable {
    pub fn new() -> Self {
        Self {
            records: std::array::from_fn(|_| FileSystemMount::empty()),
        }
    }

    /// All records, free slots included.
    pub fn records(&self) -> &[FileSystemMount] {
        &self.records
    }

    /// Number of active mounts.
    pub fn active(&self) -> usize {
        self.records.iter().filter(|r| !r.is_free()).count()
    }

    /// Register a mount. An identical path is a remount: the owner is
    /// overwritten and no second slot is consumed. Otherwise the first free
    /// slot is claimed; a full table is an I/O error.
    pub fn register(&mut self, path: &str, owner: ProcessId) -> FsResult<()> {
        if path.is_empty() || path.len() > MOUNT_PATH_MAX {
            return Err(FsError::InvalidArgument);
        }

        if let Some(record) = self.records.iter_mut().find(|r| r.path == path) {
            record.owner = owner;
            record.options = MountOptions::empty();
            info!(path, %owner, "remounted");
            return Ok(());
        }

        match self.records.iter_mut().find(|r| r.is_free()) {
            Some(slot) => {
                slot.path = path.to_string();
                slot.owner = owner;
                slot.options = MountOptions::empty();
                info!(path, %owner, "mounted");
                Ok(())
            }
            None => Err(FsError::IoError),
        }
    }

    /// The active record whose path is the longest prefix of `path`, with
    /// the matched prefix length. The comparison ignores ASCII case; ties
    /// cannot occur because paths are unique.
    pub fn longest_match(&self, path: &str) -> Option<(&FileSystemMount, usize)> {
        let mut best: Option<(&FileSystemMount, usize)> = None;
        for record in self.records.iter().filter(|r| !r.is_free()) {
            let len = record.path.len();
            if best.is_some_and(|(_, best_len)| len <= best_len) {
                continue;
            }
            if path.len() >= len
                && path.as_bytes()[..len].eq_ignore_ascii_case(record.path.as_bytes())
            {
                best = Some((record, len));
            }
        }
        best
    }

    /// Release every slot.
    pub fn reset(&mut self) {
        for record in &mut self.records {
            *record = FileSystemMount::empty();
        }
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable read handle to the shared mount table.
#[derive(Clone)]
pub struct MountStore {
    table: Arc<RwLock<MountTable>>,
}

impl MountStore {
    /// Allocate the shared table, returning the read handle and the unique
    /// write capability for the root instance.
    pub fn new() -> (MountStore, MountWriter) {
        let store = MountStore {
            table: Arc::new(RwLock::new(MountTable::new())),
        };
        let writer = MountWriter {
            store: store.clone(),
        };
        (store, writer)
    }

    /// Owner and matched prefix length of the most specific mount covering
    /// `path`, if any.
    pub fn longest_match(&self, path: &str) -> Option<(ProcessId, usize)> {
        let table = self.table.read().ok()?;
        table
            .longest_match(path)
            .map(|(record, len)| (record.owner, len))
    }

    /// Copy of the full table, free slots included.
    pub fn snapshot(&self) -> FsResult<Vec<FileSystemMount>> {
        let table = self.table.read().map_err(|_| FsError::IoError)?;
        Ok(table.records().to_vec())
    }

    /// Number of active mounts.
    pub fn active(&self) -> usize {
        self.table.read().map(|t| t.active()).unwrap_or(0)
    }
}

/// Unique write capability over the shared mount table, held by the root
/// instance only.
pub struct MountWriter {
    store: MountStore,
}

impl MountWriter {
    /// The read handle backing this writer.
    pub fn store(&self) -> &MountStore {
        &self.store
    }

    /// Register or re-register a mount. See [`MountTable::register`].
    pub fn register(&self, path: &str, owner: ProcessId) -> FsResult<()> {
        let mut table = self.store.table.write().map_err(|_| FsError::IoError)?;
        table.register(path, owner)
    }

    /// Zero the table, as the root instance does at startup.
    pub fn reset(&self) -> FsResult<()> {
        let mut table = self.store.table.write().map_err(|_| FsError::IoError)?;
        table.reset();
        Ok(())
    }
}

/// How a non-root instance registers its mount with the root instance.
///
/// The registration is an ordinary message on the channel; the concrete
/// implementation lives with the transport.
#[async_trait]
pub trait MountClient: Send + Sync {
    /// Ask the root instance to register `path` and return its verdict.
    async fn mount_filesystem(&self, path: &str) -> ResultCode;
}
