//! The concrete-file seam.
//!
//! Every cache node owns a handle to a [`VfsFile`]. The dispatch engine only
//! ever talks to files through this trait; the per-filesystem-type
//! implementations (device nodes, process pseudo-files, on-disk formats)
//! live with their providers. Two base implementations ship here because
//! every provider needs them: [`Directory`] and [`PseudoFile`].

mod directory;
mod pseudo;

pub use directory::Directory;
pub use pseudo::PseudoFile;

use std::sync::Arc;

use async_trait::async_trait;

use kurafs_types::{Dirent, FileStat, FileType, FsError, FsResult};

use crate::buffer::IoBuffer;

/// A file served by this instance.
///
/// Operations that a concrete file does not support fall through to the
/// default `NotSupported` bodies. A read or write that cannot complete yet
/// returns [`FsError::RetryAgain`]; the dispatch engine parks the request
/// and re-runs it on the next sweep.
#[async_trait]
pub trait VfsFile: Send + Sync {
    /// Kind of this file. Only directories may hold cache children.
    fn file_type(&self) -> FileType;

    /// Metadata for a stat request.
    async fn status(&self) -> FsResult<FileStat>;

    /// Read up to `size` bytes at `offset`, staging them in `buffer`.
    /// Returns the number of bytes staged.
    async fn read(&self, buffer: &mut IoBuffer, size: u64, offset: u64) -> FsResult<u64> {
        let _ = (buffer, size, offset);
        Err(FsError::NotSupported)
    }

    /// Write up to `size` bytes at `offset` from the staged `buffer`.
    /// Returns the number of bytes consumed.
    async fn write(&self, buffer: &mut IoBuffer, size: u64, offset: u64) -> FsResult<u64> {
        let _ = (buffer, size, offset);
        Err(FsError::NotSupported)
    }

    /// Directory capability, if this file is one.
    fn as_directory(&self) -> Option<&dyn DirectoryOps> {
        None
    }
}

/// Operations a directory file supports beyond plain I/O.
#[async_trait]
pub trait DirectoryOps: Send + Sync {
    /// Fetch a child file by name from the underlying storage, if this
    /// directory can produce one. The cache inserts whatever this returns;
    /// pseudo-directories whose children are registered up front return
    /// nothing.
    async fn lookup(&self, name: &str) -> Option<Arc<dyn VfsFile>> {
        let _ = name;
        None
    }

    /// Add an entry to the entry table. Replaces an entry with the same
    /// name.
    async fn insert(&self, file_type: FileType, name: &str);

    /// Remove an entry by name. Removing an absent name is a no-op.
    async fn remove(&self, name: &str);

    /// Snapshot of the entry table.
    async fn entries(&self) -> Vec<Dirent>;

    /// Number of entries in the table.
    async fn entry_count(&self) -> usize {
        self.entries().await.len()
    }
}
