//! Directory file with an in-memory entry table.

use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use kurafs_types::{Dirent, FileMode, FileStat, FileType, FsError, FsResult};

use crate::buffer::IoBuffer;
use crate::file::{DirectoryOps, VfsFile};

/// A directory whose entry table lives in memory.
///
/// Reading a directory yields its entry records in a compact byte encoding,
/// windowed by the request's offset and size, so a caller can page through
/// large listings. Lookup finds nothing: children of a pseudo-directory
/// exist only once registered in the cache.
pub struct Directory {
    entries: RwLock<Vec<Dirent>>,
    access: FileMode,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            access: FileMode::OWNER_RWX,
        }
    }

    fn listing_bytes(&self) -> FsResult<Vec<u8>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| FsError::IoError)?;
        postcard::to_allocvec(&*entries).map_err(|err| {
            warn!(error = %err, "directory listing encode failed");
            FsError::IoError
        })
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VfsFile for Directory {
    fn file_type(&self) -> FileType {
        FileType::Directory
    }

    async fn status(&self) -> FsResult<FileStat> {
        let size = self.listing_bytes()?.len() as u64;
        Ok(FileStat::new(FileType::Directory, self.access, size))
    }

    async fn read(&self, buffer: &mut IoBuffer, size: u64, offset: u64) -> FsResult<u64> {
        let bytes = self.listing_bytes()?;
        let start = (offset as usize).min(bytes.len());
        let end = (start + size as usize).min(bytes.len());
        buffer.push(&bytes[start..end]);
        Ok((end - start) as u64)
    }

    fn as_directory(&self) -> Option<&dyn DirectoryOps> {
        Some(self)
    }
}

#[async_trait]
impl DirectoryOps for Directory {
    async fn insert(&self, file_type: FileType, name: &str) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if let Some(existing) = entries.iter_mut().find(|e| e.name == name) {
            existing.file_type = file_type;
        } else {
            entries.push(Dirent::new(name, file_type));
        }
    }

    async fn remove(&self, name: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|e| e.name != name);
        }
    }

    async fn entries(&self) -> Vec<Dirent> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}
