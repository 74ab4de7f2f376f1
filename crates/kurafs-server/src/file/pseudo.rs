//! Memory-backed file for temp storage and fixed-content pseudo-files.

use std::sync::RwLock;

use async_trait::async_trait;

use kurafs_types::{FileMode, FileStat, FileType, FsError, FsResult};

use crate::buffer::IoBuffer;
use crate::file::VfsFile;

/// A regular file whose contents live in a growable memory buffer.
pub struct PseudoFile {
    contents: RwLock<Vec<u8>>,
    access: FileMode,
}

impl PseudoFile {
    /// An empty file.
    pub fn new() -> Self {
        Self {
            contents: RwLock::new(Vec::new()),
            access: FileMode::OWNER_RW,
        }
    }

    /// A file pre-filled with fixed contents.
    pub fn with_contents(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: RwLock::new(contents.into()),
            access: FileMode::OWNER_RW,
        }
    }
}

impl Default for PseudoFile {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VfsFile for PseudoFile {
    fn file_type(&self) -> FileType {
        FileType::Regular
    }

    async fn status(&self) -> FsResult<FileStat> {
        let size = self
            .contents
            .read()
            .map_err(|_| FsError::IoError)?
            .len() as u64;
        Ok(FileStat::new(FileType::Regular, self.access, size))
    }

    async fn read(&self, buffer: &mut IoBuffer, size: u64, offset: u64) -> FsResult<u64> {
        let contents = self.contents.read().map_err(|_| FsError::IoError)?;
        let start = (offset as usize).min(contents.len());
        let end = (start + size as usize).min(contents.len());
        buffer.push(&contents[start..end]);
        Ok((end - start) as u64)
    }

    async fn write(&self, buffer: &mut IoBuffer, size: u64, offset: u64) -> FsResult<u64> {
        let mut contents = self.contents.write().map_err(|_| FsError::IoError)?;
        let data = buffer.data();
        let count = (size as usize).min(data.len());
        let offset = offset as usize;

        // Zero-fill any gap between current end and the write offset.
        if offset > contents.len() {
            contents.resize(offset, 0);
        }
        let overlap = (contents.len() - offset).min(count);
        contents[offset..offset + overlap].copy_from_slice(&data[..overlap]);
        contents.extend_from_slice(&data[overlap..count]);
        Ok(count as u64)
    }
}
