//! File metadata types: stat results and directory entries.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Kind of file served by a filesystem instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Regular,
    Directory,
    CharacterDevice,
    BlockDevice,
}

impl FileType {
    /// Directories are the only kind that may legally hold children.
    pub fn is_directory(&self) -> bool {
        *self == FileType::Directory
    }
}

bitflags! {
    /// Access bits of a file, owner/group/other read-write-execute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FileMode: u16 {
        const OWNER_R = 0o400;
        const OWNER_W = 0o200;
        const OWNER_X = 0o100;
        const GROUP_R = 0o040;
        const GROUP_W = 0o020;
        const GROUP_X = 0o010;
        const OTHER_R = 0o004;
        const OTHER_W = 0o002;
        const OTHER_X = 0o001;

        const OWNER_RW = Self::OWNER_R.bits() | Self::OWNER_W.bits();
        const OWNER_RWX = Self::OWNER_RW.bits() | Self::OWNER_X.bits();
    }
}

impl Default for FileMode {
    fn default() -> Self {
        FileMode::OWNER_RW
    }
}

/// Metadata returned by a stat operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Kind of file.
    pub file_type: FileType,
    /// Access bits.
    pub access: FileMode,
    /// Size in bytes (0 for directories and devices).
    pub size: u64,
    /// Owning user.
    pub user: u32,
    /// Owning group.
    pub group: u32,
}

impl FileStat {
    /// Stat for a freshly created file of the given kind.
    pub fn new(file_type: FileType, access: FileMode, size: u64) -> Self {
        Self {
            file_type,
            access,
            size,
            user: 0,
            group: 0,
        }
    }
}

/// One record in a directory's entry table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dirent {
    /// Entry name (not a full path).
    pub name: String,
    /// Kind of the entry.
    pub file_type: FileType,
}

impl Dirent {
    pub fn new(name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            file_type,
        }
    }
}
