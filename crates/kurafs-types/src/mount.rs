//! Mount table records shared between filesystem server instances.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::message::ProcessId;

/// Number of records in the shared mount table.
pub const MOUNT_TABLE_SIZE: usize = 32;

/// Maximum length in bytes of a mount path.
pub const MOUNT_PATH_MAX: usize = 64;

bitflags! {
    /// Per-mount option bits. Currently only presence matters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MountOptions: u32 {
        const READ_ONLY = 1;
    }
}

impl Default for MountOptions {
    fn default() -> Self {
        MountOptions::empty()
    }
}

/// One record of the shared mount table.
///
/// An empty path marks a free slot. The table itself is a fixed-size array
/// of these records; only the designated root instance writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemMount {
    /// Mount path, normalized, unique among active records.
    pub path: String,
    /// Server instance owning this mount.
    pub owner: ProcessId,
    /// Option bits.
    pub options: MountOptions,
}

impl FileSystemMount {
    /// A free slot.
    pub fn empty() -> Self {
        Self {
            path: String::new(),
            owner: ProcessId(0),
            options: MountOptions::empty(),
        }
    }

    /// True if this record holds no active mount.
    pub fn is_free(&self) -> bool {
        self.path.is_empty()
    }
}

impl Default for FileSystemMount {
    fn default() -> Self {
        Self::empty()
    }
}
