//! Protocol actions a filesystem server can be asked to perform.

use serde::{Deserialize, Serialize};

use crate::error::FsError;

/// A filesystem operation requested over the message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileAction {
    /// Create a new file at the given path.
    CreateFile,
    /// Query metadata for an existing file.
    StatFile,
    /// Remove a file or empty directory.
    DeleteFile,
    /// Read file contents at an offset.
    ReadFile,
    /// Write file contents at an offset.
    WriteFile,
    /// Register a mounted filesystem with the root instance.
    MountFileSystem,
    /// Block (by retry) until the filesystem serving a path is mounted.
    WaitFileSystem,
    /// Copy the mount table to the caller.
    GetFileSystems,
}

impl FileAction {
    /// True for actions that carry a path and go through the dispatch engine.
    ///
    /// Mount registration and mount-table copies are handled separately.
    pub fn is_path_action(&self) -> bool {
        !matches!(
            self,
            FileAction::MountFileSystem | FileAction::GetFileSystems
        )
    }
}

impl TryFrom<u8> for FileAction {
    type Error = FsError;

    /// Decode an action from its wire byte. Unknown bytes are a malformed
    /// message, not an unsupported operation.
    fn try_from(value: u8) -> Result<Self, FsError> {
        match value {
            0 => Ok(FileAction::CreateFile),
            1 => Ok(FileAction::StatFile),
            2 => Ok(FileAction::DeleteFile),
            3 => Ok(FileAction::ReadFile),
            4 => Ok(FileAction::WriteFile),
            5 => Ok(FileAction::MountFileSystem),
            6 => Ok(FileAction::WaitFileSystem),
            7 => Ok(FileAction::GetFileSystems),
            _ => Err(FsError::InvalidArgument),
        }
    }
}

impl From<FileAction> for u8 {
    fn from(action: FileAction) -> u8 {
        match action {
            FileAction::CreateFile => 0,
            FileAction::StatFile => 1,
            FileAction::DeleteFile => 2,
            FileAction::ReadFile => 3,
            FileAction::WriteFile => 4,
            FileAction::MountFileSystem => 5,
            FileAction::WaitFileSystem => 6,
            FileAction::GetFileSystems => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_byte_round_trip() {
        for byte in 0u8..8 {
            let action = FileAction::try_from(byte).unwrap();
            assert_eq!(u8::from(action), byte);
        }
    }

    #[test]
    fn unknown_wire_byte_is_invalid() {
        assert_eq!(FileAction::try_from(200), Err(FsError::InvalidArgument));
    }

    #[test]
    fn mount_actions_are_not_path_actions() {
        assert!(!FileAction::MountFileSystem.is_path_action());
        assert!(!FileAction::GetFileSystems.is_path_action());
        assert!(FileAction::ReadFile.is_path_action());
        assert!(FileAction::WaitFileSystem.is_path_action());
    }
}
