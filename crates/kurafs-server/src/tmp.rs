//! Temp-storage wiring: everything lives in memory and vanishes with the
//! server.

use std::sync::Arc;

use kurafs_types::{FileMode, FileType, ProcessId};

use crate::file::{Directory, PseudoFile, VfsFile};
use crate::mounts::MountClient;
use crate::server::{FileFactory, FileSystemServer, ServerConfig};
use crate::transport::Transport;

/// Factory for a temp filesystem: regular files become memory-backed
/// pseudo-files, directories get an empty entry table. Device nodes need a
/// backing driver and cannot be created here.
pub struct TmpFileFactory;

impl FileFactory for TmpFileFactory {
    fn create_file(&self, file_type: FileType, _mode: FileMode) -> Option<Arc<dyn VfsFile>> {
        match file_type {
            FileType::Regular => Some(Arc::new(PseudoFile::new())),
            FileType::Directory => Some(Arc::new(Directory::new())),
            FileType::CharacterDevice | FileType::BlockDevice => None,
        }
    }
}

/// Assemble a temp-storage server instance on an empty root directory.
pub fn tmp_server(
    mount_path: impl Into<String>,
    pid: ProcessId,
    transport: Arc<dyn Transport>,
    client: Arc<dyn MountClient>,
) -> FileSystemServer {
    FileSystemServer::new(
        Arc::new(Directory::new()),
        ServerConfig::member(mount_path, pid, transport, client)
            .with_factory(Arc::new(TmpFileFactory)),
    )
}
