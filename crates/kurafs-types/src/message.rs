//! Channel messages exchanged between clients and filesystem servers.

use serde::{Deserialize, Serialize};

use crate::action::FileAction;
use crate::error::ResultCode;
use crate::file::{FileMode, FileStat, FileType};

/// Maximum length in bytes of a path carried in a message.
pub const PATH_MAX: usize = 64;

/// Identifier of a process on the local system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inbound filesystem request, as delivered by the transport.
///
/// The path travels as raw bytes: the transport copies it out of the
/// caller's address space without interpretation, and the dispatch engine
/// validates it. `offset`/`size` describe the I/O window for read and write;
/// `file_type`/`mode` are only meaningful for create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemMessage {
    /// Originating process.
    pub from: ProcessId,
    /// Requested operation.
    pub action: FileAction,
    /// Raw path bytes, at most [`PATH_MAX`].
    pub path: Vec<u8>,
    /// Byte offset for read/write.
    pub offset: u64,
    /// Requested transfer size in bytes, or the caller's buffer capacity.
    pub size: u64,
    /// Kind of file to create.
    pub file_type: FileType,
    /// Access bits for a created file.
    pub mode: FileMode,
}

impl FileSystemMessage {
    /// Build a request carrying the given action and path.
    pub fn new(from: ProcessId, action: FileAction, path: impl AsRef<[u8]>) -> Self {
        Self {
            from,
            action,
            path: path.as_ref().to_vec(),
            offset: 0,
            size: 0,
            file_type: FileType::Regular,
            mode: FileMode::default(),
        }
    }

    /// Set the I/O window.
    pub fn with_io(mut self, offset: u64, size: u64) -> Self {
        self.offset = offset;
        self.size = size;
        self
    }

    /// Set the created file's kind and access bits.
    pub fn with_file_type(mut self, file_type: FileType, mode: FileMode) -> Self {
        self.file_type = file_type;
        self.mode = mode;
        self
    }
}

/// Redirect payload: where the caller should resend its request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    /// The server instance owning the matched mount.
    pub pid: ProcessId,
    /// Length of the matched mount prefix; the caller strips this many
    /// bytes before resending.
    pub mount_length: usize,
}

/// The response to a filesystem request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemResponse {
    /// Process the response is addressed to.
    pub to: ProcessId,
    /// Outcome of the operation.
    pub result: ResultCode,
    /// Bytes transferred for read/write, bytes copied for table copies.
    pub size: u64,
    /// Metadata for a successful stat.
    pub stat: Option<FileStat>,
    /// Routing payload for a `RedirectRequest` outcome.
    pub redirect: Option<Redirect>,
}

impl FileSystemResponse {
    /// A response with no payload beyond its result code.
    pub fn new(to: ProcessId, result: ResultCode) -> Self {
        Self {
            to,
            result,
            size: 0,
            stat: None,
            redirect: None,
        }
    }

    /// Attach a transferred-byte count.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Attach stat metadata.
    pub fn with_stat(mut self, stat: FileStat) -> Self {
        self.stat = Some(stat);
        self
    }

    /// Attach a redirect target.
    pub fn with_redirect(mut self, pid: ProcessId, mount_length: usize) -> Self {
        self.redirect = Some(Redirect { pid, mount_length });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_builder_sets_io_window() {
        let msg = FileSystemMessage::new(ProcessId(7), FileAction::ReadFile, b"/tmp/a")
            .with_io(16, 128);
        assert_eq!(msg.offset, 16);
        assert_eq!(msg.size, 128);
        assert_eq!(msg.path, b"/tmp/a");
    }

    #[test]
    fn response_builder_attaches_redirect() {
        let resp = FileSystemResponse::new(ProcessId(1), ResultCode::RedirectRequest)
            .with_redirect(ProcessId(9), 4);
        let redirect = resp.redirect.unwrap();
        assert_eq!(redirect.pid, ProcessId(9));
        assert_eq!(redirect.mount_length, 4);
    }
}
