//! Path parsing for the dispatch engine.
//!
//! Paths arrive as raw bytes copied out of a caller's address space. The
//! server strips its own mount prefix before parsing, so the components here
//! are always relative to this instance's root. No `.`/`..` normalization is
//! performed; an empty path refers to the root itself.

use kurafs_types::{FsError, FsResult, PATH_MAX};

/// Decode raw path bytes into a string.
///
/// Overlong or non-UTF-8 input is a malformed identifier, not an I/O
/// failure: the transport delivered the bytes fine, the caller filled them
/// badly.
pub fn decode(raw: &[u8]) -> FsResult<&str> {
    if raw.len() > PATH_MAX {
        return Err(FsError::InvalidArgument);
    }
    std::str::from_utf8(raw).map_err(|_| FsError::InvalidArgument)
}

/// A parsed path: ordered non-empty components split on `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemPath {
    components: Vec<String>,
}

impl FileSystemPath {
    /// Parse a path string. Empty strings and bare separators produce the
    /// root path (no components).
    pub fn new(path: &str) -> Self {
        Self {
            components: path
                .split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// The ordered path components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// True if this path refers to the root itself.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// All but the last component. The parent of the root is the root.
    pub fn parent(&self) -> FileSystemPath {
        let end = self.components.len().saturating_sub(1);
        Self {
            components: self.components[..end].to_vec(),
        }
    }

    /// The last component, or an empty string at root.
    pub fn base(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or("")
    }

    /// The full path, joined with `/`.
    pub fn full(&self) -> String {
        self.components.join("/")
    }
}
