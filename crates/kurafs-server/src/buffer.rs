//! Staged I/O buffer between concrete files and the transport.
//!
//! A read operation lets the file push its output bytes here, and the
//! dispatch engine flushes them to the caller in one copy. A write operation
//! pulls the caller's bytes here once, and the file consumes them. Parked
//! requests are re-created with a fresh buffer, so a retried operation
//! stages its data again from scratch.

use std::sync::Arc;

use kurafs_types::{FileSystemMessage, ProcessId};

use crate::transport::{Transport, TransportError};

/// Byte staging area tied to one request's caller-side buffer.
pub struct IoBuffer {
    transport: Arc<dyn Transport>,
    remote: ProcessId,
    capacity: u64,
    data: Vec<u8>,
}

impl IoBuffer {
    /// Create an empty buffer for the message's caller and transfer size.
    pub fn new(transport: Arc<dyn Transport>, message: &FileSystemMessage) -> Self {
        Self {
            transport,
            remote: message.from,
            capacity: message.size,
            data: Vec::new(),
        }
    }

    /// Number of staged bytes.
    pub fn count(&self) -> usize {
        self.data.len()
    }

    /// The staged bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Stage output bytes, to be flushed to the caller later.
    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Pull the caller's bytes into the staging area, up to the transfer
    /// size. Replaces any previously staged data.
    pub async fn buffered_read(&mut self) -> Result<(), TransportError> {
        self.data = self
            .transport
            .copy_from(self.remote, self.capacity)
            .await?;
        Ok(())
    }

    /// Copy the staged bytes into the caller's buffer and clear the stage.
    pub async fn flush(&mut self) -> Result<(), TransportError> {
        self.transport.copy_to(self.remote, &self.data).await?;
        self.data.clear();
        Ok(())
    }
}
