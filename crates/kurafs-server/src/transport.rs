//! The message-channel seam.
//!
//! The transport itself (channel registration, process wakeup, address-space
//! copies) lives outside this crate. The server only needs three things from
//! it: copy bytes out of a caller, copy bytes into a caller, and queue a
//! response followed by a wakeup. [`LoopbackTransport`] is the in-process
//! implementation used by tests and by embedders that host client and server
//! in one process.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use kurafs_types::{FileSystemResponse, ProcessId};

/// Failures of the channel layer.
///
/// These abort the single request they occur in; they never affect the cache
/// tree or the retry queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("copy from process {0} failed")]
    CopyFrom(ProcessId),
    #[error("copy to process {0} failed")]
    CopyTo(ProcessId),
    #[error("channel to process {0} closed")]
    ChannelClosed(ProcessId),
}

/// What the server requires of the message channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Copy up to `len` bytes out of `from`'s I/O buffer.
    async fn copy_from(&self, from: ProcessId, len: u64) -> Result<Vec<u8>, TransportError>;

    /// Copy `data` into `to`'s I/O buffer.
    async fn copy_to(&self, to: ProcessId, data: &[u8]) -> Result<(), TransportError>;

    /// Queue a response on the addressee's channel and wake it.
    async fn send_response(&self, response: FileSystemResponse) -> Result<(), TransportError>;
}

/// In-process transport: per-process byte buffers and a response queue.
///
/// Tests stage a caller's outgoing data with [`stage`](Self::stage), then
/// collect what the server copied back with [`delivered`](Self::delivered)
/// and the responses with [`take_responses`](Self::take_responses). The
/// [`fail_copies`](Self::fail_copies) knob simulates address-space copy
/// faults.
#[derive(Default)]
pub struct LoopbackTransport {
    outgoing: Mutex<HashMap<ProcessId, Vec<u8>>>,
    incoming: Mutex<HashMap<ProcessId, Vec<u8>>>,
    responses: Mutex<VecDeque<FileSystemResponse>>,
    copies_fail: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the bytes `pid` offers for the server to copy from.
    pub fn stage(&self, pid: ProcessId, data: impl Into<Vec<u8>>) {
        self.outgoing
            .lock()
            .expect("transport lock")
            .insert(pid, data.into());
    }

    /// Bytes the server has copied into `pid`'s buffer so far.
    pub fn delivered(&self, pid: ProcessId) -> Vec<u8> {
        self.incoming
            .lock()
            .expect("transport lock")
            .get(&pid)
            .cloned()
            .unwrap_or_default()
    }

    /// Drain all responses queued so far, in send order.
    pub fn take_responses(&self) -> Vec<FileSystemResponse> {
        self.responses
            .lock()
            .expect("transport lock")
            .drain(..)
            .collect()
    }

    /// Make every subsequent copy fail, as a faulted address-space copy
    /// would.
    pub fn fail_copies(&self, fail: bool) {
        self.copies_fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn copy_from(&self, from: ProcessId, len: u64) -> Result<Vec<u8>, TransportError> {
        if self.copies_fail.load(Ordering::SeqCst) {
            return Err(TransportError::CopyFrom(from));
        }
        let outgoing = self.outgoing.lock().expect("transport lock");
        let data = outgoing
            .get(&from)
            .ok_or(TransportError::CopyFrom(from))?;
        let end = (len as usize).min(data.len());
        Ok(data[..end].to_vec())
    }

    async fn copy_to(&self, to: ProcessId, data: &[u8]) -> Result<(), TransportError> {
        if self.copies_fail.load(Ordering::SeqCst) {
            return Err(TransportError::CopyTo(to));
        }
        self.incoming
            .lock()
            .expect("transport lock")
            .insert(to, data.to_vec());
        Ok(())
    }

    async fn send_response(&self, response: FileSystemResponse) -> Result<(), TransportError> {
        self.responses
            .lock()
            .expect("transport lock")
            .push_back(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurafs_types::ResultCode;

    #[tokio::test]
    async fn copy_from_returns_staged_bytes() {
        let transport = LoopbackTransport::new();
        transport.stage(ProcessId(4), b"hello".to_vec());

        let data = transport.copy_from(ProcessId(4), 5).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn copy_from_truncates_to_len() {
        let transport = LoopbackTransport::new();
        transport.stage(ProcessId(4), b"hello world".to_vec());

        let data = transport.copy_from(ProcessId(4), 5).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn copy_from_unknown_process_fails() {
        let transport = LoopbackTransport::new();
        let result = transport.copy_from(ProcessId(9), 16).await;
        assert_eq!(result, Err(TransportError::CopyFrom(ProcessId(9))));
    }

    #[tokio::test]
    async fn copy_to_is_observable() {
        let transport = LoopbackTransport::new();
        transport.copy_to(ProcessId(2), b"data").await.unwrap();
        assert_eq!(transport.delivered(ProcessId(2)), b"data");
    }

    #[tokio::test]
    async fn fail_knob_faults_both_directions() {
        let transport = LoopbackTransport::new();
        transport.stage(ProcessId(1), b"x".to_vec());
        transport.fail_copies(true);

        assert!(transport.copy_from(ProcessId(1), 1).await.is_err());
        assert!(transport.copy_to(ProcessId(1), b"x").await.is_err());
    }

    #[tokio::test]
    async fn responses_drain_in_send_order() {
        let transport = LoopbackTransport::new();
        transport
            .send_response(FileSystemResponse::new(ProcessId(1), ResultCode::Success))
            .await
            .unwrap();
        transport
            .send_response(FileSystemResponse::new(ProcessId(2), ResultCode::NotFound))
            .await
            .unwrap();

        let responses = transport.take_responses();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].to, ProcessId(1));
        assert_eq!(responses[1].to, ProcessId(2));
        assert!(transport.take_responses().is_empty());
    }
}
