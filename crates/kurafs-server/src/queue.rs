//! Parked requests awaiting a retry sweep.

use std::collections::VecDeque;
use std::sync::Arc;

use kurafs_types::FileSystemMessage;

use crate::buffer::IoBuffer;
use crate::transport::Transport;

/// One in-flight request: the inbound message plus its staged I/O buffer.
///
/// Parking a request snapshots the message and starts over with a fresh
/// buffer, so re-running dispatch on it is equivalent to processing the
/// message fresh.
pub struct FileSystemRequest {
    pub message: FileSystemMessage,
    pub buffer: IoBuffer,
}

impl FileSystemRequest {
    pub fn new(transport: Arc<dyn Transport>, message: FileSystemMessage) -> Self {
        let buffer = IoBuffer::new(transport, &message);
        Self { message, buffer }
    }
}

/// Arrival-ordered queue of parked requests.
#[derive(Default)]
pub struct RequestQueue {
    pending: VecDeque<FileSystemRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a request at the back.
    pub fn push(&mut self, request: FileSystemRequest) {
        self.pending.push_back(request);
    }

    /// Take every parked request for a sweep. Requests still blocked are
    /// handed back through [`push`](Self::push) in their original order.
    pub fn drain(&mut self) -> VecDeque<FileSystemRequest> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;
    use kurafs_types::{FileAction, ProcessId};

    fn request(pid: u32) -> FileSystemRequest {
        let transport = Arc::new(LoopbackTransport::new());
        let msg = FileSystemMessage::new(ProcessId(pid), FileAction::WaitFileSystem, b"/w");
        FileSystemRequest::new(transport, msg)
    }

    #[test]
    fn drain_preserves_arrival_order() {
        let mut queue = RequestQueue::new();
        queue.push(request(1));
        queue.push(request(2));
        queue.push(request(3));

        let drained = queue.drain();
        let pids: Vec<u32> = drained.iter().map(|r| r.message.from.0).collect();
        assert_eq!(pids, [1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn requeue_keeps_relative_order() {
        let mut queue = RequestQueue::new();
        queue.push(request(1));
        queue.push(request(2));

        let mut drained = queue.drain();
        while let Some(req) = drained.pop_front() {
            // Pretend both stayed blocked.
            queue.push(req);
        }

        let pids: Vec<u32> = queue.drain().iter().map(|r| r.message.from.0).collect();
        assert_eq!(pids, [1, 2]);
    }
}
