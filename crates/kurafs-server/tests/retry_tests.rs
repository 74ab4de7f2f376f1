//! Parked requests and the retry sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use kurafs_server::{
    Directory, FileSystemServer, IoBuffer, LoopbackTransport, MountClient, MountStore,
    ServerConfig, VfsFile,
};
use kurafs_types::{
    FileAction, FileMode, FileStat, FileSystemMessage, FileType, FsError, FsResult, ProcessId,
    ResultCode,
};

const CLIENT: ProcessId = ProcessId(100);

struct NullMountClient;

#[async_trait]
impl MountClient for NullMountClient {
    async fn mount_filesystem(&self, _path: &str) -> ResultCode {
        ResultCode::Success
    }
}

/// Device-style file that is not ready until signaled.
struct NotReadyFile {
    ready: AtomicBool,
    contents: Vec<u8>,
}

impl NotReadyFile {
    fn new(contents: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            ready: AtomicBool::new(false),
            contents: contents.to_vec(),
        })
    }

    fn signal(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VfsFile for NotReadyFile {
    fn file_type(&self) -> FileType {
        FileType::CharacterDevice
    }

    async fn status(&self) -> FsResult<FileStat> {
        Ok(FileStat::new(
            FileType::CharacterDevice,
            FileMode::OWNER_RW,
            0,
        ))
    }

    async fn read(&self, buffer: &mut IoBuffer, size: u64, offset: u64) -> FsResult<u64> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(FsError::RetryAgain);
        }
        let start = (offset as usize).min(self.contents.len());
        let end = (start + size as usize).min(self.contents.len());
        buffer.push(&self.contents[start..end]);
        Ok((end - start) as u64)
    }
}

fn root_fixture() -> (FileSystemServer, Arc<LoopbackTransport>) {
    let (_store, writer) = MountStore::new();
    let transport = Arc::new(LoopbackTransport::new());
    let server = FileSystemServer::new(
        Arc::new(Directory::new()),
        ServerConfig::root(ProcessId(1), transport.clone(), writer),
    );
    (server, transport)
}

#[tokio::test]
async fn empty_queue_sweep_is_a_no_op() {
    let (mut server, transport) = root_fixture();
    assert!(!server.retry_requests().await);
    assert!(transport.take_responses().is_empty());
}

#[tokio::test]
async fn wait_parks_until_the_filesystem_mounts() {
    let (mut server, transport) = root_fixture();

    server
        .handle(FileSystemMessage::new(
            CLIENT,
            FileAction::WaitFileSystem,
            b"/storage/data",
        ))
        .await;

    // No response obligation yet, the request is parked.
    assert!(transport.take_responses().is_empty());
    assert_eq!(server.pending_requests(), 1);

    // Sweeps without the mount keep it parked, never dropping it.
    for _ in 0..3 {
        assert!(!server.retry_requests().await);
        assert_eq!(server.pending_requests(), 1);
        assert!(transport.take_responses().is_empty());
    }

    // Once the filesystem mounts, the next sweep resolves the wait.
    server
        .handle(FileSystemMessage::new(
            ProcessId(7),
            FileAction::MountFileSystem,
            b"/storage",
        ))
        .await;
    transport.take_responses();

    assert!(server.retry_requests().await);
    assert_eq!(server.pending_requests(), 0);

    let responses = transport.take_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].to, CLIENT);
    // The wait reports plain success: the caller retries its original
    // operation itself.
    assert_eq!(responses[0].result, ResultCode::Success);
    assert_eq!(responses[0].redirect.unwrap().pid, ProcessId(7));
}

#[tokio::test]
async fn sweep_preserves_arrival_order_of_blocked_requests() {
    let (mut server, transport) = root_fixture();

    server
        .handle(FileSystemMessage::new(
            ProcessId(100),
            FileAction::WaitFileSystem,
            b"/x/a",
        ))
        .await;
    server
        .handle(FileSystemMessage::new(
            ProcessId(101),
            FileAction::WaitFileSystem,
            b"/y/b",
        ))
        .await;
    assert_eq!(server.pending_requests(), 2);

    // Mount the second one's filesystem: only it resolves.
    server
        .handle(FileSystemMessage::new(
            ProcessId(8),
            FileAction::MountFileSystem,
            b"/y",
        ))
        .await;
    transport.take_responses();

    assert!(server.retry_requests().await);
    assert_eq!(server.pending_requests(), 1);
    let responses = transport.take_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].to, ProcessId(101));

    // The first arrival is still parked and resolves on its own mount.
    server
        .handle(FileSystemMessage::new(
            ProcessId(9),
            FileAction::MountFileSystem,
            b"/x",
        ))
        .await;
    transport.take_responses();

    assert!(server.retry_requests().await);
    assert_eq!(server.pending_requests(), 0);
    let responses = transport.take_responses();
    assert_eq!(responses[0].to, ProcessId(100));
}

#[tokio::test]
async fn not_ready_reads_park_and_converge() {
    let transport = Arc::new(LoopbackTransport::new());
    let mut server = FileSystemServer::new(
        Arc::new(Directory::new()),
        ServerConfig::member(
            "/dev",
            ProcessId(5),
            transport.clone(),
            Arc::new(NullMountClient),
        ),
    );

    let device = NotReadyFile::new(b"sensor data");
    server
        .register_file(device.clone(), "/slow")
        .await
        .unwrap();

    server
        .handle(
            FileSystemMessage::new(CLIENT, FileAction::ReadFile, b"/dev/slow").with_io(0, 11),
        )
        .await;
    assert!(transport.take_responses().is_empty());
    assert_eq!(server.pending_requests(), 1);

    // Still blocked: the request survives the sweep untouched.
    assert!(!server.retry_requests().await);
    assert_eq!(server.pending_requests(), 1);

    // Device signals readiness; the next sweep completes the read.
    device.signal();
    assert!(server.retry_requests().await);
    assert_eq!(server.pending_requests(), 0);

    let responses = transport.take_responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].result, ResultCode::Success);
    assert_eq!(responses[0].size, 11);
    assert_eq!(transport.delivered(CLIENT), b"sensor data");
}

#[tokio::test]
async fn resolved_requests_send_exactly_one_response() {
    let (mut server, transport) = root_fixture();

    server
        .handle(FileSystemMessage::new(
            CLIENT,
            FileAction::WaitFileSystem,
            b"/late",
        ))
        .await;
    server
        .handle(FileSystemMessage::new(
            ProcessId(7),
            FileAction::MountFileSystem,
            b"/late",
        ))
        .await;
    transport.take_responses();

    assert!(server.retry_requests().await);
    // Further sweeps find an empty queue and send nothing.
    assert!(!server.retry_requests().await);

    let responses = transport.take_responses();
    assert_eq!(responses.len(), 1);
}
