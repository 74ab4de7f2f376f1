//! The dispatch engine and server façade.
//!
//! [`FileSystemServer`] ties the cache tree, mount table access, retry
//! queue, and transport together. The external driver feeds it inbound
//! messages through [`handle`](FileSystemServer::handle) and calls
//! [`retry_requests`](FileSystemServer::retry_requests) whenever a condition
//! that might unblock parked requests changes; the server itself never
//! polls, sleeps, or blocks.

use std::sync::Arc;

use tracing::{debug, error};

use kurafs_types::{
    FileAction, FileMode, FileStat, FileSystemMessage, FileSystemResponse, FileType, FsError,
    FsResult, ProcessId, ResultCode,
};

use crate::cache::{FileCache, NodeId};
use crate::file::{DirectoryOps, VfsFile};
use crate::mounts::{MountClient, MountWriter};
use crate::path::{self, FileSystemPath};
use crate::queue::{FileSystemRequest, RequestQueue};
use crate::transport::Transport;

/// Manufactures the file object behind a create request.
///
/// Each concrete filesystem decides what a freshly created file is; a
/// provider without creatable files simply configures no factory.
pub trait FileFactory: Send + Sync {
    fn create_file(&self, file_type: FileType, mode: FileMode) -> Option<Arc<dyn VfsFile>>;
}

/// What this instance is allowed to do with the shared mount table.
pub enum ServerRole {
    /// The designated root instance: sole writer of the mount table,
    /// performs redirection for every inbound path.
    Root(MountWriter),
    /// Any other provider: registers its own mount with the root instance
    /// through the given client and never touches the table.
    Member(Arc<dyn MountClient>),
}

/// Configuration for a server instance.
pub struct ServerConfig {
    /// The path prefix this instance serves, e.g. `/` or `/tmp`.
    pub mount_path: String,
    /// This instance's own process identity.
    pub pid: ProcessId,
    /// Mount table capability.
    pub role: ServerRole,
    /// The message channel.
    pub transport: Arc<dyn Transport>,
    /// Factory for create requests; absent means creates fail.
    pub factory: Option<Arc<dyn FileFactory>>,
}

impl ServerConfig {
    /// Configuration for the designated root instance, serving `/`.
    pub fn root(pid: ProcessId, transport: Arc<dyn Transport>, writer: MountWriter) -> Self {
        Self {
            mount_path: "/".to_string(),
            pid,
            role: ServerRole::Root(writer),
            transport,
            factory: None,
        }
    }

    /// Configuration for a non-root provider serving `mount_path`.
    pub fn member(
        mount_path: impl Into<String>,
        pid: ProcessId,
        transport: Arc<dyn Transport>,
        client: Arc<dyn MountClient>,
    ) -> Self {
        Self {
            mount_path: mount_path.into(),
            pid,
            role: ServerRole::Member(client),
            transport,
            factory: None,
        }
    }

    /// Attach a file factory for create requests.
    pub fn with_factory(mut self, factory: Arc<dyn FileFactory>) -> Self {
        self.factory = Some(factory);
        self
    }
}

/// One filesystem provider's server instance.
pub struct FileSystemServer {
    mount_path: String,
    pid: ProcessId,
    role: ServerRole,
    transport: Arc<dyn Transport>,
    factory: Option<Arc<dyn FileFactory>>,
    cache: FileCache,
    requests: RequestQueue,
}

impl FileSystemServer {
    /// Build a server around its root directory file.
    pub fn new(root: Arc<dyn VfsFile>, config: ServerConfig) -> Self {
        assert!(
            root.file_type().is_directory(),
            "server root must be a directory"
        );
        let cache = FileCache::new(root, &config.mount_path);
        Self {
            mount_path: config.mount_path,
            pid: config.pid,
            role: config.role,
            transport: config.transport,
            factory: config.factory,
            cache,
            requests: RequestQueue::new(),
        }
    }

    /// The path prefix this instance serves.
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// This instance's process identity.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Number of currently parked requests.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Startup-time mount registration. The root instance claims the shared
    /// table and zeroes it; every other instance registers its mount path
    /// with the root instance and propagates the verdict.
    pub async fn mount(&mut self) -> ResultCode {
        match &self.role {
            ServerRole::Root(writer) => match writer.reset() {
                Ok(()) => ResultCode::Success,
                Err(err) => err.into(),
            },
            ServerRole::Member(client) => {
                let result = client.mount_filesystem(&self.mount_path).await;
                if result != ResultCode::Success {
                    error!(mount_path = %self.mount_path, ?result, "mount registration failed");
                }
                result
            }
        }
    }

    /// Process one inbound message, run-to-completion.
    pub async fn handle(&mut self, message: FileSystemMessage) {
        match message.action {
            FileAction::MountFileSystem => {
                let response = self.mount_handler(&message);
                self.send_response(response).await;
            }
            FileAction::GetFileSystems => {
                let response = self.get_file_systems_handler(&message).await;
                self.send_response(response).await;
            }
            _ => self.path_handler(message).await,
        }
    }

    /// Re-run every parked request in arrival order. Requests whose outcome
    /// is no longer `RetryAgain` have had their response sent and leave the
    /// queue; the rest stay parked, order preserved. Returns whether any
    /// request resolved. Safe to call with an empty queue.
    pub async fn retry_requests(&mut self) -> bool {
        let mut progressed = false;
        let mut pending = self.requests.drain();
        while let Some(mut request) = pending.pop_front() {
            if self.process_request(&mut request).await == ResultCode::RetryAgain {
                self.requests.push(request);
            } else {
                progressed = true;
            }
        }
        progressed
    }

    /// Register a pre-made file at `path`: insert it into the cache and add
    /// a directory entry to its parent. Providers use this at startup to
    /// expose fixed files before any request arrives.
    pub async fn register_file(&mut self, file: Arc<dyn VfsFile>, path_str: &str) -> FsResult<()> {
        let path = FileSystemPath::new(path_str);
        let file_type = file.file_type();
        let id = self.cache.insert(file, &path)?;
        let parent = self
            .cache
            .node(id)
            .parent()
            .expect("inserted node has a parent");
        let parent_file = self.cache.file(parent).ok_or(FsError::NotFound)?;
        match parent_file.as_directory() {
            Some(dir) => {
                dir.insert(file_type, path.base()).await;
                Ok(())
            }
            None => Err(FsError::NotFound),
        }
    }

    async fn path_handler(&mut self, message: FileSystemMessage) {
        let mut request = FileSystemRequest::new(self.transport.clone(), message);
        if self.process_request(&mut request).await == ResultCode::RetryAgain {
            // Park a fresh snapshot; the retried run stages its data again.
            let parked = FileSystemRequest::new(self.transport.clone(), request.message.clone());
            self.requests.push(parked);
        }
    }

    /// The dispatch engine. Produces exactly one response unless the
    /// outcome is `RetryAgain`, in which case no response obligation is
    /// held until a later sweep resolves the request.
    async fn process_request(&mut self, request: &mut FileSystemRequest) -> ResultCode {
        let path_str = match path::decode(&request.message.path) {
            Ok(p) => p.to_string(),
            Err(err) => {
                error!(from = %request.message.from, "failed to decode request path");
                let code: ResultCode = err.into();
                self.send_response(FileSystemResponse::new(request.message.from, code))
                    .await;
                return code;
            }
        };
        debug!(path = %path_str, action = ?request.message.action, "dispatch");

        // Paths under another provider's mount redirect, root instance only.
        if let ServerRole::Root(writer) = &self.role
            && let Some((owner, length)) = writer.store().longest_match(&path_str)
        {
            let result = if request.message.action == FileAction::WaitFileSystem {
                // The filesystem the caller was waiting for is now mounted.
                ResultCode::Success
            } else {
                ResultCode::RedirectRequest
            };
            debug!(path = %path_str, %owner, "redirect");
            let response = FileSystemResponse::new(request.message.from, result)
                .with_redirect(owner, length);
            self.send_response(response).await;
            return result;
        }

        // The caller addressed this instance; its mount prefix is consumed.
        let local = path_str.get(self.mount_path.len()..).unwrap_or("");
        let path = FileSystemPath::new(local);

        let mut node = self.cache.find(&path);
        if node.is_none() {
            node = self.cache.lookup(&path).await;
        }

        let action = request.message.action;
        if node.is_none()
            && action != FileAction::CreateFile
            && action != FileAction::WaitFileSystem
        {
            debug!(path = %path_str, "not found");
            let response = FileSystemResponse::new(request.message.from, ResultCode::NotFound);
            self.send_response(response).await;
            return ResultCode::NotFound;
        }

        let mut response = FileSystemResponse::new(request.message.from, ResultCode::Success);
        match action {
            FileAction::CreateFile => {
                response.result = if node.is_some() {
                    ResultCode::AlreadyExists
                } else {
                    self.create_file(&request.message, &path).await.into()
                };
                debug!(path = %path_str, result = ?response.result, "create");
            }

            FileAction::StatFile => {
                let id = node.expect("resolution miss is fatal for stat");
                response.result = match self.stat_file(id).await {
                    Ok(stat) => {
                        response.stat = Some(stat);
                        ResultCode::Success
                    }
                    Err(_) => ResultCode::IoError,
                };
                debug!(path = %path_str, result = ?response.result, "stat");
            }

            FileAction::DeleteFile => {
                let id = node.expect("resolution miss is fatal for delete");
                response.result = if self.cache.node(id).children().is_empty() {
                    self.cache.clear(id).await;
                    ResultCode::Success
                } else {
                    // Non-empty directories are protected.
                    ResultCode::PermissionDenied
                };
                debug!(path = %path_str, result = ?response.result, "delete");
            }

            FileAction::ReadFile => {
                let id = node.expect("resolution miss is fatal for read");
                response.result = match self.read_file(id, request).await {
                    Ok(n) => {
                        response.size = n;
                        ResultCode::Success
                    }
                    Err(FsError::RetryAgain) => ResultCode::RetryAgain,
                    Err(_) => ResultCode::IoError,
                };
                debug!(path = %path_str, result = ?response.result, "read");
            }

            FileAction::WriteFile => {
                let id = node.expect("resolution miss is fatal for write");
                response.result = match self.write_file(id, request).await {
                    Ok(n) => {
                        response.size = n;
                        ResultCode::Success
                    }
                    Err(FsError::RetryAgain) => ResultCode::RetryAgain,
                    Err(_) => ResultCode::IoError,
                };
                debug!(path = %path_str, result = ?response.result, "write");
            }

            FileAction::WaitFileSystem => {
                // Nothing to do here: once the awaited filesystem is
                // mounted, the redirect check above reports Success on a
                // later sweep.
                debug!(path = %path_str, "wait for mount");
                response.result = ResultCode::RetryAgain;
            }

            FileAction::MountFileSystem | FileAction::GetFileSystems => {
                error!(action = ?action, "unhandled file operation");
                response.result = ResultCode::NotSupported;
            }
        }

        let result = response.result;
        if result.is_terminal() {
            self.send_response(response).await;
        }
        result
    }

    async fn create_file(
        &mut self,
        message: &FileSystemMessage,
        path: &FileSystemPath,
    ) -> FsResult<()> {
        let factory = self.factory.as_ref().ok_or(FsError::IoError)?;
        let file = factory
            .create_file(message.file_type, message.mode)
            .ok_or(FsError::IoError)?;
        let file_type = file.file_type();
        let id = self.cache.insert(file, path).map_err(|err| {
            debug!(path = %path.full(), ?err, "create could not attach to cache");
            FsError::IoError
        })?;

        // Add a directory entry to the parent.
        let parent = self
            .cache
            .node(id)
            .parent()
            .expect("created node has a parent");
        let parent_file = self.cache.file(parent).ok_or(FsError::IoError)?;
        let dir = parent_file.as_directory().ok_or(FsError::IoError)?;
        dir.insert(file_type, path.base()).await;
        Ok(())
    }

    async fn stat_file(&self, id: NodeId) -> FsResult<FileStat> {
        let file = self.cache.file(id).ok_or(FsError::IoError)?;
        file.status().await
    }

    async fn read_file(&self, id: NodeId, request: &mut FileSystemRequest) -> FsResult<u64> {
        let file = self.cache.file(id).ok_or(FsError::IoError)?;
        let n = file
            .read(
                &mut request.buffer,
                request.message.size,
                request.message.offset,
            )
            .await?;
        if request.buffer.count() > 0 {
            request.buffer.flush().await.map_err(|err| {
                error!(%err, "failed to copy read data to caller");
                FsError::IoError
            })?;
        }
        Ok(n)
    }

    async fn write_file(&self, id: NodeId, request: &mut FileSystemRequest) -> FsResult<u64> {
        if request.buffer.count() == 0 {
            request.buffer.buffered_read().await.map_err(|err| {
                error!(%err, "failed to copy write data from caller");
                FsError::IoError
            })?;
        }
        let file = self.cache.file(id).ok_or(FsError::IoError)?;
        file.write(
            &mut request.buffer,
            request.message.size,
            request.message.offset,
        )
        .await
    }

    fn mount_handler(&self, message: &FileSystemMessage) -> FileSystemResponse {
        let path = match path::decode(&message.path) {
            Ok(p) => p,
            Err(err) => {
                error!(from = %message.from, "failed to decode mount path");
                return FileSystemResponse::new(message.from, err.into());
            }
        };
        match &self.role {
            ServerRole::Root(writer) => {
                let result = writer.register(path, message.from);
                FileSystemResponse::new(message.from, result.into())
            }
            // Mount registrations belong to the root instance.
            ServerRole::Member(_) => {
                FileSystemResponse::new(message.from, ResultCode::NotSupported)
            }
        }
    }

    async fn get_file_systems_handler(&self, message: &FileSystemMessage) -> FileSystemResponse {
        let ServerRole::Root(writer) = &self.role else {
            return FileSystemResponse::new(message.from, ResultCode::IoError);
        };
        let snapshot = match writer.store().snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => return FileSystemResponse::new(message.from, err.into()),
        };
        let bytes = match postcard::to_allocvec(&snapshot) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(%err, "mount table encode failed");
                return FileSystemResponse::new(message.from, ResultCode::IoError);
            }
        };

        let count = bytes.len().min(message.size as usize);
        match self.transport.copy_to(message.from, &bytes[..count]).await {
            Ok(()) => FileSystemResponse::new(message.from, ResultCode::Success)
                .with_size(count as u64),
            Err(err) => {
                error!(%err, "failed to copy mount table");
                FileSystemResponse::new(message.from, ResultCode::IoError)
            }
        }
    }

    async fn send_response(&self, response: FileSystemResponse) {
        if let Err(err) = self.transport.send_response(response).await {
            error!(%err, "failed to send response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{Directory, DirectoryOps};
    use crate::mounts::MountStore;
    use crate::transport::LoopbackTransport;
    use async_trait::async_trait;

    struct StaticMountClient(ResultCode);

    #[async_trait]
    impl MountClient for StaticMountClient {
        async fn mount_filesystem(&self, _path: &str) -> ResultCode {
            self.0
        }
    }

    fn member_server(verdict: ResultCode) -> FileSystemServer {
        let transport = Arc::new(LoopbackTransport::new());
        let client = Arc::new(StaticMountClient(verdict));
        FileSystemServer::new(
            Arc::new(Directory::new()),
            ServerConfig::member("/tmp", ProcessId(8), transport, client),
        )
    }

    #[tokio::test]
    async fn member_mount_propagates_client_verdict() {
        let mut server = member_server(ResultCode::Success);
        assert_eq!(server.mount().await, ResultCode::Success);

        let mut server = member_server(ResultCode::IoError);
        assert_eq!(server.mount().await, ResultCode::IoError);
    }

    #[tokio::test]
    async fn root_mount_claims_and_zeroes_the_table() {
        let (store, writer) = MountStore::new();
        writer.register("/stale", ProcessId(2)).unwrap();

        let transport = Arc::new(LoopbackTransport::new());
        let mut server = FileSystemServer::new(
            Arc::new(Directory::new()),
            ServerConfig::root(ProcessId(1), transport, writer),
        );
        assert_eq!(server.mount().await, ResultCode::Success);
        assert_eq!(store.active(), 0);
    }

    #[tokio::test]
    async fn member_rejects_mount_registration_messages() {
        let transport = Arc::new(LoopbackTransport::new());
        let client = Arc::new(StaticMountClient(ResultCode::Success));
        let mut server = FileSystemServer::new(
            Arc::new(Directory::new()),
            ServerConfig::member("/tmp", ProcessId(8), transport.clone(), client),
        );

        server
            .handle(FileSystemMessage::new(
                ProcessId(3),
                FileAction::MountFileSystem,
                b"/dev",
            ))
            .await;

        let responses = transport.take_responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].result, ResultCode::NotSupported);
    }

    #[tokio::test]
    async fn register_file_is_visible_to_stat() {
        let transport = Arc::new(LoopbackTransport::new());
        let client = Arc::new(StaticMountClient(ResultCode::Success));
        let root_dir = Arc::new(Directory::new());
        let mut server = FileSystemServer::new(
            root_dir.clone(),
            ServerConfig::member("/tmp", ProcessId(8), transport.clone(), client),
        );

        server
            .register_file(
                Arc::new(crate::file::PseudoFile::with_contents(b"fixed".to_vec())),
                "/motd",
            )
            .await
            .unwrap();
        assert_eq!(root_dir.entry_count().await, 1);

        server
            .handle(FileSystemMessage::new(
                ProcessId(3),
                FileAction::StatFile,
                b"/tmp/motd",
            ))
            .await;

        let responses = transport.take_responses();
        assert_eq!(responses[0].result, ResultCode::Success);
        assert_eq!(responses[0].stat.as_ref().unwrap().size, 5);
    }
}
