//! kurafs-server: the in-process virtual filesystem server.
//!
//! Every filesystem provider of the system embeds one [`FileSystemServer`].
//! It receives path-based operations over a message channel, resolves them
//! against a lazily-populated cache tree, routes across the shared mount
//! table when it is the root instance, and defers not-ready operations
//! through an explicit retry queue instead of blocking.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     FileSystemServer                          │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────┐   │
//! │  │  FileCache  │  │  MountStore  │  │   RequestQueue     │   │
//! │  │ (path tree) │  │ (redirects,  │  │ (parked requests)  │   │
//! │  │             │  │  root only)  │  │                    │   │
//! │  └─────────────┘  └──────────────┘  └────────────────────┘   │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  Arc<dyn VfsFile>  — concrete files (Directory, PseudoFile)  │
//! └──────────────────────────────────────────────────────────────┘
//!          ▲                                    │
//!   inbound messages                     responses + wakeups
//!          └────────── dyn Transport ───────────┘
//! ```
//!
//! A request that cannot complete yet yields `RetryAgain`; the server parks
//! it and the external driver calls [`FileSystemServer::retry_requests`]
//! whenever a condition that might unblock parked requests changes.

pub mod buffer;
pub mod cache;
pub mod file;
pub mod mounts;
pub mod path;
pub mod queue;
pub mod server;
pub mod tmp;
pub mod transport;

pub use buffer::IoBuffer;
pub use cache::{CacheNode, FileCache, NodeId};
pub use file::{Directory, DirectoryOps, PseudoFile, VfsFile};
pub use mounts::{MountClient, MountStore, MountWriter};
pub use path::FileSystemPath;
pub use queue::{FileSystemRequest, RequestQueue};
pub use server::{FileFactory, FileSystemServer, ServerConfig, ServerRole};
pub use tmp::{tmp_server, TmpFileFactory};
pub use transport::{LoopbackTransport, Transport, TransportError};
