//! The path cache tree.
//!
//! Every path segment this instance has resolved at least once is a
//! [`CacheNode`] holding the file handle, a back-reference to its parent,
//! and its resolved children by name. Nodes live in an arena and refer to
//! each other by [`NodeId`], so teardown is a bottom-up sweep over stable
//! indices rather than recursive pointer chasing.
//!
//! Absence of a child never implies absence of the underlying entry: the
//! tree only mirrors the part of the namespace that has been touched.
//! [`FileCache::lookup`] is the single growth path; [`FileCache::find`]
//! never mutates.

use std::collections::HashMap;
use std::sync::Arc;

use kurafs_types::{FsError, FsResult};

use crate::file::{DirectoryOps, VfsFile};
use crate::path::FileSystemPath;

/// Stable handle to a node in the cache arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// One resolved path segment.
pub struct CacheNode {
    file: Option<Arc<dyn VfsFile>>,
    name: String,
    parent: Option<NodeId>,
    children: HashMap<String, NodeId>,
}

impl CacheNode {
    /// The file handle, absent only transiently during teardown.
    pub fn file(&self) -> Option<&Arc<dyn VfsFile>> {
        self.file.as_ref()
    }

    /// The path segment this node represents.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Back-reference to the enclosing node, absent for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Resolved children by name.
    pub fn children(&self) -> &HashMap<String, NodeId> {
        &self.children
    }
}

/// Arena-backed cache tree rooted at the server's mount point.
pub struct FileCache {
    nodes: Vec<Option<CacheNode>>,
    free: Vec<usize>,
    root: NodeId,
}

impl FileCache {
    /// Build a cache around the root directory file. The root's `"."` and
    /// `".."` entries resolve to the root itself, so they alias its file
    /// handle.
    pub fn new(root_file: Arc<dyn VfsFile>, mount_path: &str) -> Self {
        let mut cache = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeId(0),
        };
        cache.root = cache.alloc(CacheNode {
            file: Some(root_file.clone()),
            name: mount_path.to_string(),
            parent: None,
            children: HashMap::new(),
        });
        cache.attach(cache.root, ".", root_file.clone());
        cache.attach(cache.root, "..", root_file);
        cache
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Access a node. The id must be live.
    pub fn node(&self, id: NodeId) -> &CacheNode {
        self.nodes[id.0].as_ref().expect("stale cache node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut CacheNode {
        self.nodes[id.0].as_mut().expect("stale cache node id")
    }

    /// Clone of a node's file handle.
    pub fn file(&self, id: NodeId) -> Option<Arc<dyn VfsFile>> {
        self.node(id).file.clone()
    }

    /// Number of live nodes, including the root.
    pub fn live_nodes(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Side-effect-free descent following existing children only. The empty
    /// path resolves to the root.
    pub fn find(&self, path: &FileSystemPath) -> Option<NodeId> {
        let mut current = self.root;
        for name in path.components() {
            current = *self.node(current).children.get(name)?;
        }
        Some(current)
    }

    /// Like [`find`](Self::find), but a missing component is fetched from
    /// the concrete directory file of the node above it and inserted into
    /// the tree. Fails when the current node is not a directory or the
    /// underlying lookup yields nothing. This is the only way the tree
    /// grows on a miss.
    pub async fn lookup(&mut self, path: &FileSystemPath) -> Option<NodeId> {
        let mut current = self.root;
        for name in path.components() {
            if let Some(&child) = self.node(current).children.get(name) {
                current = child;
                continue;
            }
            let file = self.file(current)?;
            if !file.file_type().is_directory() {
                return None;
            }
            let fetched = file.as_directory()?.lookup(name).await?;
            current = self.attach(current, name, fetched);
        }
        Some(current)
    }

    /// Attach a new node for `file` under the node identified by the path's
    /// parent. The parent must already be cached and hold a directory file.
    /// Registering the entry in the parent directory's own table is the
    /// dispatch layer's job, not the cache's.
    pub fn insert(&mut self, file: Arc<dyn VfsFile>, path: &FileSystemPath) -> FsResult<NodeId> {
        if path.is_root() {
            return Err(FsError::AlreadyExists);
        }
        let parent = self.find(&path.parent()).ok_or(FsError::NotFound)?;
        let parent_node = self.node(parent);
        let parent_is_dir = parent_node
            .file
            .as_ref()
            .is_some_and(|f| f.file_type().is_directory());
        if !parent_is_dir {
            return Err(FsError::NotSupported);
        }
        if parent_node.children.contains_key(path.base()) {
            return Err(FsError::AlreadyExists);
        }
        Ok(self.attach(parent, path.base(), file))
    }

    /// Tear down a subtree. Descendants aliasing the cleared node's file
    /// handle are detached first, then children are destroyed bottom-up,
    /// each removed from its parent's child map and from the parent
    /// directory's entry table. A node must have an empty child map by the
    /// time it is destroyed.
    pub async fn clear(&mut self, id: NodeId) {
        self.detach_aliases(id).await;

        for nid in self.post_order(id) {
            let (name, parent) = {
                let node = self.node(nid);
                (node.name.clone(), node.parent)
            };
            if let Some(pid) = parent {
                if let Some(parent_file) = self.file(pid)
                    && let Some(dir) = parent_file.as_directory()
                {
                    dir.remove(&name).await;
                }
                self.node_mut(pid).children.remove(&name);
            }
            let node = self.nodes[nid.0].take().expect("stale cache node id");
            assert!(
                node.children.is_empty(),
                "cache node destroyed with live children"
            );
            self.free.push(nid.0);
        }
    }

    /// Drop the file handle of every descendant that aliases the file of
    /// `id`, removing its name from that directory's entry table. Duplicate
    /// aliasing is not supposed to happen outside the root's `"."`/`".."`
    /// entries, but teardown must not assume it cannot.
    async fn detach_aliases(&mut self, id: NodeId) {
        let Some(target) = self.file(id) else {
            return;
        };

        let mut aliased = Vec::new();
        let mut stack: Vec<NodeId> = self.node(id).children.values().copied().collect();
        while let Some(nid) = stack.pop() {
            let node = self.node(nid);
            if let Some(file) = &node.file
                && Arc::ptr_eq(file, &target)
            {
                aliased.push(nid);
            }
            stack.extend(node.children.values().copied());
        }

        for nid in aliased {
            let name = self.node(nid).name.clone();
            if let Some(dir) = target.as_directory() {
                dir.remove(&name).await;
            }
            self.node_mut(nid).file = None;
        }
    }

    fn attach(&mut self, parent: NodeId, name: &str, file: Arc<dyn VfsFile>) -> NodeId {
        let id = self.alloc(CacheNode {
            file: Some(file),
            name: name.to_string(),
            parent: Some(parent),
            children: HashMap::new(),
        });
        self.node_mut(parent).children.insert(name.to_string(), id);
        id
    }

    fn alloc(&mut self, node: CacheNode) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Descendants-first ordering of the subtree at `id`, `id` last.
    fn post_order(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((nid, expanded)) = stack.pop() {
            if expanded {
                order.push(nid);
                continue;
            }
            stack.push((nid, true));
            for &child in self.node(nid).children.values() {
                stack.push((child, false));
            }
        }
        order
    }
}
