//! Kernel adapter: binds the node tree to FUSE callbacks.
//!
//! The adapter owns the tree shape the nodes themselves do not track: an
//! inode table mapping each inode to its node, parent, name and registered
//! children. Scaffold children declared through `on_add` are persistent and
//! live for the whole mount; children created by lookup are ephemeral and
//! fall out of the table when the kernel forgets them.

use std::collections::HashMap;
use std::ffi::{CString, OsStr, OsString};
use std::io;
use std::num::NonZeroU32;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use fuse3::raw::prelude::*;
use fuse3::raw::{MountHandle, Session};
use fuse3::{Errno, FileType, MountOptions, Result};
use futures_util::stream;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use gsfs_core::FsError;

use crate::handle::FileHandle;
use crate::node::{EntryKind, Node, NodeAttr, RootNode};
use crate::FsConfig;

pub const DRIVER_NAME: &str = "gsuitefs";

/// Root inode number (always 1 in FUSE).
pub const ROOT_INODE: u64 = 1;

/// Kernel-side dentry/attr cache lifetime.
const ENTRY_TTL: Duration = Duration::from_secs(10);

/// Inode reported for readdir entries the table has not materialized.
const UNKNOWN_INODE: u64 = u64::MAX;

const PERM_FILE: u16 = 0o444; // r--r--r--
const PERM_DIR: u16 = 0o555; // r-xr-xr-x

struct NodeEntry {
    node: Arc<Node>,
    parent: u64,
    name: String,
    /// Persistent entries are pinned for the lifetime of the mount and
    /// survive kernel forgets.
    persistent: bool,
    nlookup: u64,
    children: HashMap<String, u64>,
}

pub struct GsuiteFs {
    config: Arc<FsConfig>,
    nodes: RwLock<HashMap<u64, NodeEntry>>,
    next_ino: AtomicU64,
    /// Open file handles: fh → descriptor over the cached copy.
    handles: Mutex<HashMap<u64, Arc<FileHandle>>>,
    next_fh: AtomicU64,
    uid: u32,
    gid: u32,
    mount_time: SystemTime,
}

impl GsuiteFs {
    pub fn new(root: RootNode) -> Self {
        let config = root.config();
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };

        let next_ino = AtomicU64::new(ROOT_INODE + 1);
        let root_node = Arc::new(Node::Root(root));
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_INODE,
            NodeEntry {
                node: Arc::clone(&root_node),
                parent: ROOT_INODE,
                name: "/".to_string(),
                persistent: true,
                nlookup: 0,
                children: HashMap::new(),
            },
        );
        Self::attach_scaffold(&mut nodes, &next_ino, ROOT_INODE, root_node);

        GsuiteFs {
            config,
            nodes: RwLock::new(nodes),
            next_ino,
            handles: Mutex::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
            uid,
            gid,
            mount_time: SystemTime::now(),
        }
    }

    /// Register `node`'s fixed children (and theirs, recursively) as
    /// persistent entries.
    fn attach_scaffold(
        nodes: &mut HashMap<u64, NodeEntry>,
        next_ino: &AtomicU64,
        ino: u64,
        node: Arc<Node>,
    ) {
        let mut pending = vec![(ino, node)];
        while let Some((parent_ino, parent_node)) = pending.pop() {
            for (name, child) in parent_node.on_add() {
                let child_ino = next_ino.fetch_add(1, Ordering::Relaxed);
                debug!(parent = parent_ino, ino = child_ino, name = %name, "attaching persistent node");
                let child = Arc::new(child);
                if let Some(parent) = nodes.get_mut(&parent_ino) {
                    parent.children.insert(name.clone(), child_ino);
                }
                nodes.insert(
                    child_ino,
                    NodeEntry {
                        node: Arc::clone(&child),
                        parent: parent_ino,
                        name,
                        persistent: true,
                        nlookup: 0,
                        children: HashMap::new(),
                    },
                );
                pending.push((child_ino, child));
            }
        }
    }

    fn remove_subtree(nodes: &mut HashMap<u64, NodeEntry>, ino: u64) {
        let Some(entry) = nodes.remove(&ino) else {
            return;
        };
        if let Some(parent) = nodes.get_mut(&entry.parent) {
            parent.children.remove(&entry.name);
        }
        let mut pending: Vec<u64> = entry.children.values().copied().collect();
        while let Some(child) = pending.pop() {
            if let Some(removed) = nodes.remove(&child) {
                pending.extend(removed.children.values().copied());
            }
        }
    }

    async fn node_of(&self, ino: u64) -> Result<Arc<Node>> {
        self.nodes
            .read()
            .await
            .get(&ino)
            .map(|entry| Arc::clone(&entry.node))
            .ok_or_else(|| Errno::from(libc::ENOENT))
    }

    /// Resolve `name` under `parent`: registered children first, then the
    /// node's own lookup, registering the ephemeral result.
    async fn do_lookup(&self, parent: u64, name: &str) -> std::result::Result<(u64, Arc<Node>), FsError> {
        {
            let mut nodes = self.nodes.write().await;
            let entry = nodes.get(&parent).ok_or(FsError::NotFound)?;
            if let Some(&child_ino) = entry.children.get(name) {
                if let Some(child) = nodes.get_mut(&child_ino) {
                    child.nlookup += 1;
                    return Ok((child_ino, Arc::clone(&child.node)));
                }
            }
        }

        let parent_node = {
            self.nodes
                .read()
                .await
                .get(&parent)
                .map(|entry| Arc::clone(&entry.node))
                .ok_or(FsError::NotFound)?
        };
        if !parent_node.is_dir() {
            return Err(FsError::Io(io::Error::from_raw_os_error(libc::ENOTDIR)));
        }

        let child = parent_node.lookup(name).await?.ok_or(FsError::NotFound)?;

        let mut nodes = self.nodes.write().await;
        if let Some(&existing) = nodes
            .get(&parent)
            .ok_or(FsError::NotFound)?
            .children
            .get(name)
        {
            // Raced with a concurrent lookup of the same name.
            if let Some(entry) = nodes.get_mut(&existing) {
                entry.nlookup += 1;
                return Ok((existing, Arc::clone(&entry.node)));
            }
        }

        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed);
        let node = Arc::new(child);
        nodes
            .get_mut(&parent)
            .ok_or(FsError::NotFound)?
            .children
            .insert(name.to_string(), ino);
        nodes.insert(
            ino,
            NodeEntry {
                node: Arc::clone(&node),
                parent,
                name: name.to_string(),
                persistent: false,
                nlookup: 1,
                children: HashMap::new(),
            },
        );
        Self::attach_scaffold(&mut nodes, &self.next_ino, ino, Arc::clone(&node));
        Ok((ino, node))
    }

    async fn node_attr(&self, node: &Node) -> std::result::Result<NodeAttr, FsError> {
        Ok(node
            .getattr()
            .await?
            .unwrap_or_else(|| NodeAttr::directory_at(self.mount_time)))
    }

    fn file_attr(&self, ino: u64, attr: &NodeAttr) -> FileAttr {
        let (kind, perm, nlink, blocks) = match attr.kind {
            EntryKind::Directory => (FileType::Directory, PERM_DIR, 2, 0),
            EntryKind::RegularFile => (FileType::RegularFile, PERM_FILE, 1, attr.size.div_ceil(512)),
        };
        FileAttr {
            ino,
            size: attr.size,
            blocks,
            atime: attr.atime.into(),
            mtime: attr.mtime.into(),
            ctime: attr.ctime.into(),
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 4096,
        }
    }

    fn attr_from_metadata(&self, ino: u64, metadata: &std::fs::Metadata) -> FileAttr {
        use std::os::unix::fs::MetadataExt;
        let mtime = metadata.modified().unwrap_or(self.mount_time);
        let ctime = SystemTime::UNIX_EPOCH
            + Duration::new(metadata.ctime().max(0) as u64, metadata.ctime_nsec() as u32);
        self.file_attr(
            ino,
            &NodeAttr {
                kind: EntryKind::RegularFile,
                size: metadata.len(),
                atime: metadata.accessed().unwrap_or(mtime),
                mtime,
                ctime,
            },
        )
    }

    fn errno(&self, err: FsError, action: &str) -> Errno {
        match &err {
            FsError::NotFound => debug!(action, "entry not found"),
            _ => warn!(action, error = %err, "operation failed"),
        }
        Errno::from(err.errno())
    }

    /// Listing of `parent`: either the node's remote collection or, for
    /// scaffold nodes, its registered children.
    async fn dir_entries(&self, parent: u64) -> std::result::Result<Vec<(String, EntryKind, u64)>, FsError> {
        let (node, children) = {
            let nodes = self.nodes.read().await;
            let entry = nodes.get(&parent).ok_or(FsError::NotFound)?;
            (Arc::clone(&entry.node), entry.children.clone())
        };

        match node.readdir().await? {
            Some(entries) => Ok(entries
                .into_iter()
                .map(|entry| {
                    let ino = children.get(&entry.name).copied().unwrap_or(UNKNOWN_INODE);
                    (entry.name, entry.kind, ino)
                })
                .collect()),
            None => {
                let nodes = self.nodes.read().await;
                let mut listed: Vec<(String, EntryKind, u64)> = children
                    .iter()
                    .map(|(name, &ino)| {
                        let kind = nodes
                            .get(&ino)
                            .map(|entry| {
                                if entry.node.is_dir() {
                                    EntryKind::Directory
                                } else {
                                    EntryKind::RegularFile
                                }
                            })
                            .unwrap_or(EntryKind::Directory);
                        (name.clone(), kind, ino)
                    })
                    .collect();
                listed.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(listed)
            }
        }
    }
}

impl Filesystem for GsuiteFs {
    type DirEntryStream<'a>
        = stream::Iter<std::vec::IntoIter<Result<DirectoryEntry>>>
    where
        Self: 'a;

    type DirEntryPlusStream<'a>
        = stream::Iter<std::vec::IntoIter<Result<DirectoryEntryPlus>>>
    where
        Self: 'a;

    async fn init(&self, _req: Request) -> Result<ReplyInit> {
        debug!(cache_path = %self.config.cache.path.display(), "gsuitefs init");
        Ok(ReplyInit {
            max_write: NonZeroU32::new(128 * 1024).unwrap(),
        })
    }

    async fn destroy(&self, _req: Request) {
        info!("gsuitefs unmounted");
    }

    async fn lookup(&self, _req: Request, parent: u64, name: &OsStr) -> Result<ReplyEntry> {
        let name = name.to_str().ok_or_else(|| Errno::from(libc::ENOENT))?;

        let (ino, node) = self
            .do_lookup(parent, name)
            .await
            .map_err(|e| self.errno(e, "lookup"))?;
        let attr = self
            .node_attr(&node)
            .await
            .map_err(|e| self.errno(e, "lookup"))?;

        Ok(ReplyEntry {
            ttl: ENTRY_TTL,
            attr: self.file_attr(ino, &attr),
            generation: 0,
        })
    }

    async fn forget(&self, _req: Request, inode: u64, nlookup: u64) {
        let mut nodes = self.nodes.write().await;
        let remove = match nodes.get_mut(&inode) {
            Some(entry) => {
                entry.nlookup = entry.nlookup.saturating_sub(nlookup);
                entry.nlookup == 0 && !entry.persistent
            }
            None => false,
        };
        if remove {
            Self::remove_subtree(&mut nodes, inode);
        }
    }

    async fn getattr(
        &self,
        _req: Request,
        inode: u64,
        fh: Option<u64>,
        _flags: u32,
    ) -> Result<ReplyAttr> {
        // A live handle knows the cached copy better than the node does.
        if let Some(fh) = fh {
            let handle = self.handles.lock().await.get(&fh).map(Arc::clone);
            if let Some(handle) = handle {
                let metadata = tokio::task::spawn_blocking(move || handle.metadata())
                    .await
                    .map_err(|_| Errno::from(libc::EIO))?
                    .map_err(|e| self.errno(e.into(), "getattr"))?;
                return Ok(ReplyAttr {
                    ttl: ENTRY_TTL,
                    attr: self.attr_from_metadata(inode, &metadata),
                });
            }
        }

        let node = self.node_of(inode).await?;
        let attr = self
            .node_attr(&node)
            .await
            .map_err(|e| self.errno(e, "getattr"))?;
        Ok(ReplyAttr {
            ttl: ENTRY_TTL,
            attr: self.file_attr(inode, &attr),
        })
    }

    async fn open(&self, _req: Request, inode: u64, flags: u32) -> Result<ReplyOpen> {
        let node = self.node_of(inode).await?;
        let handle = node
            .open(flags)
            .await
            .map_err(|e| self.errno(e, "open"))?
            .ok_or_else(|| Errno::from(libc::EISDIR))?;

        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        self.handles.lock().await.insert(fh, Arc::new(handle));
        Ok(ReplyOpen { fh, flags: 0 })
    }

    async fn read(
        &self,
        _req: Request,
        _inode: u64,
        fh: u64,
        offset: u64,
        size: u32,
    ) -> Result<ReplyData> {
        let handle = self
            .handles
            .lock()
            .await
            .get(&fh)
            .map(Arc::clone)
            .ok_or_else(|| Errno::from(libc::EBADF))?;

        let data = tokio::task::spawn_blocking(move || handle.read_at(offset, size))
            .await
            .map_err(|_| Errno::from(libc::EIO))?
            .map_err(|e| self.errno(e.into(), "read"))?;
        Ok(ReplyData { data })
    }

    async fn release(
        &self,
        _req: Request,
        _inode: u64,
        fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> Result<()> {
        self.handles.lock().await.remove(&fh);
        Ok(())
    }

    async fn opendir(&self, _req: Request, inode: u64, _flags: u32) -> Result<ReplyOpen> {
        let node = self.node_of(inode).await?;
        if !node.is_dir() {
            return Err(Errno::from(libc::ENOTDIR));
        }
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    async fn readdir<'a>(
        &'a self,
        _req: Request,
        parent: u64,
        _fh: u64,
        offset: i64,
    ) -> Result<ReplyDirectory<Self::DirEntryStream<'a>>> {
        let listed = self
            .dir_entries(parent)
            .await
            .map_err(|e| self.errno(e, "readdir"))?;
        let parent_of = {
            self.nodes
                .read()
                .await
                .get(&parent)
                .map(|entry| entry.parent)
                .unwrap_or(ROOT_INODE)
        };

        let mut entries: Vec<Result<DirectoryEntry>> = Vec::new();
        if offset == 0 {
            entries.push(Ok(DirectoryEntry {
                inode: parent,
                kind: FileType::Directory,
                name: ".".into(),
                offset: 1,
            }));
        }
        if offset <= 1 {
            entries.push(Ok(DirectoryEntry {
                inode: parent_of,
                kind: FileType::Directory,
                name: "..".into(),
                offset: 2,
            }));
        }

        let mut next_offset = 3i64;
        for (name, kind, ino) in listed {
            if next_offset > offset {
                entries.push(Ok(DirectoryEntry {
                    inode: ino,
                    kind: file_type(kind),
                    name: OsString::from(name),
                    offset: next_offset,
                }));
            }
            next_offset += 1;
        }

        Ok(ReplyDirectory {
            entries: stream::iter(entries),
        })
    }

    async fn readdirplus<'a>(
        &'a self,
        _req: Request,
        parent: u64,
        _fh: u64,
        offset: u64,
        _lock_owner: u64,
    ) -> Result<ReplyDirectoryPlus<Self::DirEntryPlusStream<'a>>> {
        let listed = self
            .dir_entries(parent)
            .await
            .map_err(|e| self.errno(e, "readdirplus"))?;
        let parent_of = {
            self.nodes
                .read()
                .await
                .get(&parent)
                .map(|entry| entry.parent)
                .unwrap_or(ROOT_INODE)
        };
        let dir_attr = NodeAttr::directory_at(self.mount_time);

        let mut entries: Vec<Result<DirectoryEntryPlus>> = Vec::new();
        if offset == 0 {
            entries.push(Ok(DirectoryEntryPlus {
                inode: parent,
                generation: 0,
                kind: FileType::Directory,
                name: ".".into(),
                offset: 1,
                attr: self.file_attr(parent, &dir_attr),
                entry_ttl: ENTRY_TTL,
                attr_ttl: ENTRY_TTL,
            }));
        }
        if offset <= 1 {
            entries.push(Ok(DirectoryEntryPlus {
                inode: parent_of,
                generation: 0,
                kind: FileType::Directory,
                name: "..".into(),
                offset: 2,
                attr: self.file_attr(parent_of, &dir_attr),
                entry_ttl: ENTRY_TTL,
                attr_ttl: ENTRY_TTL,
            }));
        }

        let mut next_offset = 3i64;
        for (name, kind, _) in listed {
            if next_offset as u64 > offset {
                // Resolving through the adapter serves from the lookup
                // cache the listing just primed, without a remote call.
                match self.do_lookup(parent, &name).await {
                    Ok((ino, node)) => {
                        let attr = self.node_attr(&node).await.unwrap_or(dir_attr);
                        entries.push(Ok(DirectoryEntryPlus {
                            inode: ino,
                            generation: 0,
                            kind: file_type(kind),
                            name: OsString::from(name),
                            offset: next_offset,
                            attr: self.file_attr(ino, &attr),
                            entry_ttl: ENTRY_TTL,
                            attr_ttl: ENTRY_TTL,
                        }));
                    }
                    // Entry vanished between the listing and now.
                    Err(_) => {}
                }
            }
            next_offset += 1;
        }

        Ok(ReplyDirectoryPlus {
            entries: stream::iter(entries),
        })
    }

    async fn getxattr(
        &self,
        _req: Request,
        inode: u64,
        name: &OsStr,
        size: u32,
    ) -> Result<ReplyXAttr> {
        let node = self.node_of(inode).await?;
        let Node::File(file) = node.as_ref() else {
            return Err(Errno::from(libc::ENODATA));
        };

        let path = file.cache_path();
        let name = name.to_os_string();
        tokio::task::spawn_blocking(move || xattr_get(&path, &name, size))
            .await
            .map_err(|_| Errno::from(libc::EIO))?
    }

    async fn statfs(&self, _req: Request, _inode: u64) -> Result<ReplyStatFs> {
        Ok(ReplyStatFs {
            blocks: 1 << 30,
            bfree: 1 << 29,
            bavail: 1 << 29,
            files: 1 << 20,
            ffree: 1 << 19,
            bsize: 4096,
            namelen: 255,
            frsize: 4096,
        })
    }
}

fn file_type(kind: EntryKind) -> FileType {
    match kind {
        EntryKind::Directory => FileType::Directory,
        EntryKind::RegularFile => FileType::RegularFile,
    }
}

/// Pass an xattr read through to the cached copy, symlink-aware.
fn xattr_get(path: &Path, name: &OsStr, size: u32) -> Result<ReplyXAttr> {
    let c_path =
        CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::from(libc::EINVAL))?;
    let c_name = CString::new(name.as_bytes()).map_err(|_| Errno::from(libc::EINVAL))?;

    if size == 0 {
        let len = unsafe { libc::lgetxattr(c_path.as_ptr(), c_name.as_ptr(), std::ptr::null_mut(), 0) };
        if len < 0 {
            return Err(last_errno());
        }
        return Ok(ReplyXAttr::Size(len as u32));
    }

    let mut buf = vec![0u8; size as usize];
    let len = unsafe {
        libc::lgetxattr(
            c_path.as_ptr(),
            c_name.as_ptr(),
            buf.as_mut_ptr().cast(),
            buf.len(),
        )
    };
    if len < 0 {
        return Err(last_errno());
    }
    buf.truncate(len as usize);
    Ok(ReplyXAttr::Data(Bytes::from(buf)))
}

fn last_errno() -> Errno {
    Errno::from(
        io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or(libc::EIO),
    )
}

/// Mount the filesystem and return the session handle. Await the handle to
/// block until unmount (`fusermount3 -u <mountpoint>`).
pub async fn mount(root: RootNode, mountpoint: &Path) -> io::Result<MountHandle> {
    let fs = GsuiteFs::new(root);

    let mut opts = MountOptions::default();
    opts.fs_name(mountpoint.display().to_string());
    opts.custom_options(format!("subtype={DRIVER_NAME}"));
    opts.uid(fs.uid);
    opts.gid(fs.gid);
    opts.read_only(true);

    info!(mountpoint = %mountpoint.display(), "mounting gsuitefs (unprivileged via fusermount3)");

    Session::new(opts).mount_with_unprivileged(fs, mountpoint).await
}
