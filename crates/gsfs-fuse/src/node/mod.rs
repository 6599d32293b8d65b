//! The polymorphic node tree.
//!
//! Every element of the mounted hierarchy is a [`Node`] variant. Capability
//! traits split the surface: interior nodes bound to remote collections
//! implement [`Lookuper`]/[`Readdirer`], file leaves implement [`Opener`],
//! scaffold nodes implement [`OnAdder`] to declare their fixed children.
//! The kernel adapter dispatches through the enum; nodes hold no parent
//! pointers and no inode numbers.

pub mod dir;
pub mod domain;
pub mod domains;
pub mod file;
pub mod personal_drive;
pub mod root;
pub mod shared_drive;
pub mod shared_drives;
pub mod shared_files;
pub mod user;
pub mod users;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use gsfs_core::FsResult;
use gsfs_remote::{SharedDrive, User};

use crate::handle::FileHandle;

pub use dir::DirectoryNode;
pub use domain::DomainNode;
pub use domains::DomainsNode;
pub use file::FileNode;
pub use personal_drive::PersonalDriveNode;
pub use root::RootNode;
pub use shared_drive::SharedDriveNode;
pub use shared_drives::SharedDrivesNode;
pub use shared_files::SharedFilesNode;
pub use user::UserNode;
pub use users::UsersNode;

/// What a directory entry is, as shown to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    RegularFile,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Node-derived attributes, before the adapter stamps inode and ownership.
#[derive(Debug, Clone, Copy)]
pub struct NodeAttr {
    pub kind: EntryKind,
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl NodeAttr {
    pub fn directory_at(time: SystemTime) -> Self {
        NodeAttr {
            kind: EntryKind::Directory,
            size: 0,
            atime: time,
            mtime: time,
            ctime: time,
        }
    }
}

/// The axis a drive listing ranges over: one user's personal drive, or one
/// shared drive.
#[derive(Debug, Clone)]
pub enum Scope {
    User(Arc<User>),
    Drive(Arc<SharedDrive>),
}

impl Scope {
    /// The identity remote calls are authorized as. Shared drives are
    /// queried as the administrator; personal drives as their owner.
    pub fn subject<'a>(&'a self, administrator: &'a str) -> &'a str {
        match self {
            Scope::User(user) => &user.primary_email,
            Scope::Drive(_) => administrator,
        }
    }
}

#[async_trait]
pub trait Lookuper {
    async fn lookup(&self, name: &str) -> FsResult<Node>;
}

#[async_trait]
pub trait Readdirer {
    async fn readdir(&self) -> FsResult<Vec<ChildEntry>>;
}

#[async_trait]
pub trait Getattrer {
    async fn getattr(&self) -> FsResult<NodeAttr>;
}

#[async_trait]
pub trait Opener {
    async fn open(&self, flags: u32) -> FsResult<FileHandle>;
}

/// Declares the fixed children a node pins for the lifetime of the mount.
pub trait OnAdder {
    fn on_add(&self) -> Vec<(String, Node)>;
}

#[derive(Debug)]
pub enum Node {
    Root(RootNode),
    Domains(DomainsNode),
    Domain(DomainNode),
    Users(UsersNode),
    User(UserNode),
    PersonalDrive(PersonalDriveNode),
    SharedFiles(SharedFilesNode),
    SharedDrives(SharedDrivesNode),
    SharedDrive(SharedDriveNode),
    Directory(DirectoryNode),
    File(FileNode),
}

impl Node {
    pub fn is_dir(&self) -> bool {
        !matches!(self, Node::File(_))
    }

    /// Resolve a child by name against the node's remote collection.
    /// `None` means the node has no lookup capability: its children, if
    /// any, are the fixed ones the adapter already registered.
    pub async fn lookup(&self, name: &str) -> FsResult<Option<Node>> {
        match self {
            Node::Domains(n) => n.lookup(name).await.map(Some),
            Node::Users(n) => n.lookup(name).await.map(Some),
            Node::SharedDrives(n) => n.lookup(name).await.map(Some),
            Node::Directory(n) => n.lookup(name).await.map(Some),
            _ => Ok(None),
        }
    }

    /// List the node's remote collection. `None` means the listing is the
    /// adapter-registered fixed children.
    pub async fn readdir(&self) -> FsResult<Option<Vec<ChildEntry>>> {
        match self {
            Node::Domains(n) => n.readdir().await.map(Some),
            Node::Users(n) => n.readdir().await.map(Some),
            Node::SharedDrives(n) => n.readdir().await.map(Some),
            Node::Directory(n) => n.readdir().await.map(Some),
            _ => Ok(None),
        }
    }

    /// Node-derived attributes. `None` means the adapter synthesizes plain
    /// directory attributes.
    pub async fn getattr(&self) -> FsResult<Option<NodeAttr>> {
        match self {
            Node::Directory(n) => n.getattr().await.map(Some),
            Node::File(n) => n.getattr().await.map(Some),
            _ => Ok(None),
        }
    }

    /// Open the node's content. `None` means the node is not a file.
    pub async fn open(&self, flags: u32) -> FsResult<Option<FileHandle>> {
        match self {
            Node::File(n) => n.open(flags).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Fixed children to pin when the node enters the tree.
    pub fn on_add(&self) -> Vec<(String, Node)> {
        match self {
            Node::Root(n) => n.on_add(),
            Node::Domain(n) => n.on_add(),
            Node::User(n) => n.on_add(),
            Node::PersonalDrive(n) => n.on_add(),
            Node::SharedFiles(n) => n.on_add(),
            Node::SharedDrive(n) => n.on_add(),
            _ => Vec::new(),
        }
    }
}
