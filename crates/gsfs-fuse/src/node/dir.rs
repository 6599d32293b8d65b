//! One drive folder, scoped to a personal drive or a shared drive.
//!
//! A node with no bound directory record is the root of its scope. Listing
//! and lookup go through `files.list` with a predicate built from the
//! node's state; a successful readdir primes the lookup cache with every
//! listed file, so entries it returned resolve without another round trip
//! for as long as the TTL holds.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::{debug, error};

use gsfs_core::{FsError, FsResult};
use gsfs_remote::{DriveFile, DriveService, FileListCall, ListCorpus, SharedDrive, User, FOLDER_MIME_TYPE};

use super::{ChildEntry, EntryKind, FileNode, Getattrer, Lookuper, Node, NodeAttr, Readdirer, Scope};
use crate::ttl_cache::TtlCache;
use crate::FsConfig;

const READDIR_PAGE_SIZE: u32 = 1_000;
const LOOKUP_PAGE_SIZE: u32 = 10;

#[derive(Debug)]
pub struct DirectoryNode {
    config: Arc<FsConfig>,
    scope: Scope,
    trashed: bool,
    /// List files shared with the scope user instead of a folder's
    /// children. Only meaningful at the scope root.
    shared_with_me: bool,
    /// The bound folder record. `None` marks the root of the scope.
    directory: Option<Arc<DriveFile>>,
    lookup_cache: TtlCache<String, Arc<DriveFile>>,
    readdir_cache: TtlCache<(), Arc<Vec<ChildEntry>>>,
}

impl DirectoryNode {
    /// Root of a user's personal drive partition.
    pub fn personal(config: Arc<FsConfig>, user: Arc<User>, trashed: bool) -> Self {
        Self::with_state(config, Scope::User(user), trashed, false, None)
    }

    /// Root of a shared drive partition.
    pub fn shared(config: Arc<FsConfig>, drive: Arc<SharedDrive>, trashed: bool) -> Self {
        Self::with_state(config, Scope::Drive(drive), trashed, false, None)
    }

    /// Root of a user's shared-with-me listing.
    pub fn shared_with_me(config: Arc<FsConfig>, user: Arc<User>) -> Self {
        Self::with_state(config, Scope::User(user), false, true, None)
    }

    fn with_state(
        config: Arc<FsConfig>,
        scope: Scope,
        trashed: bool,
        shared_with_me: bool,
        directory: Option<Arc<DriveFile>>,
    ) -> Self {
        DirectoryNode {
            config,
            scope,
            trashed,
            shared_with_me,
            directory,
            lookup_cache: TtlCache::new(),
            readdir_cache: TtlCache::new(),
        }
    }

    fn subject(&self) -> &str {
        self.scope.subject(&self.config.administrator_subject)
    }

    async fn service(&self) -> FsResult<DriveService> {
        let client = self.config.provider.client(self.subject()).await?;
        Ok(DriveService::new(client))
    }

    /// Parent id the listing predicate filters on.
    fn parent_id(&self) -> &str {
        match &self.directory {
            Some(directory) => &directory.id,
            None => match &self.scope {
                Scope::User(_) => "root",
                Scope::Drive(drive) => &drive.id,
            },
        }
    }

    /// The `files.list` query predicate for this node, optionally narrowed
    /// to a single name.
    pub fn list_query(&self, name: Option<&str>) -> String {
        let mut query = if self.shared_with_me && self.directory.is_none() {
            format!("trashed={} and sharedWithMe", self.trashed)
        } else {
            format!(
                "trashed={} and '{}' in parents",
                self.trashed,
                escape_query_value(self.parent_id())
            )
        };
        if let Some(name) = name {
            query.push_str(&format!(" and name = '{}'", escape_query_value(name)));
        }
        query
    }

    fn list_call(&self, name: Option<&str>, page_size: u32, page_token: Option<String>) -> FileListCall {
        FileListCall {
            corpus: match self.scope {
                Scope::User(_) => ListCorpus::User,
                Scope::Drive(_) => ListCorpus::Drive,
            },
            drive_id: match &self.scope {
                Scope::Drive(drive) => Some(drive.id.clone()),
                Scope::User(_) => None,
            },
            query: self.list_query(name),
            page_size,
            page_token,
        }
    }

    fn child_node(&self, file: Arc<DriveFile>) -> Node {
        if file.mime_type == FOLDER_MIME_TYPE {
            Node::Directory(Self::with_state(
                Arc::clone(&self.config),
                self.scope.clone(),
                self.trashed,
                self.shared_with_me,
                Some(file),
            ))
        } else {
            Node::File(FileNode::new(
                Arc::clone(&self.config),
                self.scope.clone(),
                self.trashed,
                file,
            ))
        }
    }
}

#[async_trait]
impl Lookuper for DirectoryNode {
    async fn lookup(&self, name: &str) -> FsResult<Node> {
        let file = match self.lookup_cache.load(&name.to_string()) {
            Some(file) => {
                debug!(name, "using cached lookup entry");
                file
            }
            None => {
                let service = self.service().await?;
                let call = self.list_call(Some(name), LOOKUP_PAGE_SIZE, None);
                debug!(name, query = %call.query, "pulling file list");
                let page = service.list_files(&call).await.map_err(|e| {
                    error!(name, error = %e, "failed to pull file list");
                    FsError::from(e)
                })?;

                let Some(file) = page.files.into_iter().next() else {
                    debug!(name, "file not found");
                    return Err(FsError::NotFound);
                };
                let file = Arc::new(file);
                self.lookup_cache.store(
                    name.to_string(),
                    Arc::clone(&file),
                    self.config.cache.expiration,
                );
                file
            }
        };

        Ok(self.child_node(file))
    }
}

#[async_trait]
impl Readdirer for DirectoryNode {
    async fn readdir(&self) -> FsResult<Vec<ChildEntry>> {
        if let Some(entries) = self.readdir_cache.load(&()) {
            debug!("using cached file list");
            return Ok(entries.as_ref().clone());
        }

        let service = self.service().await?;
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let call = self.list_call(None, READDIR_PAGE_SIZE, page_token.take());
            let page = service.list_files(&call).await.map_err(|e| {
                error!(error = %e, "failed to retrieve files");
                FsError::from(e)
            })?;
            debug!(page_length = page.files.len(), "retrieved page");

            for file in page.files {
                debug!(name = %file.name, "found file or directory");
                let kind = if file.mime_type == FOLDER_MIME_TYPE {
                    EntryKind::Directory
                } else {
                    EntryKind::RegularFile
                };
                let name = file.name.clone();
                self.lookup_cache.store(
                    name.clone(),
                    Arc::new(file),
                    self.config.cache.expiration,
                );
                entries.push(ChildEntry { name, kind });
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        self.readdir_cache.store(
            (),
            Arc::new(entries.clone()),
            self.config.cache.expiration,
        );
        Ok(entries)
    }
}

#[async_trait]
impl Getattrer for DirectoryNode {
    async fn getattr(&self) -> FsResult<NodeAttr> {
        match &self.directory {
            Some(directory) => Ok(NodeAttr {
                kind: EntryKind::Directory,
                size: 0,
                atime: directory.modified_time.into(),
                mtime: directory.modified_time.into(),
                ctime: directory.created_time.into(),
            }),
            None => Ok(NodeAttr::directory_at(SystemTime::now())),
        }
    }
}

/// Escape a value for interpolation into a single-quoted query clause.
/// The remote's query grammar escapes with backslashes.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsfs_remote::{ClientProvider, HttpTransport, TransportError};
    use std::path::PathBuf;
    use std::time::Duration;

    struct NoProvider;

    #[async_trait]
    impl ClientProvider for NoProvider {
        async fn client(&self, _subject: &str) -> Result<Arc<dyn HttpTransport>, TransportError> {
            Err(TransportError::Request("no remote in this test".into()))
        }
    }

    fn test_config() -> Arc<FsConfig> {
        Arc::new(FsConfig {
            cache: gsfs_core::CacheConfig {
                path: PathBuf::from("/tmp/gsuitefs-test"),
                expiration: Duration::from_secs(60),
            },
            administrator_subject: "admin@example.com".into(),
            include: Default::default(),
            provider: Arc::new(NoProvider),
        })
    }

    fn drive(id: &str) -> Arc<SharedDrive> {
        Arc::new(SharedDrive {
            id: id.into(),
            name: "Team".into(),
        })
    }

    fn user(email: &str) -> Arc<User> {
        Arc::new(User {
            primary_email: email.into(),
        })
    }

    #[test]
    fn query_for_trashed_parent_and_name() {
        let node = DirectoryNode::shared(test_config(), drive("X"), true);
        assert_eq!(
            node.list_query(Some("Y")),
            "trashed=true and 'X' in parents and name = 'Y'"
        );
    }

    #[test]
    fn query_for_personal_scope_root() {
        let node = DirectoryNode::personal(test_config(), user("a@acme.com"), false);
        assert_eq!(node.list_query(None), "trashed=false and 'root' in parents");
    }

    #[test]
    fn query_escapes_quotes_and_backslashes() {
        let node = DirectoryNode::personal(test_config(), user("a@acme.com"), false);
        assert_eq!(
            node.list_query(Some("it's a file\\name")),
            r"trashed=false and 'root' in parents and name = 'it\'s a file\\name'"
        );
    }

    #[test]
    fn query_for_shared_with_me_root() {
        let node = DirectoryNode::shared_with_me(test_config(), user("a@acme.com"));
        assert_eq!(node.list_query(None), "trashed=false and sharedWithMe");
    }

    #[test]
    fn drive_scope_sets_corpus_and_drive_id() {
        let node = DirectoryNode::shared(test_config(), drive("d9"), false);
        let call = node.list_call(None, 1000, None);
        assert_eq!(call.corpus, ListCorpus::Drive);
        assert_eq!(call.drive_id.as_deref(), Some("d9"));
        assert_eq!(call.query, "trashed=false and 'd9' in parents");
    }

    #[test]
    fn user_scope_has_no_drive_id() {
        let node = DirectoryNode::personal(test_config(), user("a@acme.com"), false);
        let call = node.list_call(None, 1000, None);
        assert_eq!(call.corpus, ListCorpus::User);
        assert!(call.drive_id.is_none());
    }
}
