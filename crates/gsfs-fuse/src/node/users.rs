//! Lists a domain's users by primary email.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use gsfs_core::{FsError, FsResult};
use gsfs_remote::{DirectoryService, Domain, User};

use super::{ChildEntry, EntryKind, Lookuper, Node, Readdirer, UserNode};
use crate::ignore::is_ignored;
use crate::ttl_cache::TtlCache;
use crate::FsConfig;

pub const NODE_NAME: &str = "users";

#[derive(Debug)]
pub struct UsersNode {
    config: Arc<FsConfig>,
    domain: Arc<Domain>,
    lookup_cache: TtlCache<String, Arc<User>>,
    readdir_cache: TtlCache<(), Arc<Vec<ChildEntry>>>,
}

impl UsersNode {
    pub fn new(config: Arc<FsConfig>, domain: Arc<Domain>) -> Self {
        UsersNode {
            config,
            domain,
            lookup_cache: TtlCache::new(),
            readdir_cache: TtlCache::new(),
        }
    }

    async fn service(&self) -> FsResult<DirectoryService> {
        let client = self
            .config
            .provider
            .client(&self.config.administrator_subject)
            .await?;
        Ok(DirectoryService::new(client))
    }
}

#[async_trait]
impl Lookuper for UsersNode {
    async fn lookup(&self, name: &str) -> FsResult<Node> {
        if is_ignored(name) {
            return Err(FsError::NotFound);
        }

        let user = match self.lookup_cache.load(&name.to_string()) {
            Some(user) => user,
            None => {
                debug!(primary_email = name, "pulling user");
                let user = self.service().await?.get_user(name).await.map_err(|e| {
                    error!(primary_email = name, error = %e, "failed to retrieve user");
                    FsError::from(e)
                })?;
                let user = Arc::new(user);
                self.lookup_cache.store(
                    name.to_string(),
                    Arc::clone(&user),
                    self.config.cache.expiration,
                );
                user
            }
        };

        Ok(Node::User(UserNode::new(Arc::clone(&self.config), user)))
    }
}

#[async_trait]
impl Readdirer for UsersNode {
    async fn readdir(&self) -> FsResult<Vec<ChildEntry>> {
        if let Some(entries) = self.readdir_cache.load(&()) {
            debug!("using cached user list");
            return Ok(entries.as_ref().clone());
        }

        let service = self.service().await?;
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = service
                .list_users(&self.domain.domain_name, page_token.as_deref())
                .await
                .map_err(|e| {
                    error!(domain_name = %self.domain.domain_name, error = %e, "failed to retrieve user list");
                    FsError::from(e)
                })?;

            for user in page.users {
                debug!(primary_email = %user.primary_email, "found user");
                let name = user.primary_email.clone();
                self.lookup_cache.store(
                    name.clone(),
                    Arc::new(user),
                    self.config.cache.expiration,
                );
                entries.push(ChildEntry {
                    name,
                    kind: EntryKind::Directory,
                });
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
