//! Lists the customer's domains; each becomes a directory.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use gsfs_core::{FsError, FsResult};
use gsfs_remote::{DirectoryService, Domain};

use super::{ChildEntry, DomainNode, EntryKind, Lookuper, Node, Readdirer};
use crate::ignore::is_ignored;
use crate::ttl_cache::TtlCache;
use crate::FsConfig;

pub const NODE_NAME: &str = "domains";

#[derive(Debug)]
pub struct DomainsNode {
    config: Arc<FsConfig>,
    lookup_cache: TtlCache<String, Arc<Domain>>,
    readdir_cache: TtlCache<(), Arc<Vec<ChildEntry>>>,
}

impl DomainsNode {
    pub fn new(config: Arc<FsConfig>) -> Self {
        DomainsNode {
            config,
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
impl Lookuper for DomainsNode {
    async fn lookup(&self, name: &str) -> FsResult<Node> {
        if is_ignored(name) {
            return Err(FsError::NotFound);
        }

        let domain = match self.lookup_cache.load(&name.to_string()) {
            Some(domain) => domain,
            None => {
                debug!(name, "pulling domain");
                let domain = self.service().await?.get_domain(name).await.map_err(|e| {
                    error!(name, error = %e, "failed to retrieve domain");
                    FsError::from(e)
                })?;
                let domain = Arc::new(domain);
                self.lookup_cache.store(
                    name.to_string(),
                    Arc::clone(&domain),
                    self.config.cache.expiration,
                );
                domain
            }
        };

        Ok(Node::Domain(DomainNode::new(
            Arc::clone(&self.config),
            domain,
        )))
    }
}

#[async_trait]
impl Readdirer for DomainsNode {
    async fn readdir(&self) -> FsResult<Vec<ChildEntry>> {
        if let Some(entries) = self.readdir_cache.load(&()) {
            debug!("using cached domain list");
            return Ok(entries.as_ref().clone());
        }

        let domains = self.service().await?.list_domains().await.map_err(|e| {
            error!(error = %e, "failed to retrieve domains");
            FsError::from(e)
        })?;

        let mut entries = Vec::with_capacity(domains.len());
        for domain in domains {
            debug!(domain_name = %domain.domain_name, "listing domain");
            let name = domain.domain_name.clone();
            self.lookup_cache.store(
                name.clone(),
                Arc::new(domain),
                self.config.cache.expiration,
            );
            entries.push(ChildEntry {
                name,
                kind: EntryKind::Directory,
            });
        }

        self.readdir_cache.store(
            (),
            Arc::new(entries.clone()),
            self.config.cache.expiration,
        );
        Ok(entries)
    }
}
