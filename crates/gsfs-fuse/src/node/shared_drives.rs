//! Lists the team drives visible to the administrator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use gsfs_core::{FsError, FsResult};
use gsfs_remote::{DriveService, SharedDrive};

use super::{ChildEntry, EntryKind, Lookuper, Node, Readdirer, SharedDriveNode};
use crate::ttl_cache::TtlCache;
use crate::FsConfig;

pub const NODE_NAME: &str = "shared-drives";

#[derive(Debug)]
pub struct SharedDrivesNode {
    config: Arc<FsConfig>,
    lookup_cache: TtlCache<String, Arc<SharedDrive>>,
    readdir_cache: TtlCache<(), Arc<Vec<ChildEntry>>>,
}

impl SharedDrivesNode {
    pub fn new(config: Arc<FsConfig>) -> Self {
        SharedDrivesNode {
            config,
            lookup_cache: TtlCache::new(),
            readdir_cache: TtlCache::new(),
        }
    }

    async fn service(&self) -> FsResult<DriveService> {
        let client = self
            .config
            .provider
            .client(&self.config.administrator_subject)
            .await?;
        Ok(DriveService::new(client))
    }
}

#[async_trait]
impl Lookuper for SharedDrivesNode {
    async fn lookup(&self, name: &str) -> FsResult<Node> {
        let drive = match self.lookup_cache.load(&name.to_string()) {
            Some(drive) => drive,
            None => {
                let service = self.service().await?;
                let mut found: Option<SharedDrive> = None;
                let mut page_token: Option<String> = None;
                loop {
                    let page = service.list_drives(page_token.as_deref()).await.map_err(|e| {
                        error!(drive_name = name, error = %e, "failed to retrieve shared drive");
                        FsError::from(e)
                    })?;
                    if let Some(drive) = page.drives.into_iter().find(|d| d.name == name) {
                        // Stop paging as soon as the name matches.
                        found = Some(drive);
                        break;
                    }
                    match page.next_page_token {
                        Some(token) if !token.is_empty() => page_token = Some(token),
                        _ => break,
                    }
                }

                let drive = Arc::new(found.ok_or(FsError::NotFound)?);
                self.lookup_cache.store(
                    name.to_string(),
                    Arc::clone(&drive),
                    self.config.cache.expiration,
                );
                drive
            }
        };

        Ok(Node::SharedDrive(SharedDriveNode::new(
            Arc::clone(&self.config),
            drive,
        )))
    }
}

#[async_trait]
impl Readdirer for SharedDrivesNode {
    async fn readdir(&self) -> FsResult<Vec<ChildEntry>> {
        if let Some(entries) = self.readdir_cache.load(&()) {
            debug!("using cached shared drive list");
            return Ok(entries.as_ref().clone());
        }

        let service = self.service().await?;
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = service.list_drives(page_token.as_deref()).await.map_err(|e| {
                error!(error = %e, "failed to retrieve shared drives");
                FsError::from(e)
            })?;

            for drive in page.drives {
                debug!(drive_name = %drive.name, "listing shared drive");
                let name = drive.name.clone();
                self.lookup_cache.store(
                    name.clone(),
                    Arc::new(drive),
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
