//! Mount root: composes the top-level subtrees per the include tree.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, warn};

use super::{domains, shared_drives, DomainsNode, Node, OnAdder, SharedDrivesNode};
use crate::FsConfig;

#[derive(Debug)]
pub struct RootNode {
    config: Arc<FsConfig>,
}

impl RootNode {
    /// Finalizes the configuration: a zero cache expiration becomes one
    /// minute and an empty cache path becomes a fresh temp directory, both
    /// with a warning.
    pub fn new(mut config: FsConfig) -> anyhow::Result<Self> {
        if config.cache.expiration.is_zero() {
            config.cache.expiration = Duration::from_secs(60);
            warn!(new_value = ?config.cache.expiration, "cache expiration not set");
        }
        if config.cache.path.as_os_str().is_empty() {
            config.cache.path = tempfile::Builder::new()
                .prefix("gsuitefs-")
                .tempdir()
                .context("failed to initialize cache path")?
                .keep();
            warn!(new_value = %config.cache.path.display(), "cache path not set");
        }
        Ok(RootNode {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> Arc<FsConfig> {
        Arc::clone(&self.config)
    }
}

impl OnAdder for RootNode {
    fn on_add(&self) -> Vec<(String, Node)> {
        let mut children = Vec::new();
        if self.config.include.domains.is_some() {
            debug!("including domains");
            children.push((
                domains::NODE_NAME.to_string(),
                Node::Domains(DomainsNode::new(self.config())),
            ));
        } else {
            debug!("ignoring domains");
        }
        if self.config.include.shared_drives.is_some() {
            debug!("including shared-drives");
            children.push((
                shared_drives::NODE_NAME.to_string(),
                Node::SharedDrives(SharedDrivesNode::new(self.config())),
            ));
        } else {
            debug!("ignoring shared-drives");
        }
        children
    }
}
