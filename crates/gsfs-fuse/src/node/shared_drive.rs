//! One shared drive, split into active and trashed partitions.

use std::sync::Arc;

use tracing::debug;

use gsfs_core::config::IncludeDrive;
use gsfs_remote::SharedDrive;

use super::{DirectoryNode, Node, OnAdder};
use crate::FsConfig;

pub const ACTIVE_NODE_NAME: &str = "active";
pub const TRASHED_NODE_NAME: &str = "trashed";

#[derive(Debug)]
pub struct SharedDriveNode {
    config: Arc<FsConfig>,
    drive: Arc<SharedDrive>,
}

impl SharedDriveNode {
    pub fn new(config: Arc<FsConfig>, drive: Arc<SharedDrive>) -> Self {
        SharedDriveNode { config, drive }
    }

    fn include(&self) -> IncludeDrive {
        self.config.include.shared_drives.unwrap_or_default()
    }
}

impl OnAdder for SharedDriveNode {
    fn on_add(&self) -> Vec<(String, Node)> {
        let include = self.include();
        let mut children = Vec::new();

        if include.active {
            debug!(drive_name = %self.drive.name, "including active");
            children.push((
                ACTIVE_NODE_NAME.to_string(),
                Node::Directory(DirectoryNode::shared(
                    Arc::clone(&self.config),
                    Arc::clone(&self.drive),
                    false,
                )),
            ));
        } else {
            debug!(drive_name = %self.drive.name, "ignoring active");
        }

        if include.trashed {
            debug!(drive_name = %self.drive.name, "including trashed");
            children.push((
                TRASHED_NODE_NAME.to_string(),
                Node::Directory(DirectoryNode::shared(
                    Arc::clone(&self.config),
                    Arc::clone(&self.drive),
                    true,
                )),
            ));
        } else {
            debug!(drive_name = %self.drive.name, "ignoring trashed");
        }

        children
    }
}
