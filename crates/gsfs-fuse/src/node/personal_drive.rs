//! One user's personal drive, split into active and trashed partitions.

use std::sync::Arc;

use tracing::debug;

use gsfs_core::config::IncludeDrive;
use gsfs_remote::User;

use super::{DirectoryNode, Node, OnAdder};
use crate::FsConfig;

pub const NODE_NAME: &str = "personal-drive";
pub const ACTIVE_NODE_NAME: &str = "active";
pub const TRASHED_NODE_NAME: &str = "trashed";

#[derive(Debug)]
pub struct PersonalDriveNode {
    config: Arc<FsConfig>,
    user: Arc<User>,
}

impl PersonalDriveNode {
    pub fn new(config: Arc<FsConfig>, user: Arc<User>) -> Self {
        PersonalDriveNode { config, user }
    }

    fn include(&self) -> IncludeDrive {
        self.config
            .include
            .domains
            .as_ref()
            .and_then(|domains| domains.users.as_ref())
            .and_then(|users| users.personal_drive)
            .unwrap_or_default()
    }
}

impl OnAdder for PersonalDriveNode {
    fn on_add(&self) -> Vec<(String, Node)> {
        let include = self.include();
        let mut children = Vec::new();

        if include.active {
            debug!(primary_email = %self.user.primary_email, "including active");
            children.push((
                ACTIVE_NODE_NAME.to_string(),
                Node::Directory(DirectoryNode::personal(
                    Arc::clone(&self.config),
                    Arc::clone(&self.user),
                    false,
                )),
            ));
        } else {
            debug!(primary_email = %self.user.primary_email, "ignoring active");
        }

        if include.trashed {
            debug!(primary_email = %self.user.primary_email, "including trashed");
            children.push((
                TRASHED_NODE_NAME.to_string(),
                Node::Directory(DirectoryNode::personal(
                    Arc::clone(&self.config),
                    Arc::clone(&self.user),
                    true,
                )),
            ));
        } else {
            debug!(primary_email = %self.user.primary_email, "ignoring trashed");
        }

        children
    }
}
