//! Files other people shared with a user. Only an active partition: the
//! trash of a shared file belongs to its owner.

use std::sync::Arc;

use tracing::debug;

use gsfs_remote::User;

use super::{DirectoryNode, Node, OnAdder};
use crate::FsConfig;

pub const NODE_NAME: &str = "shared-files";
pub const ACTIVE_NODE_NAME: &str = "active";

#[derive(Debug)]
pub struct SharedFilesNode {
    config: Arc<FsConfig>,
    user: Arc<User>,
}

impl SharedFilesNode {
    pub fn new(config: Arc<FsConfig>, user: Arc<User>) -> Self {
        SharedFilesNode { config, user }
    }
}

impl OnAdder for SharedFilesNode {
    fn on_add(&self) -> Vec<(String, Node)> {
        debug!(primary_email = %self.user.primary_email, "including active");
        vec![(
            ACTIVE_NODE_NAME.to_string(),
            Node::Directory(DirectoryNode::shared_with_me(
                Arc::clone(&self.config),
                Arc::clone(&self.user),
            )),
        )]
    }
}
