//! One user: scaffold for the per-user subtrees.

use std::sync::Arc;

use tracing::debug;

use gsfs_core::config::IncludeUsers;
use gsfs_remote::User;

use super::{personal_drive, shared_files, Node, OnAdder, PersonalDriveNode, SharedFilesNode};
use crate::FsConfig;

#[derive(Debug)]
pub struct UserNode {
    config: Arc<FsConfig>,
    user: Arc<User>,
}

impl UserNode {
    pub fn new(config: Arc<FsConfig>, user: Arc<User>) -> Self {
        UserNode { config, user }
    }

    fn include(&self) -> Option<&IncludeUsers> {
        self.config.include.domains.as_ref()?.users.as_ref()
    }
}

impl OnAdder for UserNode {
    fn on_add(&self) -> Vec<(String, Node)> {
        let Some(include) = self.include() else {
            return Vec::new();
        };

        let mut children = Vec::new();
        if include.personal_drive.is_some() {
            debug!(primary_email = %self.user.primary_email, "including personal drive");
            children.push((
                personal_drive::NODE_NAME.to_string(),
                Node::PersonalDrive(PersonalDriveNode::new(
                    Arc::clone(&self.config),
                    Arc::clone(&self.user),
                )),
            ));
        } else {
            debug!(primary_email = %self.user.primary_email, "ignoring personal drive");
        }

        if include.shared_files {
            debug!(primary_email = %self.user.primary_email, "including shared files");
            children.push((
                shared_files::NODE_NAME.to_string(),
                Node::SharedFiles(SharedFilesNode::new(
                    Arc::clone(&self.config),
                    Arc::clone(&self.user),
                )),
            ));
        }

        // Gmail is reserved in the include tree and never mounted.
        children
    }
}
