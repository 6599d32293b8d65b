//! One domain: hosts the `users` subtree when configured.

use std::sync::Arc;

use tracing::debug;

use gsfs_remote::Domain;

use super::{users, Node, OnAdder, UsersNode};
use crate::FsConfig;

#[derive(Debug)]
pub struct DomainNode {
    config: Arc<FsConfig>,
    domain: Arc<Domain>,
}

impl DomainNode {
    pub fn new(config: Arc<FsConfig>, domain: Arc<Domain>) -> Self {
        DomainNode { config, domain }
    }
}

impl OnAdder for DomainNode {
    fn on_add(&self) -> Vec<(String, Node)> {
        let include_users = self
            .config
            .include
            .domains
            .as_ref()
            .is_some_and(|domains| domains.users.is_some());
        if !include_users {
            debug!(domain_name = %self.domain.domain_name, "ignoring users");
            return Vec::new();
        }

        debug!(domain_name = %self.domain.domain_name, "including users");
        vec![(
            users::NODE_NAME.to_string(),
            Node::Users(UsersNode::new(
                Arc::clone(&self.config),
                Arc::clone(&self.domain),
            )),
        )]
    }
}
