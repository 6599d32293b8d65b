//! gsfs-fuse: the virtual filesystem tree engine.
//!
//! ## Virtual filesystem layout
//!
//! The engine projects the remote suite's storage as a lazily-expanded tree
//! of nodes, rooted at the mountpoint:
//!
//! ```text
//! /
//! ├── domains/<domain-name>/users/<primary-email>/
//! │     ├── personal-drive/{active,trashed}/<folders>.../<file>
//! │     └── shared-files/active/<folders>.../<file>
//! └── shared-drives/<drive-name>/{active,trashed}/<folders>.../<file>
//! ```
//!
//! Interior nodes answer `readdir`/`lookup` by querying their remote
//! collection through a per-subject authorized client, caching results with
//! a per-node TTL. File leaves materialize remote content into the local
//! content cache on `open` and hand the kernel a descriptor on the cached
//! copy. The whole mount is read-only.

pub mod driver;
pub mod handle;
pub mod ignore;
pub mod node;
pub mod openat;
pub mod ttl_cache;

use std::sync::Arc;

use gsfs_core::{CacheConfig, Include};
use gsfs_remote::ClientProvider;

/// Engine configuration, immutable after mount.
pub struct FsConfig {
    pub cache: CacheConfig,
    /// Subject used for directory-wide queries: listing domains, users and
    /// shared drives.
    pub administrator_subject: String,
    pub include: Include,
    pub provider: Arc<dyn ClientProvider>,
}

impl std::fmt::Debug for FsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsConfig")
            .field("cache", &self.cache)
            .field("administrator_subject", &self.administrator_subject)
            .field("include", &self.include)
            .field("provider", &"Arc<dyn ClientProvider>")
            .finish()
    }
}

pub use driver::{mount, GsuiteFs, DRIVER_NAME};
pub use handle::FileHandle;
pub use node::{Node, RootNode};
pub use ttl_cache::TtlCache;
