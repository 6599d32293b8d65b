pub mod config;
pub mod error;

pub use config::{CacheConfig, Include, IncludeDomains, IncludeDrive, IncludeGroups, IncludeUsers};
pub use error::{FsError, FsResult};
