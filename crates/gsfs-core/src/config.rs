use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which partitions of a drive to mount.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IncludeDrive {
    pub active: bool,
    pub trashed: bool,
}

/// Per-user subtrees. `gmail` is reserved: accepted in configuration but
/// never mounted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IncludeUsers {
    pub personal_drive: Option<IncludeDrive>,
    pub shared_files: bool,
    pub gmail: bool,
}

/// Reserved: accepted in configuration but never mounted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IncludeGroups {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IncludeDomains {
    pub users: Option<IncludeUsers>,
    pub groups: Option<IncludeGroups>,
}

/// Which subtrees to mount. An absent branch is not mounted at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Include {
    pub domains: Option<IncludeDomains>,
    pub shared_drives: Option<IncludeDrive>,
}

/// Local content cache: where materialized files land, and how long
/// metadata (directory listings, lookups) stays fresh.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Directory holding one file per materialized drive file, named by the
    /// remote file id. An empty path is replaced with a fresh temp
    /// directory at mount time.
    pub path: PathBuf,
    /// TTL for metadata caches. Zero is replaced with one minute at mount
    /// time.
    pub expiration: Duration,
}
