//! Names that must never reach the remote.
//!
//! Source-control tools walking the mount probe for these on every
//! directory; answering locally keeps them from burning API quota.

pub fn is_ignored(name: &str) -> bool {
    matches!(name, ".git" | "HEAD")
}
