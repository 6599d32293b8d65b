//! One drive file: materialize-on-open over the local content cache.
//!
//! The cache file lives at `{cache.path}/{file.id}` and carries the remote
//! modification time as its on-disk mtime, so "the cached copy is current"
//! is decidable from file metadata alone: cached iff the file exists and
//! its mtime is not before the remote `modified_time`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::anyhow;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use gsfs_core::{FsError, FsResult};
use gsfs_remote::{DriveFile, DriveService};

use super::{EntryKind, Getattrer, NodeAttr, Opener, Scope};
use crate::handle::FileHandle;
use crate::openat::open_symlink_aware;
use crate::FsConfig;

/// The kernel sets this open flag when the open backs an execve. The cache
/// copy is plain data; the bit must not reach the local open.
const OPEN_FOR_EXEC: u32 = 0x20;

#[derive(Debug)]
pub struct FileNode {
    config: Arc<FsConfig>,
    scope: Scope,
    trashed: bool,
    file: Arc<DriveFile>,
}

impl FileNode {
    pub fn new(config: Arc<FsConfig>, scope: Scope, trashed: bool, file: Arc<DriveFile>) -> Self {
        FileNode {
            config,
            scope,
            trashed,
            file,
        }
    }

    fn subject(&self) -> &str {
        self.scope.subject(&self.config.administrator_subject)
    }

    /// Location of the materialized copy.
    pub fn cache_path(&self) -> PathBuf {
        self.config.cache.path.join(&self.file.id)
    }

    fn remote_mtime(&self) -> SystemTime {
        self.file.modified_time.into()
    }

    /// True iff the cache file exists and is at least as new as the remote.
    fn is_cached(&self) -> FsResult<bool> {
        match std::fs::symlink_metadata(self.cache_path()) {
            Ok(metadata) => Ok(metadata.modified()? >= self.remote_mtime()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Export target for a native cloud document: prefer Office formats,
    /// else fall back to the last available export.
    pub fn export_target(&self) -> Option<&str> {
        let mut target = None;
        for mime in self.file.export_links.keys() {
            target = Some(mime.as_str());
            if mime.contains("officedocument") {
                break;
            }
        }
        target
    }

    /// Ensure the local cached copy is current and return its path.
    ///
    /// Concurrent opens of the same file may each download independently to
    /// the same path; the last writer wins and the end state is a complete
    /// file with the correct mtime.
    async fn materialize(&self) -> FsResult<PathBuf> {
        let target = self.cache_path();
        if self.is_cached()? {
            debug!(filename = %self.file.name, "file already cached");
            return Ok(target);
        }

        debug!(filename = %self.file.name, trashed = self.trashed, "pulling from remote");
        let client = self.config.provider.client(self.subject()).await?;
        let service = DriveService::new(client);

        let response = if self.file.is_native_document() {
            let mime = self.export_target().ok_or_else(|| {
                FsError::Other(anyhow!(
                    "native document {} has no export targets",
                    self.file.id
                ))
            })?;
            debug!(filename = %self.file.name, mime_type = mime, "exporting native document");
            service.export(&self.file.id, mime).await.map_err(|e| {
                error!(filename = %self.file.name, error = %e, "failed to export file contents");
                FsError::from(e)
            })?
        } else {
            debug!(filename = %self.file.name, mime_type = %self.file.mime_type, "downloading file");
            service.download(&self.file.id).await.map_err(|e| {
                error!(filename = %self.file.name, error = %e, "failed to download file");
                FsError::from(e)
            })?
        };

        let mut body = response.body;
        let mut out = tokio::fs::File::create(&target).await?;
        while let Some(chunk) = body.try_next().await.map_err(FsError::from)? {
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        drop(out);

        // The cached-iff-fresh invariant hangs on this single fact.
        let times = std::fs::FileTimes::new().set_modified(self.remote_mtime());
        let reopened = std::fs::OpenOptions::new().write(true).open(&target)?;
        reopened.set_times(times)?;

        debug!(filename = %self.file.name, target = %target.display(), "file saved");
        Ok(target)
    }
}

#[async_trait]
impl Opener for FileNode {
    async fn open(&self, flags: u32) -> FsResult<FileHandle> {
        self.materialize().await?;

        // The cached copy is read-only data; never open it for append.
        let flags = flags & !(libc::O_APPEND as u32) & !OPEN_FOR_EXEC;
        let fd = open_symlink_aware(
            &self.config.cache.path,
            Path::new(&self.file.id),
            flags as libc::c_int,
        )?;
        Ok(FileHandle::new(std::fs::File::from(fd)))
    }
}

#[async_trait]
impl Getattrer for FileNode {
    async fn getattr(&self) -> FsResult<NodeAttr> {
        if self.is_cached()? {
            use std::os::unix::fs::MetadataExt;
            let metadata = std::fs::symlink_metadata(self.cache_path())?;
            let mtime = metadata.modified()?;
            let ctime = SystemTime::UNIX_EPOCH
                + std::time::Duration::new(metadata.ctime().max(0) as u64, metadata.ctime_nsec() as u32);
            return Ok(NodeAttr {
                kind: EntryKind::RegularFile,
                size: metadata.len(),
                atime: metadata.accessed().unwrap_or(mtime),
                mtime,
                ctime,
            });
        }

        Ok(NodeAttr {
            kind: EntryKind::RegularFile,
            size: self.file.size,
            atime: self.remote_mtime(),
            mtime: self.remote_mtime(),
            ctime: self.file.created_time.into(),
        })
    }
}
