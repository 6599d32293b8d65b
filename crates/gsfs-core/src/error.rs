use thiserror::Error;

pub type FsResult<T> = Result<T, FsError>;

/// Kernel-facing error type. Node operations recover nothing: they log the
/// first failure and surface it upward, and caches are written only on full
/// success.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found")]
    NotFound,

    #[error("remote error: status {0}")]
    Remote(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FsError {
    /// The errno reported to the kernel.
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::Remote(_) => libc::EIO,
            FsError::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            FsError::Other(_) => libc::EIO,
        }
    }
}
