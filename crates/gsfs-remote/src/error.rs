use gsfs_core::FsError;
use reqwest::StatusCode;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("remote returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

impl From<TransportError> for FsError {
    fn from(err: TransportError) -> Self {
        RemoteError::from(err).into()
    }
}

impl From<RemoteError> for FsError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Status { status, .. } if status == StatusCode::NOT_FOUND => FsError::NotFound,
            RemoteError::Status { status, .. } => FsError::Remote(status.as_u16()),
            RemoteError::Transport(TransportError::MaxAttemptsExceeded) => {
                FsError::Remote(StatusCode::TOO_MANY_REQUESTS.as_u16())
            }
            RemoteError::Transport(e) => FsError::Other(anyhow::Error::new(e)),
            RemoteError::Decode(e) => FsError::Other(anyhow::Error::new(e)),
        }
    }
}
