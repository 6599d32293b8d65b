//! Remote side of gsuitefs: the HTTP transport seam, rate-limit retry
//! middleware, per-subject client provisioning, and thin JSON clients for
//! the directory and drive APIs.
//!
//! The filesystem engine consumes everything here through traits
//! ([`HttpTransport`], [`ClientProvider`], [`TokenSource`]) so tests can
//! substitute counting mocks with recorded fixtures.

pub mod directory;
pub mod drive;
pub mod entities;
pub mod provider;
pub mod retry;
pub mod transport;

mod error;

pub use directory::DirectoryService;
pub use drive::{DriveService, FileListCall, ListCorpus};
pub use entities::{Domain, DriveFile, SharedDrive, User, FOLDER_MIME_TYPE};
pub use error::RemoteError;
pub use provider::{ClientProvider, TokenProvider, TokenSource, SCOPES};
pub use retry::RetryTransport;
pub use transport::{HttpTransport, ReqwestTransport, Request, Response, TransportError};
