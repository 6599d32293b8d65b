//! Per-subject client provisioning.
//!
//! Directory-wide queries run as the configured administrator; per-user
//! drive queries run as that user. The provider hands out a transport per
//! subject; the engine never sees credentials. The stock [`TokenProvider`]
//! stacks retry over bearer authorization so every retry attempt
//! re-authorizes with a fresh token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::retry::RetryTransport;
use crate::transport::{HttpTransport, Request, Response, ReqwestTransport, TransportError};

/// API scopes the filesystem requires. The gmail scope backs the reserved
/// gmail subtree and matches the service-account grant the deployment docs
/// ask for.
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/admin.directory.user.readonly",
    "https://www.googleapis.com/auth/admin.directory.domain.readonly",
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/gmail.readonly",
];

/// Yields a short-lived access token authorized as `subject`. Credential
/// acquisition lives outside the engine; the binary wires in an external
/// helper.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self, subject: &str) -> Result<String, TransportError>;
}

/// Yields an authorized transport per subject. Returned transports retry
/// rate-limited requests transparently.
#[async_trait]
pub trait ClientProvider: Send + Sync + 'static {
    async fn client(&self, subject: &str) -> Result<Arc<dyn HttpTransport>, TransportError>;
}

/// Injects `Authorization: Bearer` from a token source.
struct AuthorizedTransport {
    inner: ReqwestTransport,
    source: Arc<dyn TokenSource>,
    subject: String,
}

#[async_trait]
impl HttpTransport for AuthorizedTransport {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        let token = self.source.token(&self.subject).await?;
        self.inner.execute(req.bearer(&token)).await
    }
}

/// The production provider: one shared reqwest client, a token source, and
/// the retry envelope. Defaults mirror the remote's per-minute quota model:
/// many attempts, one-minute base sleep.
pub struct TokenProvider {
    http: reqwest::Client,
    source: Arc<dyn TokenSource>,
    max_attempts: u32,
    min_sleep: Duration,
}

impl TokenProvider {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        TokenProvider {
            http: reqwest::Client::new(),
            source,
            max_attempts: 1_000,
            min_sleep: Duration::from_secs(60),
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, min_sleep: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.min_sleep = min_sleep;
        self
    }
}

#[async_trait]
impl ClientProvider for TokenProvider {
    async fn client(&self, subject: &str) -> Result<Arc<dyn HttpTransport>, TransportError> {
        let authorized = AuthorizedTransport {
            inner: ReqwestTransport::new(self.http.clone()),
            source: Arc::clone(&self.source),
            subject: subject.to_string(),
        };
        Ok(Arc::new(RetryTransport::new(
            authorized,
            self.max_attempts,
            self.min_sleep,
        )))
    }
}
