//! The HTTP seam the engine talks through.
//!
//! Every remote interaction is a GET: listings, single-record gets and
//! content downloads. Requests are cloneable so the retry layer can replay
//! them; response bodies are byte streams so downloads never buffer whole
//! files in memory.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to execute request: {0}")]
    Request(String),

    #[error("max attempts exceeded")]
    MaxAttemptsExceeded,
}

/// An outgoing GET request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Request {
            url,
            headers: Vec::new(),
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.headers.push(("authorization", format!("Bearer {token}")));
        self
    }
}

/// A response with a streaming body.
pub struct Response {
    pub status: StatusCode,
    pub body: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl Response {
    pub fn new(status: StatusCode, body: BoxStream<'static, Result<Bytes, TransportError>>) -> Self {
        Response { status, body }
    }

    /// Build a response from an in-memory body. The transport mocks in the
    /// test suites lean on this.
    pub fn from_bytes(status: StatusCode, bytes: impl Into<Bytes>) -> Self {
        Response {
            status,
            body: stream::iter([Ok(bytes.into())]).boxed(),
        }
    }

    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        let mut body = self.body;
        let mut out = BytesMut::new();
        while let Some(chunk) = body.try_next().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response").field("status", &self.status).finish()
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn execute(&self, req: Request) -> Result<Response, TransportError>;
}

/// Production transport over a shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        let mut builder = self.client.get(req.url.clone());
        for (name, value) in &req.headers {
            builder = builder.header(*name, value);
        }
        let res = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = res.status();
        let body = res
            .bytes_stream()
            .map_err(|e| TransportError::Request(e.to_string()))
            .boxed();
        Ok(Response::new(status, body))
    }
}
