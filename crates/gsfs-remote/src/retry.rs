//! Bounded retry on rate limiting.
//!
//! The remote enforces precise per-minute quotas, so backoff is linear
//! rather than exponential: attempt `a` sleeps `(1 + a) * min_sleep`.
//! Only 429 responses are retried. Transport-level failures abort
//! immediately and every other status is the caller's concern.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::transport::{HttpTransport, Request, Response, TransportError};

pub struct RetryTransport<T> {
    inner: T,
    max_attempts: u32,
    min_sleep: Duration,
}

impl<T> RetryTransport<T> {
    pub fn new(inner: T, max_attempts: u32, min_sleep: Duration) -> Self {
        RetryTransport {
            inner,
            max_attempts,
            min_sleep,
        }
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for RetryTransport<T> {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        for attempt in 0..self.max_attempts {
            let res = self.inner.execute(req.clone()).await?;
            if res.status != StatusCode::TOO_MANY_REQUESTS {
                return Ok(res);
            }

            let backoff = self.min_sleep * (1 + attempt);
            debug!(url = %req.url, attempt, backoff_ms = backoff.as_millis() as u64, "rate limited, backing off");
            tokio::time::sleep(backoff).await;
        }
        Err(TransportError::MaxAttemptsExceeded)
    }
}
