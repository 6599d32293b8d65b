//! Per-subject access tokens from an external credential helper.
//!
//! Credential acquisition stays outside this process: a helper command
//! receives the service account file and the subject and prints a
//! short-lived access token. Tokens are cached per subject well under the
//! hour the remote grants them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use gsfs_remote::{TokenSource, TransportError};

const TOKEN_LIFETIME: Duration = Duration::from_secs(45 * 60);

pub struct CommandTokenSource {
    command: String,
    service_account_file: PathBuf,
    cache: Mutex<HashMap<String, (String, Instant)>>,
}

impl CommandTokenSource {
    pub fn new(command: String, service_account_file: PathBuf) -> Self {
        CommandTokenSource {
            command,
            service_account_file,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, subject: &str) -> Option<String> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(subject)
            .filter(|(_, fetched_at)| fetched_at.elapsed() < TOKEN_LIFETIME)
            .map(|(token, _)| token.clone())
    }
}

#[async_trait]
impl TokenSource for CommandTokenSource {
    async fn token(&self, subject: &str) -> Result<String, TransportError> {
        if let Some(token) = self.cached(subject) {
            return Ok(token);
        }

        debug!(command = %self.command, subject, "requesting access token");
        let output = tokio::process::Command::new(&self.command)
            .arg(&self.service_account_file)
            .arg(subject)
            .output()
            .await
            .map_err(|e| {
                TransportError::Request(format!("failed to run token command: {e}"))
            })?;

        if !output.status.success() {
            return Err(TransportError::Request(format!(
                "token command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(TransportError::Request(
                "token command printed no token".into(),
            ));
        }

        self.cache
            .lock()
            .unwrap()
            .insert(subject.to_string(), (token.clone(), Instant::now()));
        Ok(token)
    }
}
