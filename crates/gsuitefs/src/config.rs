//! YAML configuration for the gsuitefs binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gsfs_core::config::{
    CacheConfig, Include, IncludeDomains, IncludeDrive, IncludeGroups, IncludeUsers,
};

fn default_token_command() -> String {
    "gsuitefs-token".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
    /// Identity used for directory-wide queries.
    pub administrator_subject: String,
    /// Service account credentials, handed to the token command.
    pub service_account_file: PathBuf,
    /// External helper printing an access token for a subject. Invoked as
    /// `<token-command> <service-account-file> <subject>`.
    #[serde(default = "default_token_command")]
    pub token_command: String,
    #[serde(default)]
    pub cache: AppCacheConfig,
    #[serde(default)]
    pub include: Include,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AppCacheConfig {
    /// Content cache directory. Empty means a fresh temp directory.
    pub path: PathBuf,
    /// Metadata cache TTL in seconds. Zero means the engine default.
    pub expiration_secs: u64,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file: {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to load config from file: {}", path.display()))
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            path: self.cache.path.clone(),
            expiration: Duration::from_secs(self.cache.expiration_secs),
        }
    }
}

/// The example configuration printed by `gsuitefs example`.
pub fn example_yaml() -> Result<String> {
    let example = AppConfig {
        administrator_subject: "administrator@my-domain.com".into(),
        service_account_file: "/path/to/service/account.json".into(),
        token_command: default_token_command(),
        cache: AppCacheConfig {
            path: "/var/cache/gsuitefs".into(),
            expiration_secs: 60,
        },
        include: Include {
            domains: Some(IncludeDomains {
                users: Some(IncludeUsers {
                    personal_drive: Some(IncludeDrive {
                        active: true,
                        trashed: true,
                    }),
                    shared_files: true,
                    gmail: false,
                }),
                groups: Some(IncludeGroups {}),
            }),
            shared_drives: Some(IncludeDrive {
                active: true,
                trashed: false,
            }),
        },
    };
    serde_yaml::to_string(&example).context("failed to marshal example")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let yaml = r#"
administrator-subject: admin@acme.com
service-account-file: /etc/gsuitefs/sa.json
token-command: /usr/local/bin/acme-token
cache:
  path: /var/cache/gsuitefs
  expiration-secs: 120
include:
  domains:
    users:
      personal-drive:
        active: true
        trashed: true
      shared-files: true
  shared-drives:
    active: true
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.administrator_subject, "admin@acme.com");
        assert_eq!(config.token_command, "/usr/local/bin/acme-token");
        assert_eq!(config.cache.expiration_secs, 120);
        assert_eq!(
            config.cache_config().expiration,
            Duration::from_secs(120)
        );
        assert!(config.include.domains.is_some());
        assert!(config.include.shared_drives.unwrap().active);
    }

    #[test]
    fn parse_minimal_config_uses_defaults() {
        let yaml = r#"
administrator-subject: admin@acme.com
service-account-file: /etc/gsuitefs/sa.json
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.token_command, "gsuitefs-token");
        assert_eq!(config.cache.expiration_secs, 0);
        assert!(config.cache.path.as_os_str().is_empty());
        assert!(config.include.domains.is_none());
    }

    #[test]
    fn example_config_roundtrips() {
        let yaml = example_yaml().unwrap();
        let parsed: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.administrator_subject, "administrator@my-domain.com");
        let users = parsed.include.domains.unwrap().users.unwrap();
        assert!(users.personal_drive.unwrap().trashed);
        assert!(users.shared_files);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read configuration file"));
    }
}
