//! gsuitefs: mount a workspace's cloud storage as a read-only filesystem
//!
//! Usage:
//!   gsuitefs mount [--config /etc/gsuitefs/config.yaml] MOUNTPOINT
//!   gsuitefs example > config.yaml

mod auth;
mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use gsfs_fuse::{FsConfig, RootNode};
use gsfs_remote::TokenProvider;

use crate::auth::CommandTokenSource;
use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "gsuitefs",
    version,
    about = "Mount a hosted productivity suite's cloud storage as a read-only filesystem"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GSUITEFS_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "GSUITEFS_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mount the filesystem into a directory and block until unmounted
    Mount {
        /// Place to mount the filesystem
        mountpoint: PathBuf,

        /// Configuration yaml file
        #[arg(long, short = 'c', env = "GSUITEFS_CONFIG", default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Write an example configuration to stdout
    Example,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, &cli.log_format);

    match cli.command {
        Command::Mount { mountpoint, config } => do_mount(&mountpoint, &config).await,
        Command::Example => {
            print!("{}", config::example_yaml()?);
            Ok(())
        }
    }
}

async fn do_mount(mountpoint: &Path, config_path: &Path) -> Result<()> {
    let app_config = AppConfig::load(config_path)?;

    prepare_mountpoint(mountpoint)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mountpoint = %mountpoint.display(),
        config = %config_path.display(),
        "gsuitefs starting"
    );

    let source = Arc::new(CommandTokenSource::new(
        app_config.token_command.clone(),
        app_config.service_account_file.clone(),
    ));
    let provider = Arc::new(TokenProvider::new(source));

    let fs_config = FsConfig {
        cache: app_config.cache_config(),
        administrator_subject: app_config.administrator_subject.clone(),
        include: app_config.include.clone(),
        provider,
    };

    let root = RootNode::new(fs_config).context("failed to prepare root filesystem")?;
    let handle = gsfs_fuse::mount(root, mountpoint)
        .await
        .context("failed to mount filesystem")?;

    handle.await?;
    Ok(())
}

fn prepare_mountpoint(mountpoint: &Path) -> Result<()> {
    match std::fs::metadata(mountpoint) {
        Ok(info) if info.is_dir() => Ok(()),
        Ok(_) => anyhow::bail!("mountpoint {} is not a directory", mountpoint.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir(mountpoint).with_context(|| {
                format!("failed to create mountpoint: {}", mountpoint.display())
            })
        }
        Err(e) => Err(e).context("failed to stat mountpoint"),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
