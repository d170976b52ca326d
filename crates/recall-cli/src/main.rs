mod cli;
mod commands;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use cli::Cli;
use recall::session::{MemorySession, RecallConfig};
use recall::storage::StorageConfig;

const DEFAULT_LOG_FILTER: &str = "recall=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(cli.config.as_deref(), cli.data_dir.clone())?;
    let (mut session, report) = MemorySession::open(config).await?;
    for warning in &report.warnings {
        warn!(%warning, "Memory partially restored");
    }

    let mutates = cli.command.mutates();
    commands::run(&mut session, cli.command, cli.format)?;

    if mutates {
        session.save().await.context("failed to save memory")?;
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "recall=debug" } else { DEFAULT_LOG_FILTER };
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string()))
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the YAML config if given and points storage at `data_dir`, the
/// configured location, or the platform data directory, in that order.
fn resolve_config(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<RecallConfig> {
    let mut config = match config_path {
        Some(path) => RecallConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RecallConfig::default(),
    };

    if let Some(dir) = data_dir {
        config.storage = StorageConfig::file(dir.to_string_lossy());
    } else if !config.storage.is_enabled() {
        config.storage = StorageConfig::file(default_data_dir().to_string_lossy());
    }
    Ok(config)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("recall"))
        .unwrap_or_else(|| PathBuf::from(".recall"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_defaults_to_file_storage() {
        let config = resolve_config(None, None).unwrap();
        assert!(config.storage.is_enabled());
    }

    #[test]
    fn test_resolve_config_data_dir_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let yaml = dir.path().join("recall.yaml");
        std::fs::write(
            &yaml,
            "memory:\n  short_term_limit: 4\nstorage:\n  type: file\n  path: /elsewhere\n",
        )
        .unwrap();

        let config = resolve_config(Some(&yaml), Some(dir.path().join("data"))).unwrap();
        assert_eq!(config.memory.short_term_limit, 4);
        assert_eq!(
            config.storage,
            StorageConfig::file(dir.path().join("data").to_string_lossy())
        );
    }

    #[test]
    fn test_resolve_config_missing_file() {
        assert!(resolve_config(Some(Path::new("/nonexistent/recall.yaml")), None).is_err());
    }
}
