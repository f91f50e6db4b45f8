//! Configuration management commands.
//!
//! Stores CLI configuration in `~/.backoffice/config.toml`.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show saved settings
    Show,

    /// Save the API server URL
    SetUrl { url: String },

    /// Save the access token sent with every request
    SetToken { token: String },

    /// Remove all saved settings
    Reset {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Persistent CLI configuration stored on disk.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl CliConfig {
    /// Read the file at `path`, or defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Write to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// `~/.backoffice/config.toml`
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".backoffice").join("config.toml"))
}

/// Saved settings, or defaults when there are none or they cannot be read.
pub fn load() -> CliConfig {
    config_path()
        .and_then(|path| CliConfig::load_from(&path))
        .unwrap_or_default()
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    let path = config_path()?;
    run(cmd, &path, format)
}

fn run(cmd: ConfigCommands, path: &Path, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let cfg = CliConfig::load_from(path)?;
            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    output::print_detail("file", &path.display().to_string());
                    output::print_detail("api_url", cfg.api_url.as_deref().unwrap_or("(default)"));
                    output::print_detail("token", if cfg.token.is_some() { "(set)" } else { "(none)" });
                }
                _ => output::print_item(&cfg, format)?,
            }
        }

        ConfigCommands::SetUrl { url } => {
            let mut cfg = CliConfig::load_from(path)?;
            cfg.api_url = Some(url.trim_end_matches('/').to_string());
            cfg.save_to(path)?;
            output::print_success(&format!("api_url = {}", url));
        }

        ConfigCommands::SetToken { token } => {
            let mut cfg = CliConfig::load_from(path)?;
            cfg.token = Some(token);
            cfg.save_to(path)?;
            output::print_success("Token saved");
        }

        ConfigCommands::Reset { force } => {
            if !force {
                output::print_info("This will remove all saved settings. Use --force to confirm.");
                return Ok(());
            }
            if path.exists() {
                std::fs::remove_file(path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
            output::print_success("Configuration reset to defaults");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CliConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, CliConfig::default());
    }

    #[test]
    fn test_set_url_and_token_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        run(ConfigCommands::SetUrl { url: "http://api.local/".into() }, &path, OutputFormat::Json).unwrap();
        run(ConfigCommands::SetToken { token: "abc".into() }, &path, OutputFormat::Json).unwrap();

        let cfg = CliConfig::load_from(&path).unwrap();
        assert_eq!(cfg.api_url.as_deref(), Some("http://api.local"));
        assert_eq!(cfg.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_reset_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        CliConfig { api_url: Some("http://x".into()), token: None }.save_to(&path).unwrap();

        run(ConfigCommands::Reset { force: false }, &path, OutputFormat::Table).unwrap();
        assert!(path.exists());

        run(ConfigCommands::Reset { force: true }, &path, OutputFormat::Table).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = [").unwrap();
        assert!(CliConfig::load_from(&path).is_err());
    }
}
