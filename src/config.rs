//! Runtime configuration: an optional TOML file overridden by CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;
use crate::platform::PlatformFamily;

const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub platform: Option<PlatformFamily>,
    pub root: Option<PathBuf>,
    pub resolve_processes: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub platform: PlatformFamily,
    pub root: Option<PathBuf>,
    pub resolve_processes: bool,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            platform: PlatformFamily::detect(),
            root: None,
            resolve_processes: true,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// `<config dir>/portwho/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("portwho").join(CONFIG_FILE))
    }

    /// Resolve the effective configuration for a CLI invocation.
    ///
    /// An explicitly named config file must exist; the default one is
    /// optional.
    pub fn load(cli: &Cli) -> Result<Config> {
        let file = match &cli.config {
            Some(path) => read_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => read_file(&path)?,
                _ => FileConfig::default(),
            },
        };
        Ok(Config::default().merge_file(file).merge_cli(cli))
    }

    fn merge_file(mut self, file: FileConfig) -> Self {
        if let Some(platform) = file.platform {
            self.platform = platform;
        }
        if file.root.is_some() {
            self.root = file.root;
        }
        if let Some(resolve) = file.resolve_processes {
            self.resolve_processes = resolve;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        self
    }

    fn merge_cli(mut self, cli: &Cli) -> Self {
        if let Some(platform) = &cli.platform {
            self.platform = PlatformFamily::from(platform.as_str());
        }
        if cli.root.is_some() {
            self.root = cli.root.clone();
        }
        if cli.no_processes {
            self.resolve_processes = false;
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        self
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))
}
