//! Configuration management for the POM reconciler.
//!
//! Handles:
//! - Command-line argument parsing
//! - Settings files (user-global, then workspace)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::core::locator::DEFAULT_ANCHOR;

/// Descriptor file reconciled when none is configured
pub const DEFAULT_DESCRIPTOR: &str = "pom.xml";

/// Settings file name inside the user config directory (`<config>/pom-ls/`)
pub const USER_SETTINGS_FILE: &str = "pom-ls.toml";

/// Settings file name at the workspace root
pub const WORKSPACE_SETTINGS_FILE: &str = ".pom-ls.toml";

/// Command-line arguments for the POM language server
#[derive(Debug, Default, Parser)]
#[command(name = "pom-ls")]
#[command(about = "Reconciles Maven project descriptors and reports their problems")]
#[command(version)]
pub struct Args {
    /// Workspace root served to the reconciler
    #[arg(long, help = "Workspace root directory (defaults to the current directory)")]
    pub root: Option<PathBuf>,

    /// Anchor for problems without a position
    #[arg(long, help = "Text anchoring problems that have no position (default: '<project ')")]
    pub anchor: Option<String>,

    /// Descriptor file name
    #[arg(long, help = "Descriptor file name to reconcile (default: pom.xml)")]
    pub descriptor: Option<String>,

    /// Disable the filesystem watcher
    #[arg(long, help = "Do not watch the workspace for descriptor changes")]
    pub no_watch: bool,

    /// Log level for the language server
    #[arg(
        long,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Optional settings read from a TOML file
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub anchor: Option<String>,
    pub descriptor: Option<String>,
    pub watch: Option<bool>,
}

impl Settings {
    /// Values set in `other` take precedence
    fn overlay(self, other: Settings) -> Settings {
        Settings {
            anchor: other.anchor.or(self.anchor),
            descriptor: other.descriptor.or(self.descriptor),
            watch: other.watch.or(self.watch),
        }
    }

    /// Load a settings file; a missing file yields `None`
    pub fn load(path: &Path) -> Result<Option<Settings>> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        Ok(Some(settings))
    }
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub anchor: String,
    pub descriptor: String,
    pub watch: bool,
    pub log_level: String,
    /// Settings files that were found and applied, lowest priority first
    pub settings_files: Vec<PathBuf>,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let user_dir = dirs::config_dir().map(|dir| dir.join("pom-ls"));
        Self::resolve(args, user_dir.as_deref())
    }

    /// Resolve configuration with an explicit user settings directory.
    ///
    /// Priority: CLI > workspace settings > user settings > defaults.
    pub fn resolve(args: Args, user_dir: Option<&Path>) -> Result<Self> {
        let root = match args.root {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        // Watcher events and document URIs carry absolute paths
        let root = std::path::absolute(&root)
            .with_context(|| format!("Failed to resolve workspace root: {}", root.display()))?;

        let candidates = [
            user_dir.map(|dir| dir.join(USER_SETTINGS_FILE)),
            Some(root.join(WORKSPACE_SETTINGS_FILE)),
        ];

        let mut settings = Settings::default();
        let mut settings_files = Vec::new();
        for path in candidates.into_iter().flatten() {
            if let Some(found) = Settings::load(&path)? {
                settings = settings.overlay(found);
                settings_files.push(path);
            }
        }

        Ok(Config {
            root,
            anchor: args
                .anchor
                .or(settings.anchor)
                .unwrap_or_else(|| DEFAULT_ANCHOR.to_string()),
            descriptor: args
                .descriptor
                .or(settings.descriptor)
                .unwrap_or_else(|| DEFAULT_DESCRIPTOR.to_string()),
            watch: !args.no_watch && settings.watch.unwrap_or(true),
            log_level: args.log_level,
            settings_files,
        })
    }
}
