//! Configuration file support for nativedecl.
//!
//! Two configuration file locations are read:
//! - Global: `~/.nativedecl/config.toml` - User-wide defaults
//! - Project: `.nativedecl/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ops::dump::DumpFormat;
use crate::registry::RegistryOptions;

/// nativedecl configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Descriptor file discovery
    pub decls: DeclsConfig,

    /// Registry validation policy
    pub registry: RegistryConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Descriptor file discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclsConfig {
    /// Glob patterns, relative to the project root, loaded when no files are
    /// passed on the command line
    pub include: Vec<String>,
}

/// Registry validation policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Forward-reference policy for modules that don't set
    /// `forward_references` themselves
    pub allow_forward_references: Option<bool>,
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default `dump` format (json, toml)
    pub format: Option<String>,

    /// Colored diagnostics
    pub color: Option<bool>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if !other.decls.include.is_empty() {
            self.decls.include = other.decls.include;
        }

        if other.registry.allow_forward_references.is_some() {
            self.registry.allow_forward_references = other.registry.allow_forward_references;
        }

        if other.output.format.is_some() {
            self.output.format = other.output.format;
        }
        if other.output.color.is_some() {
            self.output.color = other.output.color;
        }
    }

    /// Registry options used when a module doesn't choose its own.
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            allow_forward_references: self.registry.allow_forward_references.unwrap_or(false),
        }
    }

    /// Parse the dump format from config string.
    pub fn dump_format(&self) -> Option<DumpFormat> {
        self.output.format.as_ref().and_then(|s| s.parse().ok())
    }

    /// Whether diagnostics should be colored.
    pub fn color(&self) -> bool {
        self.output.color.unwrap_or(true)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.nativedecl/config.toml)
/// 2. Global config (~/.nativedecl/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    // Load global config first
    if global_path.exists() {
        let global = Config::load_or_default(global_path);
        config.merge(global);
    }

    // Project config overrides global
    if project_path.exists() {
        let project = Config::load_or_default(project_path);
        config.merge(project);
    }

    config
}

/// Get the global nativedecl config directory (~/.nativedecl).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".nativedecl"))
}

/// Get the global config path (~/.nativedecl/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.nativedecl/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".nativedecl").join("config.toml")
}

/// Load the merged config for a project root.
pub fn load_for_project(project_root: &Path) -> Config {
    let project = project_config_path(project_root);
    match global_config_path() {
        Some(global) => load_config(&global, &project),
        None => Config::load_or_default(&project),
    }
}
