#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for wharf
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/wharf/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod constants;
pub mod core;

pub use core::{KubernetesConfig, OwnerConfig, RunConfig, WorkloadConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use wharf_errors::{ConfigError, Error};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    #[serde(default)]
    pub workload: WorkloadConfig,

    #[serde(default)]
    pub owner: OwnerConfig,

    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("wharf").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!("no config file at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(namespace) = std::env::var("WHARF_NAMESPACE") {
            self.kubernetes.namespace = namespace;
        }

        if let Ok(image) = std::env::var("WHARF_INIT_IMAGE") {
            self.workload.init_image = image;
        }

        if let Ok(id) = std::env::var("WHARF_PROJECT_ID") {
            self.run.project_id = Some(id);
        }

        if let Ok(id) = std::env::var("WHARF_INSTANCE_ID") {
            self.run.instance_id = Some(id);
        }

        if let Ok(id) = std::env::var("WHARF_BUILD_ID") {
            self.run.build_id = Some(id);
        }

        if let Ok(enabled) = std::env::var("WHARF_OWNER_ENABLED") {
            self.owner.enabled = parse_bool("WHARF_OWNER_ENABLED", enabled)?;
        }

        if let Ok(name) = std::env::var("WHARF_OWNER_NAME") {
            self.owner.name = name;
        }

        if let Ok(uid) = std::env::var("WHARF_OWNER_UID") {
            self.owner.uid = uid;
        }

        Ok(())
    }
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}
