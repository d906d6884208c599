//! Effective configuration with provenance
//!
//! The effective config is the merged, validated result used for one
//! plugin registration. Provenance of the contributing layers is kept in
//! a separate [`ConfigReport`] so the config itself stays comparable.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use super::merge::is_valid_css_property;
use super::mode::BuildMode;
use super::options::PluginOptions;

/// Schema version for the config report
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "etag-refresh/effective_config@1";

/// Smallest accepted polling interval
pub const MIN_INTERVAL_MS: u64 = 100;

/// CSS property name → value, in insertion order
pub type CssMap = IndexMap<String, String>;

/// Notification presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStyle {
    pub container: CssMap,
    pub button: CssMap,
    pub template: String,
}

/// Behavior for one build mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSettings {
    pub enabled: bool,
    pub interval: u64,
    pub quiet: bool,
}

/// Per-mode behavior blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBlocks {
    pub development: EnvSettings,
    pub production: EnvSettings,
}

impl EnvBlocks {
    pub fn get(&self, mode: BuildMode) -> &EnvSettings {
        match mode {
            BuildMode::Development => &self.development,
            BuildMode::Production => &self.production,
        }
    }

    pub fn get_mut(&mut self, mode: BuildMode) -> &mut EnvSettings {
        match mode {
            BuildMode::Development => &mut self.development,
            BuildMode::Production => &mut self.production,
        }
    }
}

/// Fully merged configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub resource: String,
    pub interval: u64,
    pub quiet: bool,
    pub notification: NotificationStyle,
    pub env: EnvBlocks,
}

impl EffectiveConfig {
    /// Settings that apply to a build in `mode`
    pub fn active(&self, mode: BuildMode) -> EnvSettings {
        *self.env.get(mode)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resource.trim().is_empty() {
            return Err(ConfigError::EmptyResource);
        }

        check_interval("interval", self.interval)?;
        check_interval("env.development.interval", self.env.development.interval)?;
        check_interval("env.production.interval", self.env.production.interval)?;

        for (section, map) in [
            ("notification.container", &self.notification.container),
            ("notification.button", &self.notification.button),
        ] {
            if let Some(name) = map.keys().find(|name| !is_valid_css_property(name)) {
                return Err(ConfigError::InvalidCssProperty {
                    section,
                    name: name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn check_interval(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < MIN_INTERVAL_MS {
        return Err(ConfigError::InvalidInterval {
            field: field.to_string(),
            value: i64::try_from(value).unwrap_or(i64::MAX),
        });
    }
    Ok(())
}

/// Origin of a configuration layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Env,
    File,
    Caller,
}

/// A contributing config layer with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this layer
    pub origin: ConfigOrigin,

    /// File path (None unless loaded from a file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    pub fn builtin() -> Self {
        Self {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }
    }

    pub fn env() -> Self {
        Self {
            origin: ConfigOrigin::Env,
            path: None,
            digest: None,
        }
    }

    pub fn caller() -> Self {
        Self {
            origin: ConfigOrigin::Caller,
            path: None,
            digest: None,
        }
    }
}

/// Effective config plus where it came from, as printed by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigReport {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,
    pub mode: BuildMode,
    pub active: EnvSettings,
    pub config: EffectiveConfig,
    pub sources: Vec<ConfigSource>,
}

impl ConfigReport {
    pub fn new(config: EffectiveConfig, mode: BuildMode, sources: Vec<ConfigSource>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            mode,
            active: config.active(mode),
            config,
            sources,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Load caller options from a TOML or JSON file, returning them with provenance
pub fn load_options(path: &Path) -> Result<(PluginOptions, ConfigSource), ConfigError> {
    let bytes = fs::read(path).map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let options = if is_json {
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {}", e)))?
    } else {
        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?
    };

    let source = ConfigSource {
        origin: ConfigOrigin::File,
        path: Some(path.to_string_lossy().to_string()),
        digest: Some(digest),
    };

    Ok((options, source))
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} ms, got {value}", min = MIN_INTERVAL_MS)]
    InvalidInterval { field: String, value: i64 },

    #[error("resource must not be empty")]
    EmptyResource,

    #[error("invalid CSS property name in {section}: {name:?}")]
    InvalidCssProperty { section: &'static str, name: String },

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
