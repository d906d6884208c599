//! Override layers
//!
//! Every field is optional: an absent field leaves the lower layer alone.
//! Intervals are signed so that negative values reach validation instead
//! of failing deserialization with an unhelpful message.

use serde::{Deserialize, Serialize};

use super::effective::{ConfigError, CssMap};
use super::mode::BuildMode;

/// Per-mode override block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvOverride {
    pub enabled: Option<bool>,
    pub interval: Option<i64>,
    pub quiet: Option<bool>,
}

impl EnvOverride {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.interval.is_none() && self.quiet.is_none()
    }
}

/// Environment block layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvOverrides {
    pub development: Option<EnvOverride>,
    pub production: Option<EnvOverride>,
}

/// Environment variables read by [`EnvOverrides::from_vars`]
pub const ENV_ENABLED: &str = "ETAG_REFRESH_ENABLED";
pub const ENV_INTERVAL: &str = "ETAG_REFRESH_INTERVAL";
pub const ENV_QUIET: &str = "ETAG_REFRESH_QUIET";

impl EnvOverrides {
    /// Block for one mode
    pub fn for_mode(&self, mode: BuildMode) -> Option<&EnvOverride> {
        match mode {
            BuildMode::Development => self.development.as_ref(),
            BuildMode::Production => self.production.as_ref(),
        }
    }

    /// Build the layer for `mode` from `ETAG_REFRESH_*` variables
    pub fn from_vars<I, K, V>(mode: BuildMode, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut block = EnvOverride::default();

        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                ENV_ENABLED => block.enabled = Some(parse_bool(ENV_ENABLED, value)?),
                ENV_QUIET => block.quiet = Some(parse_bool(ENV_QUIET, value)?),
                ENV_INTERVAL => {
                    let interval = value.parse::<i64>().map_err(|e| {
                        ConfigError::ParseError(format!("{}: {}", ENV_INTERVAL, e))
                    })?;
                    block.interval = Some(interval);
                }
                _ => {}
            }
        }

        let mut layer = Self::default();
        if !block.is_empty() {
            match mode {
                BuildMode::Development => layer.development = Some(block),
                BuildMode::Production => layer.production = Some(block),
            }
        }
        Ok(layer)
    }

    pub fn is_empty(&self) -> bool {
        self.development.is_none() && self.production.is_none()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::ParseError(format!(
            "{}: expected a boolean, got {:?}",
            key, other
        ))),
    }
}

/// Notification overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationOverrides {
    pub container: Option<CssMap>,
    pub button: Option<CssMap>,
    pub template: Option<String>,
}

/// Caller-supplied plugin options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginOptions {
    pub resource: Option<String>,
    pub interval: Option<i64>,
    pub quiet: Option<bool>,
    pub notification: Option<NotificationOverrides>,
    pub env: Option<EnvOverrides>,
}
