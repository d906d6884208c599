//! Configuration resolution
//!
//! Produces one immutable [`EffectiveConfig`] from three layers:
//! 1. Built-in defaults
//! 2. Environment block overrides (per build mode)
//! 3. Caller options (their own `env` blocks, then top-level fields)
//!
//! CSS maps and `env` blocks merge key-by-key; every other field is
//! replaced whole by the highest layer that sets it.

mod defaults;
mod effective;
mod merge;
mod mode;
mod options;

pub use defaults::BuiltinDefaults;
pub use effective::{
    load_options, ConfigError, ConfigOrigin, ConfigReport, ConfigSource, CssMap, EffectiveConfig,
    EnvBlocks, EnvSettings, NotificationStyle, MIN_INTERVAL_MS, SCHEMA_ID, SCHEMA_VERSION,
};
pub use merge::{css_property_name, merge_css, resolve};
pub use mode::BuildMode;
pub use options::{EnvOverride, EnvOverrides, NotificationOverrides, PluginOptions};
