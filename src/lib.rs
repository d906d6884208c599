//! ETag Refresh - notify-then-reload for build tools
//!
//! Watches a server-hosted resource through its HTTP ETag and reloads the
//! page when it changes. This crate resolves the plugin configuration,
//! generates the client program, and delivers it through either a
//! hook-pipeline or a dev-server build integration. The polling state
//! machine itself lives in `etag-refresh-runtime`.

pub mod adapter;
pub mod client;
pub mod config;
pub mod html;
pub mod record;
pub mod serve;
pub mod watcher;

pub use adapter::{
    detect_mode, integrate, BuildAdapter, IntegrationError, IntegrationHandle, ProjectContext,
};
pub use client::{css_text, generate};
pub use config::{resolve, BuildMode, ConfigError, EffectiveConfig, PluginOptions};
pub use html::inject_script;
pub use record::EtagRecord;
pub use watcher::{EtagWatcher, RefreshEvent, WatcherHandle};
