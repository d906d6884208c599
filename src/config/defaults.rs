//! Built-in defaults (lowest precedence layer)

use super::effective::{CssMap, EffectiveConfig, EnvBlocks, EnvSettings, NotificationStyle};

/// Default notification markup; the first `<button>` is the manual-refresh control
pub const DEFAULT_TEMPLATE: &str =
    "<div>New version detected, refreshing in 3 seconds...</div><button>Refresh now</button>";

/// Built-in defaults
#[derive(Debug, Clone)]
pub struct BuiltinDefaults {
    pub resource: String,
    pub interval: u64,
    pub quiet: bool,
    pub development: EnvSettings,
    pub production: EnvSettings,
    pub container: Vec<(&'static str, &'static str)>,
    pub button: Vec<(&'static str, &'static str)>,
    pub template: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            resource: "/".to_string(),
            interval: 30_000,
            quiet: false,
            development: EnvSettings {
                enabled: true,
                interval: 30_000,
                quiet: false,
            },
            production: EnvSettings {
                enabled: true,
                interval: 60_000,
                quiet: true,
            },
            container: vec![
                ("position", "fixed"),
                ("bottom", "20px"),
                ("right", "20px"),
                ("padding", "15px"),
                ("background", "#4CAF50"),
                ("color", "white"),
                ("border-radius", "5px"),
                ("box-shadow", "0 4px 8px rgba(0,0,0,0.2)"),
                ("z-index", "9999"),
                ("animation", "fadeIn 0.5s"),
            ],
            button: vec![
                ("margin-top", "10px"),
                ("padding", "5px 10px"),
                ("background", "white"),
                ("color", "#4CAF50"),
                ("border", "none"),
                ("border-radius", "3px"),
                ("cursor", "pointer"),
            ],
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// The defaults as a complete effective configuration
    pub fn effective(&self) -> EffectiveConfig {
        EffectiveConfig {
            resource: self.resource.clone(),
            interval: self.interval,
            quiet: self.quiet,
            notification: NotificationStyle {
                container: to_css_map(&self.container),
                button: to_css_map(&self.button),
                template: self.template.clone(),
            },
            env: EnvBlocks {
                development: self.development,
                production: self.production,
            },
        }
    }
}

fn to_css_map(pairs: &[(&str, &str)]) -> CssMap {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
