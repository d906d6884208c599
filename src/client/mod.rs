//! Client script generation
//!
//! [`generate`] turns an effective configuration into the program injected
//! into HTML documents. The output depends only on its inputs and the
//! crate version, so repeated builds produce identical documents.

mod style;

pub use style::css_text;

use etag_refresh_runtime::{
    ClientPayload, NotificationPayload, RuntimeOptions, LOG_PREFIX, RELOAD_DELAY_MS,
};

use crate::config::{BuildMode, EffectiveConfig};

const RUNTIME_TEMPLATE: &str = include_str!("runtime.js");

const PAYLOAD_PLACEHOLDER: &str = "__ETAG_REFRESH_PAYLOAD__";
const PREFIX_PLACEHOLDER: &str = "__ETAG_REFRESH_PREFIX__";
const RELOAD_DELAY_PLACEHOLDER: &str = "__ETAG_REFRESH_RELOAD_DELAY__";

/// Crate version embedded in the client payload
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the data payload for `mode`
///
/// Only the active `{resource, interval, quiet}` and the serialized
/// notification style are carried; the `env` blocks stay on the build side.
pub fn payload(config: &EffectiveConfig, mode: BuildMode) -> ClientPayload {
    let active = config.active(mode);
    ClientPayload {
        options: RuntimeOptions {
            resource: config.resource.clone(),
            interval: active.interval,
            quiet: active.quiet,
        },
        notification: NotificationPayload {
            container_css: css_text(&config.notification.container),
            button_css: css_text(&config.notification.button),
            template: config.notification.template.clone(),
        },
        version: VERSION.to_string(),
    }
}

/// Generate the client program for `mode`
pub fn generate(config: &EffectiveConfig, mode: BuildMode) -> String {
    render(&payload(config, mode))
}

/// Render the client program for an already-built payload
///
/// The payload carries caller text, so it is substituted last; nothing in
/// it is ever scanned for placeholders.
pub fn render(payload: &ClientPayload) -> String {
    RUNTIME_TEMPLATE
        .replacen(PREFIX_PLACEHOLDER, LOG_PREFIX, 1)
        .replacen(RELOAD_DELAY_PLACEHOLDER, &RELOAD_DELAY_MS.to_string(), 1)
        .replacen(PAYLOAD_PLACEHOLDER, &embed_json(payload), 1)
}

/// Serialize the payload for embedding inside a `<script>` element
fn embed_json(payload: &ClientPayload) -> String {
    // Struct of strings, integers and bools: serialization cannot fail
    let json = serde_json::to_string(payload).unwrap_or_else(|e| {
        tracing::error!(error = %e, "client payload serialization failed");
        "null".to_string()
    });
    json.replace("</", "<\\/")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, BuiltinDefaults, EnvOverrides, NotificationOverrides, PluginOptions};

    fn defaults() -> EffectiveConfig {
        BuiltinDefaults::default().effective()
    }

    #[test]
    fn test_generate_is_deterministic() {
        let config = defaults();
        assert_eq!(
            generate(&config, BuildMode::Development),
            generate(&config, BuildMode::Development)
        );
    }

    #[test]
    fn test_placeholders_filled() {
        let script = generate(&defaults(), BuildMode::Production);
        assert!(!script.contains("__ETAG_REFRESH_"));
        assert!(script.contains("[ETagAutoRefresh]"));
        assert!(script.contains("var RELOAD_DELAY_MS = 3000;"));
    }

    #[test]
    fn test_payload_selects_mode() {
        let config = defaults();

        let dev = payload(&config, BuildMode::Development);
        assert_eq!(dev.options.interval, 30_000);
        assert!(!dev.options.quiet);

        let prod = payload(&config, BuildMode::Production);
        assert_eq!(prod.options.interval, 60_000);
        assert!(prod.options.quiet);
        assert_eq!(prod.version, VERSION);
    }

    #[test]
    fn test_env_block_not_embedded() {
        let script = generate(&defaults(), BuildMode::Development);
        assert!(!script.contains("\"env\""));
        assert!(!script.contains("\"production\""));
    }

    #[test]
    fn test_styles_embedded_as_css_text() {
        let script = generate(&defaults(), BuildMode::Development);
        assert!(script.contains("\"containerCss\":\"position: fixed; bottom: 20px;"));
        assert!(script.contains("\"buttonCss\":\"margin-top: 10px;"));
    }

    #[test]
    fn test_template_cannot_close_script() {
        let user = PluginOptions {
            notification: Some(NotificationOverrides {
                template: Some("<div>x</div></script><script>alert(1)</script>".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = resolve(&defaults(), &EnvOverrides::default(), &user).unwrap();
        let script = generate(&config, BuildMode::Development);

        assert!(!script.contains("</script>"));
        assert!(script.contains("<\\/script>"));
    }

    #[test]
    fn test_placeholder_text_in_options_is_inert() {
        let user = PluginOptions {
            resource: Some("/__ETAG_REFRESH_PREFIX__.html".to_string()),
            notification: Some(NotificationOverrides {
                template: Some("<b>__ETAG_REFRESH_RELOAD_DELAY__</b>".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = resolve(&defaults(), &EnvOverrides::default(), &user).unwrap();
        let script = generate(&config, BuildMode::Development);

        assert!(script.contains("var RELOAD_DELAY_MS = 3000;"));
        assert!(script.contains("var PREFIX = '[ETagAutoRefresh]';"));
        assert!(script.contains("\"template\":\"<b>__ETAG_REFRESH_RELOAD_DELAY__<\\/b>\""));
        assert!(script.contains("\"resource\":\"/__ETAG_REFRESH_PREFIX__.html\""));
    }

    #[test]
    fn test_config_change_changes_script() {
        let user = PluginOptions {
            resource: Some("/app.html".to_string()),
            ..Default::default()
        };
        let changed = resolve(&defaults(), &EnvOverrides::default(), &user).unwrap();

        assert_ne!(
            generate(&defaults(), BuildMode::Development),
            generate(&changed, BuildMode::Development)
        );
    }
}
