//! Configuration merge logic
//!
//! Merge semantics:
//! - CSS maps: merge by property name (value replaced in place, new names appended)
//! - `env` blocks: merge field by field
//! - Everything else: override (highest layer wins)
//!
//! Caller top-level `interval` and `quiet` are written into both `env`
//! blocks as well, so a caller setting them sees the value in every mode.

use regex_lite::Regex;
use std::sync::OnceLock;

use super::effective::{ConfigError, CssMap, EffectiveConfig, EnvSettings, MIN_INTERVAL_MS};
use super::mode::BuildMode;
use super::options::{EnvOverride, EnvOverrides, NotificationOverrides, PluginOptions};

const CSS_PROPERTY_PATTERN: &str = r"^(--[A-Za-z0-9_-]+|-?[a-z][a-z0-9-]*)$";

/// Resolve the effective configuration from the three layers
pub fn resolve(
    defaults: &EffectiveConfig,
    env: &EnvOverrides,
    user: &PluginOptions,
) -> Result<EffectiveConfig, ConfigError> {
    let mut config = defaults.clone();

    apply_env_layer(&mut config, env)?;
    if let Some(user_env) = &user.env {
        apply_env_layer(&mut config, user_env)?;
    }

    if let Some(resource) = &user.resource {
        config.resource = resource.clone();
    }

    if let Some(interval) = user.interval {
        let interval = to_interval("interval", interval)?;
        config.interval = interval;
        config.env.development.interval = interval;
        config.env.production.interval = interval;
    }

    if let Some(quiet) = user.quiet {
        config.quiet = quiet;
        config.env.development.quiet = quiet;
        config.env.production.quiet = quiet;
    }

    if let Some(notification) = &user.notification {
        apply_notification(&mut config, notification);
    }

    config.validate()?;
    Ok(config)
}

fn apply_env_layer(config: &mut EffectiveConfig, layer: &EnvOverrides) -> Result<(), ConfigError> {
    for mode in [BuildMode::Development, BuildMode::Production] {
        if let Some(block) = layer.for_mode(mode) {
            let field = format!("env.{}.interval", mode);
            apply_env_block(config.env.get_mut(mode), block, &field)?;
        }
    }
    Ok(())
}

fn apply_env_block(
    settings: &mut EnvSettings,
    block: &EnvOverride,
    field: &str,
) -> Result<(), ConfigError> {
    if let Some(enabled) = block.enabled {
        settings.enabled = enabled;
    }
    if let Some(interval) = block.interval {
        settings.interval = to_interval(field, interval)?;
    }
    if let Some(quiet) = block.quiet {
        settings.quiet = quiet;
    }
    Ok(())
}

fn apply_notification(config: &mut EffectiveConfig, overrides: &NotificationOverrides) {
    if let Some(container) = &overrides.container {
        merge_css(&mut config.notification.container, container);
    }
    if let Some(button) = &overrides.button {
        merge_css(&mut config.notification.button, button);
    }
    if let Some(template) = &overrides.template {
        config.notification.template = template.clone();
    }
}

fn to_interval(field: &str, value: i64) -> Result<u64, ConfigError> {
    match u64::try_from(value) {
        Ok(v) if v >= MIN_INTERVAL_MS => Ok(v),
        _ => Err(ConfigError::InvalidInterval {
            field: field.to_string(),
            value,
        }),
    }
}

/// Merge `overlay` into `base` by normalized property name
pub fn merge_css(base: &mut CssMap, overlay: &CssMap) {
    for (name, value) in overlay {
        base.insert(css_property_name(name), value.clone());
    }
}

/// Normalize a style key to its CSS property name (`borderRadius` → `border-radius`)
///
/// Custom properties (`--accent`) are kept verbatim.
pub fn css_property_name(key: &str) -> String {
    let key = key.trim();
    if key.starts_with("--") {
        return key.to_string();
    }

    let mut name = String::with_capacity(key.len() + 4);
    // A leading capital marks a vendor prefix: WebkitTransition → -webkit-transition
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            name.push('-');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}

/// Whether `name` is an acceptable CSS property name
pub(crate) fn is_valid_css_property(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(CSS_PROPERTY_PATTERN).expect("CSS property pattern is valid"))
        .is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuiltinDefaults;
    use proptest::prelude::*;

    fn defaults() -> EffectiveConfig {
        BuiltinDefaults::default().effective()
    }

    fn css(pairs: &[(&str, &str)]) -> CssMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_no_overrides_is_defaults() {
        let config = resolve(&defaults(), &EnvOverrides::default(), &PluginOptions::default()).unwrap();
        assert_eq!(config, defaults());
    }

    #[test]
    fn test_single_css_property_keeps_rest() {
        let user = PluginOptions {
            notification: Some(NotificationOverrides {
                container: Some(css(&[("background", "#2196F3")])),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = resolve(&defaults(), &EnvOverrides::default(), &user).unwrap();
        let container = &config.notification.container;

        assert_eq!(container.get("background").map(String::as_str), Some("#2196F3"));
        assert_eq!(container.get("position").map(String::as_str), Some("fixed"));
        assert_eq!(container.len(), defaults().notification.container.len());
        // Replaced in place, not moved to the end
        assert_eq!(
            container.get_index_of("background"),
            defaults().notification.container.get_index_of("background")
        );
    }

    #[test]
    fn test_camel_case_key_replaces_kebab_default() {
        let user = PluginOptions {
            notification: Some(NotificationOverrides {
                button: Some(css(&[("borderRadius", "0"), ("fontWeight", "bold")])),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = resolve(&defaults(), &EnvOverrides::default(), &user).unwrap();
        let button = &config.notification.button;

        assert_eq!(button.get("border-radius").map(String::as_str), Some("0"));
        assert!(!button.contains_key("borderRadius"));
        assert_eq!(button.get("font-weight").map(String::as_str), Some("bold"));
    }

    #[test]
    fn test_precedence_env_then_user() {
        let env = EnvOverrides {
            production: Some(EnvOverride {
                interval: Some(120_000),
                quiet: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        let user = PluginOptions {
            env: Some(EnvOverrides {
                production: Some(EnvOverride {
                    interval: Some(90_000),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = resolve(&defaults(), &env, &user).unwrap();

        assert_eq!(config.env.production.interval, 90_000);
        assert!(!config.env.production.quiet);
        assert!(config.env.production.enabled);
        assert_eq!(config.env.development, defaults().env.development);
    }

    #[test]
    fn test_top_level_fields_win() {
        let env = EnvOverrides {
            development: Some(EnvOverride {
                interval: Some(5_000),
                ..Default::default()
            }),
            ..Default::default()
        };
        let user = PluginOptions {
            interval: Some(2_000),
            quiet: Some(true),
            ..Default::default()
        };

        let config = resolve(&defaults(), &env, &user).unwrap();

        assert_eq!(config.active(BuildMode::Development).interval, 2_000);
        assert_eq!(config.active(BuildMode::Production).interval, 2_000);
        assert!(config.active(BuildMode::Development).quiet);
    }

    #[test]
    fn test_invalid_intervals_rejected() {
        for bad in [0, -5, 99] {
            let user = PluginOptions {
                interval: Some(bad),
                ..Default::default()
            };
            let result = resolve(&defaults(), &EnvOverrides::default(), &user);
            assert_eq!(
                result,
                Err(ConfigError::InvalidInterval {
                    field: "interval".to_string(),
                    value: bad
                })
            );
        }
    }

    #[test]
    fn test_env_interval_error_names_block() {
        let env = EnvOverrides {
            production: Some(EnvOverride {
                interval: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = resolve(&defaults(), &env, &PluginOptions::default()).unwrap_err();
        assert!(err.to_string().contains("env.production.interval"));
    }

    #[test]
    fn test_empty_resource_rejected() {
        let user = PluginOptions {
            resource: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            resolve(&defaults(), &EnvOverrides::default(), &user),
            Err(ConfigError::EmptyResource)
        );
    }

    #[test]
    fn test_invalid_css_name_rejected() {
        let user = PluginOptions {
            notification: Some(NotificationOverrides {
                container: Some(css(&[("color:red;x", "1")])),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            resolve(&defaults(), &EnvOverrides::default(), &user),
            Err(ConfigError::InvalidCssProperty { .. })
        ));
    }

    #[test]
    fn test_css_property_name() {
        assert_eq!(css_property_name("borderRadius"), "border-radius");
        assert_eq!(css_property_name("z-index"), "z-index");
        assert_eq!(css_property_name("WebkitTransition"), "-webkit-transition");
        assert_eq!(css_property_name("--accentColor"), "--accentColor");
        assert_eq!(css_property_name(" color "), "color");
    }

    #[test]
    fn test_is_valid_css_property() {
        assert!(is_valid_css_property("border-radius"));
        assert!(is_valid_css_property("-webkit-transition"));
        assert!(is_valid_css_property("--accent_1"));
        assert!(!is_valid_css_property(""));
        assert!(!is_valid_css_property("color;"));
        assert!(!is_valid_css_property("Color"));
    }

    fn arb_env_override() -> impl Strategy<Value = Option<EnvOverride>> {
        proptest::option::of(
            (
                proptest::option::of(any::<bool>()),
                proptest::option::of(100i64..200_000),
                proptest::option::of(any::<bool>()),
            )
                .prop_map(|(enabled, interval, quiet)| EnvOverride {
                    enabled,
                    interval,
                    quiet,
                }),
        )
    }

    fn arb_css() -> impl Strategy<Value = Option<CssMap>> {
        proptest::option::of(
            proptest::collection::vec(("[a-z]{1,6}([A-Z][a-z]{1,5})?", "[a-z0-9 ]{0,8}"), 0..4)
                .prop_map(|pairs| pairs.into_iter().collect::<CssMap>()),
        )
    }

    fn arb_user() -> impl Strategy<Value = PluginOptions> {
        (
            proptest::option::of("/[a-z]{0,8}"),
            proptest::option::of(100i64..200_000),
            proptest::option::of(any::<bool>()),
            arb_css(),
            arb_css(),
            arb_env_override(),
            arb_env_override(),
        )
            .prop_map(|(resource, interval, quiet, container, button, dev, prod)| PluginOptions {
                resource,
                interval,
                quiet,
                notification: Some(NotificationOverrides {
                    container,
                    button,
                    template: None,
                }),
                env: Some(EnvOverrides {
                    development: dev,
                    production: prod,
                }),
            })
    }

    proptest! {
        #[test]
        fn prop_resolve_is_idempotent(user in arb_user(), dev in arb_env_override()) {
            let env = EnvOverrides { development: dev, production: None };
            let once = resolve(&defaults(), &env, &user).unwrap();
            let twice = resolve(&once, &env, &user).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_unmentioned_defaults_survive(user in arb_user()) {
            let base = defaults();
            let config = resolve(&base, &EnvOverrides::default(), &user).unwrap();

            if user.resource.is_none() {
                prop_assert_eq!(&config.resource, &base.resource);
            }
            prop_assert_eq!(&config.notification.template, &base.notification.template);

            let notification = user.notification.clone().unwrap_or_default();
            let mentioned: Vec<String> = notification
                .container
                .iter()
                .flat_map(|m| m.keys().map(|k| css_property_name(k)).collect::<Vec<_>>())
                .collect();
            for (name, value) in &base.notification.container {
                if !mentioned.contains(name) {
                    prop_assert_eq!(config.notification.container.get(name), Some(value));
                }
            }

            let user_env = user.env.clone().unwrap_or_default();
            let dev_mentioned = user_env.development.clone().unwrap_or_default();
            if dev_mentioned.enabled.is_none() {
                prop_assert_eq!(config.env.development.enabled, base.env.development.enabled);
            }
        }
    }
}
