//! End-to-end tests across config resolution, script generation and both
//! build integrations.

use std::collections::BTreeMap;
use std::fs;

use etag_refresh::adapter::{Asset, Compilation, InertReason, InjectionPath};
use etag_refresh::config::{
    load_options, resolve, BuiltinDefaults, ConfigError, ConfigOrigin, EnvOverrides,
};
use etag_refresh::{
    generate, integrate, BuildMode, EffectiveConfig, IntegrationError, IntegrationHandle,
    PluginOptions, ProjectContext,
};

const PAGE: &str = "<html><head><title>t</title></head><body><p>hi</p></body></html>";

fn defaults() -> EffectiveConfig {
    BuiltinDefaults::default().effective()
}

fn write_options(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

// =============================================================================
// Config files
// =============================================================================

#[test]
fn test_toml_options_resolve() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_options(
        &dir,
        "refresh.toml",
        r#"
resource = "/app.html"
interval = 5000

[env.production]
enabled = false

[notification.container]
backgroundColor = "black"
"#,
    );

    let (options, source) = load_options(&path).unwrap();
    assert_eq!(source.origin, ConfigOrigin::File);
    assert_eq!(source.digest.as_deref().map(str::len), Some(64));

    let config = resolve(&defaults(), &EnvOverrides::default(), &options).unwrap();
    assert_eq!(config.resource, "/app.html");
    assert_eq!(config.active(BuildMode::Development).interval, 5000);
    assert_eq!(config.active(BuildMode::Production).interval, 5000);
    assert!(!config.active(BuildMode::Production).enabled);
    assert_eq!(
        config.notification.container.get("background-color").map(String::as_str),
        Some("black")
    );
    // Untouched defaults survive
    assert!(config.notification.container.contains_key("position"));
}

#[test]
fn test_json_options_resolve() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_options(&dir, "refresh.json", r#"{"quiet": true, "resource": "/"}"#);

    let (options, _) = load_options(&path).unwrap();
    let config = resolve(&defaults(), &EnvOverrides::default(), &options).unwrap();

    assert!(config.active(BuildMode::Development).quiet);
    assert!(config.active(BuildMode::Production).quiet);
}

#[test]
fn test_unknown_option_is_a_parse_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_options(&dir, "refresh.toml", "intervall = 5000\n");

    assert!(matches!(load_options(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_env_layer_sits_below_caller_options() {
    let env = EnvOverrides::from_vars(
        BuildMode::Development,
        [("ETAG_REFRESH_INTERVAL", "2000"), ("ETAG_REFRESH_QUIET", "true")],
    )
    .unwrap();
    let user = PluginOptions {
        interval: Some(9000),
        ..Default::default()
    };

    let config = resolve(&defaults(), &env, &user).unwrap();
    let dev = config.active(BuildMode::Development);

    assert_eq!(dev.interval, 9000);
    assert!(dev.quiet);
}

#[test]
fn test_too_small_interval_rejected() {
    let user = PluginOptions {
        interval: Some(10),
        ..Default::default()
    };

    assert!(matches!(
        resolve(&defaults(), &EnvOverrides::default(), &user),
        Err(ConfigError::InvalidInterval { value: 10, .. })
    ));
}

// =============================================================================
// Adapter parity
// =============================================================================

#[test]
fn test_both_integrations_inject_identical_script() {
    let config = defaults();
    let mode = BuildMode::Development;

    let IntegrationHandle::HookPipeline(pipeline) =
        integrate(config.clone(), &ProjectContext::hook_pipeline(mode, true)).unwrap()
    else {
        panic!("expected hook-pipeline integration");
    };
    let IntegrationHandle::DevServer(dev) =
        integrate(config.clone(), &ProjectContext::dev_server(mode)).unwrap()
    else {
        panic!("expected dev-server integration");
    };

    let mut compilation = Compilation::with_html(vec![PAGE.to_string()]);
    let report = pipeline.on_compilation(&mut compilation);
    let built = compilation.html_documents.unwrap().remove(0);
    let served = dev.transform_index_html(PAGE);

    assert_eq!(report.path, InjectionPath::HtmlHook);
    assert_eq!(built, served);
    assert!(built.contains(&generate(&config, mode)));
}

#[test]
fn test_assets_fallback_matches_html_hook() {
    let config = defaults();
    let mode = BuildMode::Production;

    let IntegrationHandle::HookPipeline(html_hook) =
        integrate(config.clone(), &ProjectContext::hook_pipeline(mode, true)).unwrap()
    else {
        panic!("expected hook-pipeline integration");
    };
    let IntegrationHandle::HookPipeline(assets) =
        integrate(config, &ProjectContext::hook_pipeline(mode, false)).unwrap()
    else {
        panic!("expected hook-pipeline integration");
    };

    let mut by_hook = Compilation::with_html(vec![PAGE.to_string()]);
    html_hook.on_compilation(&mut by_hook);

    let mut emitted = BTreeMap::new();
    emitted.insert("index.html".to_string(), Asset::new(PAGE));
    emitted.insert("main.js".to_string(), Asset::new("console.log(1)"));
    let mut by_assets = Compilation::with_assets(emitted);
    let report = assets.on_compilation(&mut by_assets);

    assert_eq!(report.path, InjectionPath::AssetsFallback);
    assert_eq!(report.injected, 1);

    let emitted = by_assets.assets.unwrap();
    assert_eq!(
        emitted["index.html"].source(),
        by_hook.html_documents.unwrap()[0]
    );
    assert_eq!(emitted["main.js"].source(), "console.log(1)");
}

#[test]
fn test_rebuild_does_not_double_inject() {
    let IntegrationHandle::HookPipeline(pipeline) = integrate(
        defaults(),
        &ProjectContext::hook_pipeline(BuildMode::Development, true),
    )
    .unwrap() else {
        panic!("expected hook-pipeline integration");
    };

    let mut first = Compilation::with_html(vec![PAGE.to_string()]);
    pipeline.on_compilation(&mut first);
    let once = first.html_documents.unwrap();

    let mut second = Compilation::with_html(once.clone());
    let report = pipeline.on_compilation(&mut second);

    assert_eq!(report.injected, 0);
    assert_eq!(second.html_documents.unwrap(), once);
    assert_eq!(pipeline.on_done(), 1);
}

// =============================================================================
// Inert registrations
// =============================================================================

#[test]
fn test_disabled_mode_is_inert() {
    let user = PluginOptions {
        env: Some(EnvOverrides::from_vars(BuildMode::Production, [("ETAG_REFRESH_ENABLED", "0")]).unwrap()),
        ..Default::default()
    };
    let config = resolve(&defaults(), &EnvOverrides::default(), &user).unwrap();

    let handle =
        integrate(config, &ProjectContext::hook_pipeline(BuildMode::Production, true)).unwrap();

    assert!(matches!(handle, IntegrationHandle::Inert(InertReason::Disabled)));
}

#[test]
fn test_host_without_lifecycle_is_inert() {
    let handle = integrate(defaults(), &ProjectContext::new(BuildMode::Development)).unwrap();

    assert!(handle.is_inert());
    assert!(matches!(handle, IntegrationHandle::Inert(InertReason::Unavailable(_))));
}

#[test]
fn test_hand_built_config_is_validated_at_registration() {
    let mut config = defaults();
    config.env.production.interval = 0;

    let result = integrate(config, &ProjectContext::hook_pipeline(BuildMode::Production, false));

    assert!(matches!(
        result,
        Err(IntegrationError::Config(ConfigError::InvalidInterval { value: 0, .. }))
    ));
}
