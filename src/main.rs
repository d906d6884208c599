//! ETag Refresh CLI
//!
//! Entry point for the `etag-refresh` command-line tool.

use clap::{Parser, Subcommand};
use etag_refresh::adapter::{
    integrate, Asset, Compilation, InertReason, IntegrationHandle, ProjectContext,
};
use etag_refresh::config::{
    load_options, resolve, BuildMode, BuiltinDefaults, ConfigError, ConfigReport, ConfigSource,
    EffectiveConfig, EnvOverrides, PluginOptions,
};
use etag_refresh::watcher::{EtagWatcher, HttpEtagSource, RefreshEvent};
use etag_refresh::{client, serve, EtagRecord};
use std::collections::BTreeMap;
use std::fs;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "etag-refresh")]
#[command(about = "ETag-driven notify-then-reload for build tools", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct ConfigArgs {
    /// Plugin options file (TOML, or JSON with a .json extension)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Build mode (default: from NODE_ENV)
    #[arg(long, short = 'm')]
    mode: Option<BuildMode>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration with its sources
    Resolve {
        #[command(flatten)]
        args: ConfigArgs,
    },

    /// Print the generated client script
    Generate {
        #[command(flatten)]
        args: ConfigArgs,
    },

    /// Inject the client script into built HTML files
    Inject {
        /// HTML file or directory of build output
        path: PathBuf,

        /// Go through the HTML post-processing path instead of the emitted-assets path
        #[arg(long)]
        html_hook: bool,

        #[command(flatten)]
        args: ConfigArgs,
    },

    /// Poll a running server and report ETag changes
    Watch {
        /// Origin the resource is resolved against (e.g. http://localhost:5173)
        #[arg(long)]
        origin: String,

        #[command(flatten)]
        args: ConfigArgs,
    },

    /// Serve a directory with content ETags and the client script injected
    Serve {
        /// Directory to serve
        dir: PathBuf,

        /// Port to listen on
        #[arg(long, short = 'p', default_value_t = 8080)]
        port: u16,

        #[command(flatten)]
        args: ConfigArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Resolve { args } => run_resolve(&args),
        Commands::Generate { args } => run_generate(&args),
        Commands::Inject {
            path,
            html_hook,
            args,
        } => run_inject(&path, html_hook, &args),
        Commands::Watch { origin, args } => run_watch(&origin, &args),
        Commands::Serve { dir, port, args } => run_serve(dir, port, &args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_mode(args: &ConfigArgs) -> BuildMode {
    args.mode.unwrap_or_else(|| {
        let node_env = std::env::var("NODE_ENV").ok();
        BuildMode::from_node_env(node_env.as_deref())
    })
}

/// Resolve the effective config for `mode` from defaults, environment and file
fn load_config(
    path: Option<&Path>,
    mode: BuildMode,
) -> Result<(EffectiveConfig, Vec<ConfigSource>), ConfigError> {
    let defaults = BuiltinDefaults::default().effective();
    let mut sources = vec![ConfigSource::builtin()];

    let env = EnvOverrides::from_vars(mode, std::env::vars())?;
    if !env.is_empty() {
        sources.push(ConfigSource::env());
    }

    let user = match path {
        Some(path) => {
            let (options, source) = load_options(path)?;
            sources.push(source);
            options
        }
        None => PluginOptions::default(),
    };

    let config = resolve(&defaults, &env, &user)?;
    Ok((config, sources))
}

fn load_or_exit(args: &ConfigArgs) -> (EffectiveConfig, Vec<ConfigSource>, BuildMode) {
    let mode = build_mode(args);
    match load_config(args.config.as_deref(), mode) {
        Ok((config, sources)) => (config, sources, mode),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

fn run_resolve(args: &ConfigArgs) {
    let (config, sources, mode) = load_or_exit(args);
    let report = ConfigReport::new(config, mode, sources);

    match report.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_generate(args: &ConfigArgs) {
    let (config, _, mode) = load_or_exit(args);
    println!("{}", client::generate(&config, mode));
}

fn html_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("html"))
        .collect()
}

fn run_inject(path: &Path, html_hook: bool, args: &ConfigArgs) {
    let (config, _, mode) = load_or_exit(args);

    let integration = match integrate(config, &ProjectContext::hook_pipeline(mode, html_hook)) {
        Ok(IntegrationHandle::HookPipeline(integration)) => integration,
        Ok(IntegrationHandle::Inert(InertReason::Disabled)) => {
            eprintln!("Auto-refresh is disabled for {} builds; nothing injected.", mode);
            return;
        }
        Ok(other) => {
            eprintln!("Hook-pipeline integration unavailable: {:?}", other);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Registration failed: {}", e);
            process::exit(1);
        }
    };

    if !path.exists() {
        eprintln!("Path not found: {}", path.display());
        process::exit(1);
    }

    let files = html_files(path);
    let mut originals = BTreeMap::new();
    for file in &files {
        match fs::read_to_string(file) {
            Ok(html) => {
                originals.insert(file.clone(), html);
            }
            Err(e) => {
                eprintln!("Error reading {}: {}", file.display(), e);
                process::exit(1);
            }
        }
    }

    let mut compilation = if html_hook {
        Compilation::with_html(originals.values().cloned().collect())
    } else {
        Compilation::with_assets(
            originals
                .iter()
                .map(|(file, html)| (file.to_string_lossy().to_string(), Asset::new(html.as_str())))
                .collect(),
        )
    };

    let report = integration.on_compilation(&mut compilation);

    let rewritten: Vec<(PathBuf, String)> = match (compilation.html_documents, compilation.assets) {
        (Some(documents), _) => originals.keys().cloned().zip(documents).collect(),
        (None, Some(assets)) => assets
            .into_iter()
            .map(|(name, asset)| (PathBuf::from(name), asset.source().to_string()))
            .collect(),
        (None, None) => Vec::new(),
    };

    for (file, html) in rewritten {
        if originals.get(&file) == Some(&html) {
            continue;
        }
        if let Err(e) = fs::write(&file, html) {
            eprintln!("Error writing {}: {}", file.display(), e);
            process::exit(1);
        }
    }

    integration.on_done();
    println!(
        "Injected into {} of {} HTML file(s) ({:?})",
        report.injected,
        files.len(),
        report.path
    );
}

fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            process::exit(1);
        }
    }
}

fn run_watch(origin: &str, args: &ConfigArgs) {
    let (config, _, mode) = load_or_exit(args);
    let payload = client::payload(&config, mode);

    let source = match HttpEtagSource::new(origin, Duration::from_secs(10)) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Invalid origin: {}", e);
            process::exit(1);
        }
    };

    runtime().block_on(async move {
        let (handle, mut events) = EtagWatcher::spawn(source, payload.options, EtagRecord::new());
        eprintln!("Watching {} on {} (Ctrl-C to stop)", config.resource, origin);

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        relay_events(&mut events, shutdown, |line| println!("{}", line)).await;

        handle.shutdown().await;
    });
}

fn describe(event: &RefreshEvent) -> String {
    match event {
        RefreshEvent::Primed { etag } => format!("primed {}", etag),
        RefreshEvent::Changed { previous, etag } => format!("changed {} -> {}", previous, etag),
        RefreshEvent::Reload => "reload".to_string(),
    }
}

/// Print events until `shutdown` resolves or the watcher goes away
///
/// `shutdown` is created once and polled across iterations, so a signal
/// that lands between two events is still seen.
async fn relay_events(
    events: &mut mpsc::UnboundedReceiver<RefreshEvent>,
    shutdown: impl Future<Output = ()>,
    mut print: impl FnMut(String),
) {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => print(describe(&event)),
                None => break,
            },
        }
    }
}

fn run_serve(dir: PathBuf, port: u16, args: &ConfigArgs) {
    let (config, _, mode) = load_or_exit(args);

    let integration = match integrate(config, &ProjectContext::dev_server(mode)) {
        Ok(IntegrationHandle::DevServer(integration)) => Some(integration),
        Ok(IntegrationHandle::Inert(reason)) => {
            eprintln!("Serving without auto-refresh: {:?}", reason);
            None
        }
        Ok(IntegrationHandle::HookPipeline(_)) => None,
        Err(e) => {
            eprintln!("Registration failed: {}", e);
            process::exit(1);
        }
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(e) = runtime().block_on(serve::serve(dir, addr, integration, shutdown)) {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}
