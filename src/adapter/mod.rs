//! Build-tool integration
//!
//! A host announces which lifecycle hooks it offers through a
//! [`ProjectContext`]. The adapter picks one integration mode from that
//! set at registration time and keeps it for the registration's lifetime:
//!
//! - Dev-server mode: wrap responses to capture ETags and rewrite served HTML
//! - Hook-pipeline mode: rewrite HTML emitted by each compilation
//!
//! Both modes inject through the same [`ScriptInjector`], so the bytes
//! delivered to a page never depend on the mode.

mod dev_server;
mod hook_pipeline;

pub use dev_server::{should_capture, DevServerIntegration, EtagCaptureLayer, EtagCaptureService};
pub use hook_pipeline::{Asset, Compilation, CompilationReport, HookPipelineIntegration, InjectionPath};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::client;
use crate::config::{BuildMode, ConfigError, EffectiveConfig, EnvSettings};
use crate::html::{self, Injection};

/// A lifecycle hook a host may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hook {
    /// Build finished
    Done,
    /// Compilation created
    Compilation,
    /// Rendered HTML post-processing, per compilation
    HtmlPostProcessing,
    /// Emitted-assets processing, per compilation
    ProcessAssets,
    /// Dev-server middleware registration
    ConfigureServer,
    /// Per-request HTML transform
    TransformIndexHtml,
}

/// What the host offers at registration time
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    pub mode: BuildMode,
    hooks: BTreeSet<Hook>,
}

impl ProjectContext {
    pub fn new(mode: BuildMode) -> Self {
        Self {
            mode,
            hooks: BTreeSet::new(),
        }
    }

    /// A hook-pipeline host, with or without the HTML post-processing hook
    pub fn hook_pipeline(mode: BuildMode, html_hook: bool) -> Self {
        let extra = if html_hook {
            Hook::HtmlPostProcessing
        } else {
            Hook::ProcessAssets
        };
        Self::new(mode).with_hooks([Hook::Done, Hook::Compilation, extra])
    }

    /// A dev-server host
    pub fn dev_server(mode: BuildMode) -> Self {
        Self::new(mode).with_hooks([Hook::ConfigureServer, Hook::TransformIndexHtml])
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hooks.insert(hook);
        self
    }

    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = Hook>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    pub fn has(&self, hook: Hook) -> bool {
        self.hooks.contains(&hook)
    }

    pub fn hooks(&self) -> impl Iterator<Item = Hook> + '_ {
        self.hooks.iter().copied()
    }
}

/// Integration mode, fixed once selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMode {
    HookPipeline,
    DevServer,
}

impl fmt::Display for IntegrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrationMode::HookPipeline => f.write_str("hook-pipeline"),
            IntegrationMode::DevServer => f.write_str("dev-server"),
        }
    }
}

/// Integration errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("no supported build lifecycle detected (hooks: {0})")]
    Unavailable(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Pick the integration mode for `ctx`
///
/// A per-request HTML transform wins over a compilation pipeline. A
/// compilation hook alone is not enough: it needs either the HTML
/// post-processing hook or the emitted-assets hook to reach the HTML.
pub fn detect_mode(ctx: &ProjectContext) -> Result<IntegrationMode, IntegrationError> {
    if ctx.has(Hook::TransformIndexHtml) {
        return Ok(IntegrationMode::DevServer);
    }
    if ctx.has(Hook::Compilation)
        && (ctx.has(Hook::HtmlPostProcessing) || ctx.has(Hook::ProcessAssets))
    {
        return Ok(IntegrationMode::HookPipeline);
    }

    let hooks: Vec<String> = ctx.hooks().map(|h| format!("{:?}", h)).collect();
    let hooks = if hooks.is_empty() {
        "none".to_string()
    } else {
        hooks.join(", ")
    };
    Err(IntegrationError::Unavailable(hooks))
}

/// Why a registration does nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InertReason {
    /// `env.<mode>.enabled` is false
    Disabled,
    /// The host offers no usable lifecycle
    Unavailable(IntegrationError),
}

/// The result of one registration
#[derive(Debug, Clone)]
pub enum IntegrationHandle {
    HookPipeline(HookPipelineIntegration),
    DevServer(DevServerIntegration),
    Inert(InertReason),
}

impl IntegrationHandle {
    pub fn mode(&self) -> Option<IntegrationMode> {
        match self {
            IntegrationHandle::HookPipeline(_) => Some(IntegrationMode::HookPipeline),
            IntegrationHandle::DevServer(_) => Some(IntegrationMode::DevServer),
            IntegrationHandle::Inert(_) => None,
        }
    }

    pub fn is_inert(&self) -> bool {
        matches!(self, IntegrationHandle::Inert(_))
    }
}

/// Registration-time adapter, one variant per integration mode
#[derive(Debug, Clone)]
pub enum BuildAdapter {
    HookPipeline(ScriptInjector),
    DevServer(ScriptInjector),
}

impl BuildAdapter {
    /// Validate `config` and select the adapter variant for `ctx`
    pub fn select(config: Arc<EffectiveConfig>, ctx: &ProjectContext) -> Result<Self, IntegrationError> {
        config.validate()?;
        let injector = ScriptInjector::new(config, ctx.mode);
        Ok(match detect_mode(ctx)? {
            IntegrationMode::HookPipeline => BuildAdapter::HookPipeline(injector),
            IntegrationMode::DevServer => BuildAdapter::DevServer(injector),
        })
    }

    pub fn mode(&self) -> IntegrationMode {
        match self {
            BuildAdapter::HookPipeline(_) => IntegrationMode::HookPipeline,
            BuildAdapter::DevServer(_) => IntegrationMode::DevServer,
        }
    }

    /// Register with the host
    pub fn integrate(&self, ctx: &ProjectContext) -> IntegrationHandle {
        let injector = match self {
            BuildAdapter::HookPipeline(injector) | BuildAdapter::DevServer(injector) => injector,
        };

        if !injector.settings().enabled {
            tracing::info!(mode = %ctx.mode, "auto-refresh disabled for this build mode");
            return IntegrationHandle::Inert(InertReason::Disabled);
        }

        if !injector.quiet() {
            tracing::info!(integration = %self.mode(), mode = %ctx.mode, "registering auto-refresh");
        }

        match self {
            BuildAdapter::HookPipeline(injector) => {
                IntegrationHandle::HookPipeline(HookPipelineIntegration::new(injector.clone()))
            }
            BuildAdapter::DevServer(injector) => IntegrationHandle::DevServer(
                DevServerIntegration::new(injector.clone(), ctx.has(Hook::ConfigureServer)),
            ),
        }
    }
}

/// Detect the mode and register in one step
///
/// An invalid configuration halts registration with an error. A host
/// without a usable lifecycle gets an inert handle and a warning; the
/// build itself carries on.
pub fn integrate(
    config: EffectiveConfig,
    ctx: &ProjectContext,
) -> Result<IntegrationHandle, IntegrationError> {
    match BuildAdapter::select(Arc::new(config), ctx) {
        Ok(adapter) => Ok(adapter.integrate(ctx)),
        Err(e @ IntegrationError::Unavailable(_)) => {
            tracing::warn!(error = %e, "auto-refresh not installed");
            Ok(IntegrationHandle::Inert(InertReason::Unavailable(e)))
        }
        Err(e) => Err(e),
    }
}

/// Generates the client program and splices it into HTML
#[derive(Debug, Clone)]
pub struct ScriptInjector {
    config: Arc<EffectiveConfig>,
    mode: BuildMode,
}

impl ScriptInjector {
    pub fn new(config: Arc<EffectiveConfig>, mode: BuildMode) -> Self {
        Self { config, mode }
    }

    /// Settings active for this build mode
    pub fn settings(&self) -> EnvSettings {
        self.config.active(self.mode)
    }

    pub fn quiet(&self) -> bool {
        self.settings().quiet
    }

    pub fn resource(&self) -> &str {
        &self.config.resource
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// The client program for this build
    pub fn script(&self) -> String {
        client::generate(&self.config, self.mode)
    }

    /// Inject the client program into one HTML document
    pub fn inject(&self, html: &str) -> (String, Injection) {
        let (out, outcome) = html::inject_script(html, &self.script());
        if outcome == Injection::NoBodyTag && !self.quiet() {
            tracing::debug!("document has no closing body tag, left unchanged");
        }
        (out, outcome)
    }
}
