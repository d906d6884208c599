//! Hook-pipeline integration
//!
//! The host calls [`HookPipelineIntegration::on_compilation`] once per
//! compilation with whatever HTML it can hand over, and
//! [`HookPipelineIntegration::on_done`] when a build finishes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::ScriptInjector;
use crate::html::Injection;

/// An emitted asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    source: String,
    size: usize,
}

impl Asset {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let size = source.len();
        Self { source, size }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

/// HTML the host exposes for one compilation
///
/// `html_documents` is set when the host has an HTML post-processing hook;
/// `assets` is set when it has an emitted-assets hook.
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub html_documents: Option<Vec<String>>,
    pub assets: Option<BTreeMap<String, Asset>>,
}

impl Compilation {
    /// A compilation that exposes rendered HTML documents
    pub fn with_html(documents: Vec<String>) -> Self {
        Self {
            html_documents: Some(documents),
            assets: None,
        }
    }

    /// A compilation that exposes its emitted assets
    pub fn with_assets(assets: BTreeMap<String, Asset>) -> Self {
        Self {
            html_documents: None,
            assets: Some(assets),
        }
    }
}

/// Which path rewrote the compilation's HTML
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPath {
    HtmlHook,
    AssetsFallback,
    None,
}

/// Summary of one compilation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationReport {
    pub path: InjectionPath,
    /// Documents that received the script
    pub injected: usize,
    /// Documents left unchanged
    pub unchanged: usize,
}

/// Hook-pipeline registration
#[derive(Debug, Clone)]
pub struct HookPipelineIntegration {
    injector: ScriptInjector,
    builds_completed: Arc<AtomicU64>,
}

impl HookPipelineIntegration {
    pub fn new(injector: ScriptInjector) -> Self {
        Self {
            injector,
            builds_completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build-finished hook
    pub fn on_done(&self) -> u64 {
        let builds = self.builds_completed.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.injector.quiet() {
            tracing::info!(builds, resource = self.injector.resource(), "build finished");
        }
        builds
    }

    /// Builds reported through [`on_done`](Self::on_done)
    pub fn builds_completed(&self) -> u64 {
        self.builds_completed.load(Ordering::SeqCst)
    }

    /// Compilation hook: inject into the compilation's HTML
    ///
    /// Exactly one path runs: the HTML post-processing documents when the
    /// host provides them, otherwise the `.html` emitted assets.
    pub fn on_compilation(&self, compilation: &mut Compilation) -> CompilationReport {
        if let Some(documents) = compilation.html_documents.as_mut() {
            if !self.injector.quiet() {
                tracing::info!("injecting client script into HTML output");
            }
            let mut report = CompilationReport {
                path: InjectionPath::HtmlHook,
                injected: 0,
                unchanged: 0,
            };
            for document in documents.iter_mut() {
                let (html, outcome) = self.injector.inject(document);
                *document = html;
                count(&mut report, outcome);
            }
            return report;
        }

        if let Some(assets) = compilation.assets.as_mut() {
            if !self.injector.quiet() {
                tracing::info!("injecting client script into emitted HTML assets");
            }
            let mut report = CompilationReport {
                path: InjectionPath::AssetsFallback,
                injected: 0,
                unchanged: 0,
            };
            for (name, asset) in assets.iter_mut() {
                if !name.ends_with(".html") {
                    continue;
                }
                let (html, outcome) = self.injector.inject(asset.source());
                if outcome.is_injected() {
                    *asset = Asset::new(html);
                    tracing::debug!(asset = %name, size = asset.size(), "asset rewritten");
                }
                count(&mut report, outcome);
            }
            return report;
        }

        tracing::debug!("compilation exposes no HTML, nothing injected");
        CompilationReport {
            path: InjectionPath::None,
            injected: 0,
            unchanged: 0,
        }
    }
}

fn count(report: &mut CompilationReport, outcome: Injection) {
    if outcome.is_injected() {
        report.injected += 1;
    } else {
        report.unchanged += 1;
    }
}
