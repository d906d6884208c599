//! Page-wide singleton
//!
//! A page may execute the injected program more than once. The first
//! execution installs the runtime and every later one is a no-op, so a page
//! never runs more than one polling loop. The installed runtime lives until
//! the page unloads; external readers only ever see a copied snapshot.

use serde::{Deserialize, Serialize};

use crate::payload::{ClientPayload, RuntimeOptions};
use crate::runtime::{ClientRuntime, Effect, Event};
use crate::state::RuntimeState;

/// Read-only diagnostic view, mirrors `window.ETagAutoRefresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    pub started: bool,
    pub current_etag: Option<String>,
    pub last_check_time: Option<u64>,
    pub state: RuntimeState,
    pub version: String,
    pub options: RuntimeOptions,
}

/// One page's execution context
#[derive(Debug, Default)]
pub struct PageContext {
    runtime: Option<ClientRuntime>,
    path: Option<String>,
    version: String,
    entries: u32,
}

impl PageContext {
    /// Create an empty page with no runtime installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty page served under `path` (`location.pathname`)
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Execute the injected entry point
    ///
    /// Installs and activates the runtime on the first call. Later calls
    /// return no effects and leave the installed runtime untouched.
    pub fn run_entry(&mut self, payload: &ClientPayload, now_ms: u64) -> Vec<Effect> {
        self.entries += 1;
        if self.runtime.is_some() {
            tracing::debug!(entries = self.entries, "runtime already started on this page");
            return Vec::new();
        }

        let mut runtime = ClientRuntime::new(payload.options.clone(), payload.notification.clone());
        if let Some(path) = &self.path {
            runtime.set_page_path(path.clone());
        }
        self.version = payload.version.clone();
        let effects = runtime.activate(now_ms);
        self.runtime = Some(runtime);
        effects
    }

    /// Route an event to the installed runtime
    pub fn dispatch(&mut self, event: Event, now_ms: u64) -> Vec<Effect> {
        match self.runtime.as_mut() {
            Some(runtime) => runtime.handle(event, now_ms),
            None => Vec::new(),
        }
    }

    /// Stop polling; the marker stays so the page is never restarted
    pub fn stop(&mut self, now_ms: u64) -> Vec<Effect> {
        self.dispatch(Event::Stop, now_ms)
    }

    /// Tear the page down, dropping the runtime and its marker
    pub fn unload(&mut self) {
        self.runtime = None;
        self.entries = 0;
    }

    /// Copy of the diagnostic state, if the runtime was started
    pub fn snapshot(&self) -> Option<RuntimeSnapshot> {
        self.runtime.as_ref().map(|runtime| RuntimeSnapshot {
            started: true,
            current_etag: runtime.current_etag().map(str::to_string),
            last_check_time: runtime.last_check_time(),
            state: runtime.state(),
            version: self.version.clone(),
            options: runtime.options().clone(),
        })
    }

    /// Current runtime state, if installed
    pub fn state(&self) -> Option<RuntimeState> {
        self.runtime.as_ref().map(ClientRuntime::state)
    }

    /// The installed runtime
    pub fn runtime(&self) -> Option<&ClientRuntime> {
        self.runtime.as_ref()
    }

    /// How many times the entry point has executed
    pub fn entries(&self) -> u32 {
        self.entries
    }
}
