//! ETag Refresh Runtime
//!
//! The change-detection state machine that runs inside a page. It is
//! sans-IO: callers feed [`Event`]s in and carry out the returned
//! [`Effect`]s (HEAD requests, timers, DOM changes, reloads). The
//! generated browser program and the native watcher both follow it.

pub mod page;
pub mod payload;
pub mod runtime;
pub mod sim;
pub mod state;

pub use page::{PageContext, RuntimeSnapshot};
pub use payload::{ClientPayload, NotificationPayload, RuntimeOptions};
pub use runtime::{ClientRuntime, Effect, Event, FetchOutcome, LogLevel, LogLine};
pub use state::{RuntimeState, TerminalState, TransitionError};

/// Delay between detecting a change and the automatic reload.
pub const RELOAD_DELAY_MS: u64 = 3000;

/// Prefix used for every console line the runtime produces.
pub const LOG_PREFIX: &str = "[ETagAutoRefresh]";

/// Returns true for dev-server internal paths that are never polled.
pub fn is_internal_path(path: &str) -> bool {
    path.starts_with("/@")
}
