//! Client runtime: the polling state machine
//!
//! The runtime owns the baseline ETag and decides what the host must do
//! next. Hosts report timer expiries, fetch completions and clicks as
//! [`Event`]s and execute the [`Effect`]s that come back, in order.
//!
//! Ordering rules:
//! - The baseline is replaced at detection time, before any notification
//!   or reload effect is emitted.
//! - Only one fetch is in flight at a time; a tick that arrives while the
//!   previous fetch is outstanding is skipped.
//! - Every fetch failure is absorbed into a log line; nothing escapes a tick.
//! - A check is skipped when either the resource or the page's own path is
//!   a dev-server internal path (`/@…`).

use serde::{Deserialize, Serialize};

use crate::payload::{NotificationPayload, RuntimeOptions};
use crate::state::{RuntimeState, TerminalState, TransitionError};
use crate::{is_internal_path, RELOAD_DELAY_MS};

/// Result of one HEAD request against the watched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Successful response carrying an ETag header
    Etag(String),
    /// Successful response without an ETag header
    MissingEtag,
    /// Non-success HTTP status
    Status(u16),
    /// Network failure or aborted request
    Network(String),
}

/// Inputs to the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The repeating polling timer fired
    Tick,
    /// The outstanding HEAD request finished
    FetchCompleted(FetchOutcome),
    /// The post-notification reload timer fired
    ReloadTimerFired,
    /// The user clicked the notification's refresh button
    RefreshClicked,
    /// Explicit external stop (page teardown)
    Stop,
}

/// Console severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A console line for the host to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Work the host must perform, in the order returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue a no-store HEAD request to the resource and report the outcome
    Fetch { resource: String },
    /// Start the repeating timer
    StartPolling { interval_ms: u64 },
    /// Clear the repeating timer
    StopPolling,
    /// Insert the notification element
    RenderNotification(NotificationPayload),
    /// Remove the notification element if present
    RemoveNotification,
    /// Arm the one-shot reload timer
    ScheduleReload { delay_ms: u64 },
    /// Disarm the one-shot reload timer
    CancelReload,
    /// Reload the page now
    Reload,
    /// Print a console line
    Log(LogLine),
}

/// The polling state machine for one page
#[derive(Debug, Clone)]
pub struct ClientRuntime {
    options: RuntimeOptions,
    notification: NotificationPayload,
    state: RuntimeState,
    page_path: Option<String>,
    activated: bool,
    current_etag: Option<String>,
    last_check_time: Option<u64>,
    in_flight: bool,
    notification_shown: bool,
    reload_pending: bool,
    changes_detected: u64,
}

impl ClientRuntime {
    /// Create a runtime in UNINITIALIZED state; nothing happens until [`activate`](Self::activate)
    pub fn new(options: RuntimeOptions, notification: NotificationPayload) -> Self {
        Self {
            options,
            notification,
            state: RuntimeState::Uninitialized,
            page_path: None,
            activated: false,
            current_etag: None,
            last_check_time: None,
            in_flight: false,
            notification_shown: false,
            reload_pending: false,
            changes_detected: 0,
        }
    }

    /// Record the path of the page hosting this runtime
    pub fn set_page_path(&mut self, path: impl Into<String>) {
        self.page_path = Some(path.into());
    }

    /// Start the repeating timer and issue the primer fetch
    pub fn activate(&mut self, now_ms: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.activated {
            return effects;
        }
        self.activated = true;

        self.log(
            &mut effects,
            LogLevel::Info,
            format!("Started checking for updates every {} ms", self.options.interval),
        );
        effects.push(Effect::StartPolling {
            interval_ms: self.options.interval,
        });
        self.begin_check(now_ms, &mut effects);
        effects
    }

    /// Feed one event into the machine
    pub fn handle(&mut self, event: Event, now_ms: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.state.is_terminal() {
            return effects;
        }

        match event {
            Event::Tick => self.begin_check(now_ms, &mut effects),
            Event::FetchCompleted(outcome) => self.complete_check(outcome, &mut effects),
            Event::ReloadTimerFired => {
                if self.reload_pending {
                    self.reload_pending = false;
                    self.finish_notifying(&mut effects);
                }
            }
            Event::RefreshClicked => {
                if self.notification_shown {
                    if self.reload_pending {
                        self.reload_pending = false;
                        effects.push(Effect::CancelReload);
                    }
                    self.finish_notifying(&mut effects);
                }
            }
            Event::Stop => self.stop(&mut effects),
        }

        effects
    }

    /// Current state
    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Baseline ETag, if one has been captured
    pub fn current_etag(&self) -> Option<&str> {
        self.current_etag.as_deref()
    }

    /// Time the most recent check started
    pub fn last_check_time(&self) -> Option<u64> {
        self.last_check_time
    }

    /// Active options
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Number of changes detected since activation
    pub fn changes_detected(&self) -> u64 {
        self.changes_detected
    }

    /// Whether a fetch is outstanding
    pub fn is_fetch_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether the automatic reload timer is armed
    pub fn is_reload_pending(&self) -> bool {
        self.reload_pending
    }

    /// Transition to a new state
    pub fn transition(&mut self, new_state: RuntimeState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(new_state) {
            return Err(TransitionError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }

        tracing::trace!(from = ?self.state, to = ?new_state, "runtime transition");
        self.state = new_state;
        Ok(())
    }

    fn enter(&mut self, new_state: RuntimeState) {
        if let Err(e) = self.transition(new_state) {
            tracing::error!(error = %e, "runtime transition rejected");
        }
    }

    fn begin_check(&mut self, now_ms: u64, effects: &mut Vec<Effect>) {
        if self.in_flight {
            self.log(
                effects,
                LogLevel::Debug,
                "Previous check still running, skipping this tick".to_string(),
            );
            return;
        }

        let internal_page = self.page_path.as_deref().is_some_and(is_internal_path);
        if is_internal_path(&self.options.resource) || internal_page {
            self.log(
                effects,
                LogLevel::Debug,
                "Skipping dev-server internal path".to_string(),
            );
            return;
        }

        self.last_check_time = Some(now_ms);
        self.in_flight = true;
        effects.push(Effect::Fetch {
            resource: self.options.resource.clone(),
        });
    }

    fn complete_check(&mut self, outcome: FetchOutcome, effects: &mut Vec<Effect>) {
        if !self.in_flight {
            tracing::debug!("ignoring fetch completion with no request outstanding");
            return;
        }
        self.in_flight = false;

        let etag = match outcome {
            FetchOutcome::Etag(etag) => etag,
            FetchOutcome::MissingEtag => {
                self.log(
                    effects,
                    LogLevel::Warn,
                    "Server did not return an ETag header".to_string(),
                );
                return;
            }
            FetchOutcome::Status(status) => {
                self.log(
                    effects,
                    LogLevel::Error,
                    format!("Update check failed with status {}", status),
                );
                return;
            }
            FetchOutcome::Network(reason) => {
                self.log(
                    effects,
                    LogLevel::Error,
                    format!("Update check failed: {}", reason),
                );
                return;
            }
        };

        match self.state {
            RuntimeState::Uninitialized => {
                self.log(effects, LogLevel::Info, format!("Initial ETag: {}", etag));
                self.current_etag = Some(etag);
                self.enter(RuntimeState::Primed);
                self.enter(RuntimeState::Polling);
            }
            RuntimeState::Polling | RuntimeState::Notifying => {
                if self.current_etag.as_deref() == Some(etag.as_str()) {
                    return;
                }
                let previous = self.current_etag.replace(etag);
                self.log(
                    effects,
                    LogLevel::Info,
                    format!(
                        "ETag changed: {} -> {}",
                        previous.as_deref().unwrap_or("<none>"),
                        self.current_etag.as_deref().unwrap_or("<none>")
                    ),
                );
                self.notify(effects);
            }
            RuntimeState::Primed | RuntimeState::Stopped => {}
        }
    }

    fn notify(&mut self, effects: &mut Vec<Effect>) {
        self.changes_detected += 1;
        self.enter(RuntimeState::Notifying);

        if self.reload_pending {
            effects.push(Effect::CancelReload);
        }

        if !self.options.quiet {
            if self.notification_shown {
                effects.push(Effect::RemoveNotification);
            }
            effects.push(Effect::RenderNotification(self.notification.clone()));
            self.notification_shown = true;
        }

        effects.push(Effect::ScheduleReload {
            delay_ms: RELOAD_DELAY_MS,
        });
        self.reload_pending = true;
    }

    fn finish_notifying(&mut self, effects: &mut Vec<Effect>) {
        if self.notification_shown {
            self.notification_shown = false;
            effects.push(Effect::RemoveNotification);
        }
        effects.push(Effect::Reload);
        self.enter(RuntimeState::Polling);
    }

    fn stop(&mut self, effects: &mut Vec<Effect>) {
        effects.push(Effect::StopPolling);
        if self.reload_pending {
            self.reload_pending = false;
            effects.push(Effect::CancelReload);
        }
        self.in_flight = false;
        self.enter(RuntimeState::Stopped);
    }

    fn log(&self, effects: &mut Vec<Effect>, level: LogLevel, message: String) {
        if self.options.quiet {
            return;
        }
        effects.push(Effect::Log(LogLine { level, message }));
    }
}
