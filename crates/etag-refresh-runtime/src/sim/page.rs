//! Virtual-clock page host

use std::collections::VecDeque;

use super::failure::FailureConfig;
use super::server::ScriptedServer;
use crate::page::{PageContext, RuntimeSnapshot};
use crate::payload::{ClientPayload, NotificationPayload, RuntimeOptions};
use crate::runtime::{Effect, Event, FetchOutcome, LogLine};
use crate::state::RuntimeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Due {
    // Earlier variants win ties at the same instant
    FetchResponse,
    Reload,
    Tick,
}

#[derive(Debug, Clone, Copy)]
struct RepeatingTimer {
    period: u64,
    next_at: u64,
}

/// A page executing the client runtime against a scripted server
#[derive(Debug)]
pub struct SimulatedPage {
    page: PageContext,
    payload: ClientPayload,
    server: ScriptedServer,
    now: u64,
    latency_ms: u64,
    polling: Option<RepeatingTimer>,
    active_polling_timers: usize,
    reload_at: Option<u64>,
    pending_fetch: Option<(u64, FetchOutcome)>,
    notification_nodes: usize,
    max_notification_nodes: usize,
    notifications: Vec<u64>,
    reloads: Vec<u64>,
    fetches: Vec<u64>,
    logs: Vec<LogLine>,
}

impl SimulatedPage {
    /// Create a page whose runtime watches `resource`
    pub fn new(resource: &str, interval: u64, quiet: bool) -> Self {
        Self::with_payload(ClientPayload {
            options: RuntimeOptions {
                resource: resource.to_string(),
                interval,
                quiet,
            },
            notification: NotificationPayload {
                container_css: "position: fixed".to_string(),
                button_css: "cursor: pointer".to_string(),
                template: "<div>New version available</div><button>Reload</button>".to_string(),
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Create a page from a full payload
    pub fn with_payload(payload: ClientPayload) -> Self {
        Self {
            page: PageContext::new(),
            payload,
            server: ScriptedServer::new(),
            now: 0,
            latency_ms: 0,
            polling: None,
            active_polling_timers: 0,
            reload_at: None,
            pending_fetch: None,
            notification_nodes: 0,
            max_notification_nodes: 0,
            notifications: Vec::new(),
            reloads: Vec::new(),
            fetches: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Serve the page under `path`; call before [`load`](Self::load)
    pub fn with_page_path(mut self, path: &str) -> Self {
        self.page = PageContext::at_path(path);
        self
    }

    /// Script the server's responses
    pub fn with_responses(mut self, responses: impl IntoIterator<Item = FetchOutcome>) -> Self {
        self.server.push_responses(responses);
        self
    }

    /// Delay every HEAD response by `latency_ms`
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Access the scripted server
    pub fn server_mut(&mut self) -> &mut ScriptedServer {
        &mut self.server
    }

    /// Inject a failure ahead of the scripted responses
    pub fn inject_failure(&mut self, config: FailureConfig) {
        self.server.inject_failure(config);
    }

    /// Execute the injected program (may be called repeatedly)
    pub fn load(&mut self) {
        let effects = self.page.run_entry(&self.payload, self.now);
        self.apply(effects);
    }

    /// Advance the clock by `ms`, firing every timer that falls due
    pub fn advance(&mut self, ms: u64) {
        self.advance_to(self.now + ms);
    }

    /// Advance the clock to `t`, firing every timer that falls due
    pub fn advance_to(&mut self, t: u64) {
        while let Some((at, due)) = self.next_due() {
            if at > t {
                break;
            }
            self.now = at;
            self.fire(due);
        }
        self.now = self.now.max(t);
    }

    /// Click the notification's button; returns false if none is rendered
    pub fn click_refresh(&mut self) -> bool {
        if self.notification_nodes == 0 {
            return false;
        }
        let effects = self.page.dispatch(Event::RefreshClicked, self.now);
        self.apply(effects);
        true
    }

    /// Stop the runtime
    pub fn stop(&mut self) {
        let effects = self.page.stop(self.now);
        self.apply(effects);
    }

    /// Current virtual time
    pub fn now(&self) -> u64 {
        self.now
    }

    /// The underlying page context
    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// Diagnostic snapshot
    pub fn snapshot(&self) -> Option<RuntimeSnapshot> {
        self.page.snapshot()
    }

    /// Runtime state
    pub fn state(&self) -> Option<RuntimeState> {
        self.page.state()
    }

    /// Times at which a notification was rendered
    pub fn notifications(&self) -> &[u64] {
        &self.notifications
    }

    /// Times at which the page reloaded
    pub fn reloads(&self) -> &[u64] {
        &self.reloads
    }

    /// Times at which a HEAD request was issued
    pub fn fetches(&self) -> &[u64] {
        &self.fetches
    }

    /// Notification elements currently in the document
    pub fn notification_nodes(&self) -> usize {
        self.notification_nodes
    }

    /// Largest number of notification elements ever present at once
    pub fn max_notification_nodes(&self) -> usize {
        self.max_notification_nodes
    }

    /// Repeating timers currently running
    pub fn active_polling_timers(&self) -> usize {
        self.active_polling_timers
    }

    /// Whether the automatic reload timer is armed
    pub fn reload_scheduled_at(&self) -> Option<u64> {
        self.reload_at
    }

    /// Console lines printed so far
    pub fn logs(&self) -> &[LogLine] {
        &self.logs
    }

    fn next_due(&self) -> Option<(u64, Due)> {
        let candidates = [
            self.pending_fetch.as_ref().map(|(at, _)| (*at, Due::FetchResponse)),
            self.reload_at.map(|at| (at, Due::Reload)),
            self.polling.map(|timer| (timer.next_at, Due::Tick)),
        ];
        candidates.into_iter().flatten().min()
    }

    fn fire(&mut self, due: Due) {
        let effects = match due {
            Due::FetchResponse => match self.pending_fetch.take() {
                Some((_, outcome)) => self.page.dispatch(Event::FetchCompleted(outcome), self.now),
                None => Vec::new(),
            },
            Due::Reload => {
                self.reload_at = None;
                self.page.dispatch(Event::ReloadTimerFired, self.now)
            }
            Due::Tick => {
                if let Some(timer) = self.polling.as_mut() {
                    timer.next_at += timer.period;
                }
                self.page.dispatch(Event::Tick, self.now)
            }
        };
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Fetch { .. } => {
                    self.fetches.push(self.now);
                    let outcome = self.server.respond();
                    if self.latency_ms == 0 {
                        queue.extend(
                            self.page
                                .dispatch(Event::FetchCompleted(outcome), self.now),
                        );
                    } else {
                        self.pending_fetch = Some((self.now + self.latency_ms, outcome));
                    }
                }
                Effect::StartPolling { interval_ms } => {
                    self.active_polling_timers += 1;
                    self.polling = Some(RepeatingTimer {
                        period: interval_ms,
                        next_at: self.now + interval_ms,
                    });
                }
                Effect::StopPolling => {
                    self.active_polling_timers = self.active_polling_timers.saturating_sub(1);
                    self.polling = None;
                }
                Effect::RenderNotification(_) => {
                    self.notification_nodes += 1;
                    self.max_notification_nodes =
                        self.max_notification_nodes.max(self.notification_nodes);
                    self.notifications.push(self.now);
                }
                Effect::RemoveNotification => {
                    self.notification_nodes = self.notification_nodes.saturating_sub(1);
                }
                Effect::ScheduleReload { delay_ms } => {
                    self.reload_at = Some(self.now + delay_ms);
                }
                Effect::CancelReload => {
                    self.reload_at = None;
                }
                Effect::Reload => {
                    self.reloads.push(self.now);
                }
                Effect::Log(line) => {
                    self.logs.push(line);
                }
            }
        }
    }
}
