//! Native ETag watcher
//!
//! Runs the client runtime's state machine inside a tokio task: the
//! polling interval and reload delay are tokio timers, fetches go through
//! an [`EtagSource`], and what a page would do on screen is published as
//! [`RefreshEvent`]s instead.

mod source;

pub use source::{resolve_url, to_outcome, EtagSource, FetchError, HttpEtagSource, ScriptedSource};

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use etag_refresh_runtime::{
    ClientRuntime, Effect, Event, FetchOutcome, LogLevel, LogLine, NotificationPayload,
    RuntimeOptions,
};

use crate::record::EtagRecord;

/// What the watcher observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    /// First ETag seen; this is the baseline
    Primed { etag: String },
    /// The ETag moved away from the baseline
    Changed { previous: String, etag: String },
    /// The reload delay after a change elapsed
    Reload,
}

/// Handle to a running watcher
#[derive(Debug)]
pub struct WatcherHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    record: EtagRecord,
}

impl WatcherHandle {
    /// Ask the watcher to stop; pending timers are dropped
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// ETags recorded so far
    pub fn record(&self) -> &EtagRecord {
        &self.record
    }

    /// Stop and wait for the task to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "watcher task ended abnormally");
        }
    }
}

/// Spawns watchers
pub struct EtagWatcher;

impl EtagWatcher {
    /// Start watching `options.resource` through `source`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S: EtagSource>(
        source: S,
        options: RuntimeOptions,
        record: EtagRecord,
    ) -> (WatcherHandle, mpsc::UnboundedReceiver<RefreshEvent>) {
        let token = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            source: Arc::new(source),
            runtime: ClientRuntime::new(options, native_notification()),
            record: record.clone(),
            events: events_tx,
            started_at: Instant::now(),
            polling: None,
            reload_at: None,
        };
        let task = tokio::spawn(worker.run(token.clone()));

        (
            WatcherHandle {
                token,
                task,
                record,
            },
            events_rx,
        )
    }
}

fn native_notification() -> NotificationPayload {
    NotificationPayload {
        container_css: String::new(),
        button_css: String::new(),
        template: String::new(),
    }
}

struct Worker<S> {
    source: Arc<S>,
    runtime: ClientRuntime,
    record: EtagRecord,
    events: mpsc::UnboundedSender<RefreshEvent>,
    started_at: Instant,
    polling: Option<Interval>,
    reload_at: Option<Instant>,
}

impl<S: EtagSource> Worker<S> {
    async fn run(mut self, token: CancellationToken) {
        let (fetch_tx, mut fetch_rx) = mpsc::channel::<FetchOutcome>(1);

        tracing::info!(resource = %self.runtime.options().resource, "watcher started");
        let effects = self.runtime.activate(self.now_ms());
        self.apply(effects, &fetch_tx);

        loop {
            let effects = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    let effects = self.runtime.handle(Event::Stop, self.now_ms());
                    self.apply(effects, &fetch_tx);
                    break;
                }
                Some(outcome) = fetch_rx.recv() => self.complete(outcome),
                _ = reload_due(self.reload_at) => {
                    self.reload_at = None;
                    self.runtime.handle(Event::ReloadTimerFired, self.now_ms())
                }
                _ = tick(&mut self.polling) => self.runtime.handle(Event::Tick, self.now_ms()),
            };
            self.apply(effects, &fetch_tx);
        }

        tracing::info!(state = ?self.runtime.state(), "watcher stopped");
    }

    fn complete(&mut self, outcome: FetchOutcome) -> Vec<Effect> {
        let previous = self.runtime.current_etag().map(str::to_string);
        let effects = self
            .runtime
            .handle(Event::FetchCompleted(outcome), self.now_ms());

        if let Some(current) = self.runtime.current_etag() {
            self.record.record(&self.runtime.options().resource, current);
            match previous {
                None => self.publish(RefreshEvent::Primed {
                    etag: current.to_string(),
                }),
                Some(previous) if previous != current => self.publish(RefreshEvent::Changed {
                    previous,
                    etag: current.to_string(),
                }),
                Some(_) => {}
            }
        }
        effects
    }

    fn apply(&mut self, effects: Vec<Effect>, fetch_tx: &mpsc::Sender<FetchOutcome>) {
        for effect in effects {
            match effect {
                Effect::Fetch { resource } => {
                    let source = Arc::clone(&self.source);
                    let tx = fetch_tx.clone();
                    tokio::spawn(async move {
                        let outcome = to_outcome(source.fetch_etag(&resource).await);
                        // Receiver is gone once the watcher stopped
                        let _ = tx.send(outcome).await;
                    });
                }
                Effect::StartPolling { interval_ms } => {
                    let period = Duration::from_millis(interval_ms);
                    let mut interval = interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    self.polling = Some(interval);
                }
                Effect::StopPolling => self.polling = None,
                Effect::ScheduleReload { delay_ms } => {
                    self.reload_at = Some(Instant::now() + Duration::from_millis(delay_ms));
                }
                Effect::CancelReload => self.reload_at = None,
                Effect::Reload => self.publish(RefreshEvent::Reload),
                Effect::RenderNotification(_) | Effect::RemoveNotification => {}
                Effect::Log(line) => emit(&line),
            }
        }
    }

    fn publish(&self, event: RefreshEvent) {
        tracing::debug!(?event, "refresh event");
        // Nobody listening is fine; the record still fills
        let _ = self.events.send(event);
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

async fn tick(polling: &mut Option<Interval>) {
    match polling {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn reload_due(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending::<()>().await,
    }
}

fn emit(line: &LogLine) {
    match line.level {
        LogLevel::Debug => tracing::debug!("{}", line.message),
        LogLevel::Info => tracing::info!("{}", line.message),
        LogLevel::Warn => tracing::warn!("{}", line.message),
        LogLevel::Error => tracing::error!("{}", line.message),
    }
}
