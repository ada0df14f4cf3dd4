mod instance;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{ConfigView, ControllerOptions};
use crate::error::FetchError;
use crate::host::{Face, Host};
use crate::settings::{self, LAST_VALUE, MAX_REFRESH, PollSettings, Settings};
use crate::source::DataSource;

pub use instance::{ButtonState, InstanceSnapshot};
use instance::{ButtonInstance, Timer};

/// Notifications the host delivers for a key.
#[derive(Clone, Debug)]
pub enum HostEvent {
    Appear { context: String, settings: Settings },
    Disappear { context: String },
    SettingsChanged { context: String, settings: Settings },
    Interaction { context: String },
}

/// How a settings notification was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconcile {
    /// Echo of our own write: cache merged, nothing restarted.
    Echo,
    /// Timer and refresh cycle restarted with the merged settings.
    Restarted,
    /// Merged settings lack a required key; polling stopped.
    Unconfigured,
    /// No visible key with that id.
    Unknown,
}

/// What became of a finished fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Displayed,
    /// Fetch failed, last good reading still shown.
    KeptPrevious,
    /// Fetch failed with nothing cached, error face shown.
    Failed,
    /// A newer cycle started (or the key went away); result dropped.
    Stale,
}

/// Result of processing one internal message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handled {
    Tick { refreshed: bool },
    Fetch(Completion),
}

enum Internal {
    Tick {
        context: String,
        timer: u64,
    },
    Fetched {
        context: String,
        generation: u64,
        result: Result<String, FetchError>,
    },
}

/// Owns every visible key of one action type. Fetches and timers report back
/// over a channel and are dropped once their key has moved on.
pub struct Controller<S, H> {
    source: Arc<S>,
    host: H,
    config: ConfigView,
    options: ControllerOptions,
    instances: HashMap<String, ButtonInstance>,
    // Shared by all entries so a context id reused after a disappear never
    // matches a message from its previous life.
    next_generation: u64,
    next_timer: u64,
    tx: mpsc::UnboundedSender<Internal>,
    rx: mpsc::UnboundedReceiver<Internal>,
}

impl<S: DataSource, H: Host> Controller<S, H> {
    pub fn new(source: S, host: H, config: ConfigView, options: ControllerOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source: Arc::new(source),
            host,
            config,
            options,
            instances: HashMap::new(),
            next_generation: 0,
            next_timer: 0,
            tx,
            rx,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn state(&self, context: &str) -> ButtonState {
        self.instances
            .get(context)
            .map_or(ButtonState::Removed, |e| e.state)
    }

    pub fn inspect(&self, context: &str) -> Option<InstanceSnapshot> {
        self.instances.get(context).map(ButtonInstance::snapshot)
    }

    /// Number of running timers across all keys.
    pub fn active_timers(&self) -> usize {
        self.instances.values().filter(|e| e.timer.is_some()).count()
    }

    // ── Host notifications ──────────────────────────────────────────────────

    pub fn dispatch(&mut self, event: HostEvent) {
        match event {
            HostEvent::Appear { context, settings } => self.on_appear(&context, settings),
            HostEvent::Disappear { context } => self.on_disappear(&context),
            HostEvent::SettingsChanged { context, settings } => {
                self.on_settings_changed(&context, settings);
            }
            HostEvent::Interaction { context } => self.on_manual_trigger(&context),
        }
    }

    /// A key became visible. Must be called from within a tokio runtime.
    pub fn on_appear(&mut self, context: &str, settings: Settings) {
        if self.instances.remove(context).is_some() {
            debug!(context, "appear for a live key, replacing its entry");
        }

        let mut entry = ButtonInstance::new(settings);
        entry.cached = PollSettings::parse(&entry.settings, self.options.default_interval).last_value;
        self.instances.insert(context.to_string(), entry);
        info!(context, "key appeared");
        self.start(context);
    }

    /// A key went away. Unknown ids are ignored.
    pub fn on_disappear(&mut self, context: &str) {
        match self.instances.remove(context) {
            Some(mut entry) => {
                entry.stop_timer();
                entry.cached = None;
                entry.pending_writes.clear();
                info!(context, "key disappeared");
            }
            None => debug!(context, "disappear for unknown key"),
        }
    }

    pub fn on_settings_changed(&mut self, context: &str, payload: Settings) -> Reconcile {
        let required = self.source.required_keys();
        let Some(entry) = self.instances.get_mut(context) else {
            debug!(context, "settings for unknown key ignored");
            return Reconcile::Unknown;
        };

        let next = settings::merged(&entry.settings, &payload);
        if let Some(newer_pending) = entry.take_echo(&next) {
            // a newer write is already in the cache; keep it
            if !newer_pending {
                entry.settings = next;
            }
            debug!(context, newer_pending, "settings echo suppressed");
            return Reconcile::Echo;
        }
        if !entry.pending_writes.is_empty() {
            debug!(context, "own writes superseded by an external change");
            entry.pending_writes.clear();
        }

        if settings::any_changed(&entry.settings, &next, required) {
            entry.cached = None;
            entry.failures = 0;
        }
        entry.settings = next;

        if self.start(context) {
            Reconcile::Restarted
        } else {
            Reconcile::Unconfigured
        }
    }

    /// Out-of-band refresh (key press). The timer keeps its schedule.
    pub fn on_manual_trigger(&mut self, context: &str) {
        let Some(entry) = self.instances.get(context) else {
            debug!(context, "trigger for unknown key");
            return;
        };
        if entry.state == ButtonState::Unconfigured {
            if let Err(err) = self.host.alert(context) {
                warn!(context, %err, "alert failed");
            }
            return;
        }
        self.refresh_cycle(context);
    }

    /// Global configuration was replaced: refresh every configured key.
    pub fn on_config_changed(&mut self) {
        let live: Vec<String> = self
            .instances
            .iter()
            .filter(|(_, e)| e.state != ButtonState::Unconfigured)
            .map(|(k, _)| k.clone())
            .collect();
        info!(keys = live.len(), "global configuration changed");
        for context in live {
            self.refresh_cycle(&context);
        }
    }

    /// Plugin is stopping: release every key.
    pub fn shutdown(&mut self) {
        for (context, mut entry) in self.instances.drain() {
            entry.stop_timer();
            debug!(context = %context, "released on shutdown");
        }
    }

    /// Controller-initiated settings write. The host's echo of this exact
    /// content is a no-op in [`Self::on_settings_changed`], even when further
    /// writes go out before it arrives.
    pub fn write_settings(&mut self, context: &str, patch: &Settings) -> bool {
        let Some(entry) = self.instances.get_mut(context) else {
            return false;
        };
        let next = settings::merged(&entry.settings, patch);
        entry.expect_echo(next.clone());
        entry.settings = next;

        match self.host.write_settings(context, &entry.settings) {
            Ok(()) => true,
            Err(err) => {
                warn!(context, %err, "settings write failed");
                entry.pending_writes.pop_back();
                false
            }
        }
    }

    // ── Internal messages ───────────────────────────────────────────────────

    /// Waits for and applies the next tick or fetch completion.
    pub async fn pump(&mut self) -> Option<Handled> {
        let msg = self.rx.recv().await?;
        Some(self.handle(msg))
    }

    /// Drives the controller until the host side of `events` closes, then
    /// releases every key.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<HostEvent>) {
        let mut config_open = true;
        loop {
            tokio::select! {
                ev = events.recv() => match ev {
                    Some(ev) => self.dispatch(ev),
                    None => break,
                },
                Some(msg) = self.rx.recv() => {
                    self.handle(msg);
                }
                res = self.config.changed(), if config_open => match res {
                    Ok(()) => self.on_config_changed(),
                    Err(_) => {
                        debug!("configuration store dropped");
                        config_open = false;
                    }
                },
            }
        }
        info!("host channel closed, stopping");
        self.shutdown();
    }

    fn handle(&mut self, msg: Internal) -> Handled {
        match msg {
            Internal::Tick { context, timer } => {
                let live = self
                    .instances
                    .get(&context)
                    .and_then(|e| e.timer.as_ref())
                    .is_some_and(|t| t.id == timer);
                if !live {
                    debug!(context = %context, timer, "tick from a cancelled timer");
                    return Handled::Tick { refreshed: false };
                }
                self.refresh_cycle(&context);
                Handled::Tick { refreshed: true }
            }
            Internal::Fetched {
                context,
                generation,
                result,
            } => Handled::Fetch(self.complete(&context, generation, result)),
        }
    }

    // ── Refresh cycle ───────────────────────────────────────────────────────

    /// Refresh now and start polling, or fall back to the placeholder.
    /// Returns whether the key is configured.
    fn start(&mut self, context: &str) -> bool {
        let required = self.source.required_keys();
        let Some(entry) = self.instances.get_mut(context) else {
            return false;
        };
        entry.stop_timer();

        if !settings::is_configured(&entry.settings, required) {
            // invalidate anything still in flight
            entry.generation = bump(&mut self.next_generation);
            entry.state = ButtonState::Unconfigured;
            show(&self.host, context, &Face::Unconfigured);
            return false;
        }

        let period = PollSettings::parse(&entry.settings, self.options.default_interval).refresh_interval;
        self.refresh_cycle(context);
        self.start_timer(context, period);
        true
    }

    fn refresh_cycle(&mut self, context: &str) {
        let Some(entry) = self.instances.get_mut(context) else {
            return;
        };
        let generation = bump(&mut self.next_generation);
        entry.generation = generation;
        entry.state = ButtonState::Loading;
        let settings = entry.settings.clone();
        show(&self.host, context, &Face::Loading);

        let config = self.config.snapshot();
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let context = context.to_string();
        debug!(context = %context, generation, "refresh started");

        tokio::spawn(async move {
            // a panicking source must still produce a completion
            let fetch = tokio::spawn(async move { source.fetch(&settings, &config).await });
            let result = match fetch.await {
                Ok(result) => result,
                Err(err) => Err(FetchError::Aborted(err.to_string())),
            };
            let _ = tx.send(Internal::Fetched {
                context,
                generation,
                result,
            });
        });
    }

    fn start_timer(&mut self, context: &str, period: Duration) {
        let id = bump(&mut self.next_timer);
        let tx = self.tx.clone();
        let ctx = context.to_string();
        let handle = tokio::spawn(async move {
            let now = Instant::now();
            let start = now.checked_add(period).unwrap_or(now + MAX_REFRESH);
            let mut ticker = time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let tick = Internal::Tick {
                    context: ctx.clone(),
                    timer: id,
                };
                if tx.send(tick).is_err() {
                    break;
                }
            }
        });

        let timer = Timer::new(id, handle);
        if let Some(entry) = self.instances.get_mut(context) {
            debug!(context, timer = id, period_secs = period.as_secs(), "timer started");
            entry.timer = Some(timer);
        }
    }

    fn complete(&mut self, context: &str, generation: u64, result: Result<String, FetchError>) -> Completion {
        let Some(entry) = self.instances.get_mut(context) else {
            debug!(context, generation, "result for a removed key dropped");
            return Completion::Stale;
        };
        if entry.generation != generation {
            debug!(context, generation, current = entry.generation, "stale result dropped");
            return Completion::Stale;
        }

        match result {
            Ok(text) => {
                entry.failures = 0;
                entry.cached = Some(text.clone());
                entry.state = ButtonState::Displaying;
                let persist = self.options.persist_readings
                    && entry.settings.get(LAST_VALUE).and_then(Value::as_str) != Some(text.as_str());
                show(&self.host, context, &Face::Value(text.clone()));

                if persist {
                    let mut patch = Settings::new();
                    patch.insert(LAST_VALUE.to_string(), Value::String(text));
                    self.write_settings(context, &patch);
                }
                Completion::Displayed
            }
            Err(err) => {
                entry.failures = entry.failures.saturating_add(1);
                let failures = entry.failures;
                match entry.cached.clone() {
                    Some(prev) => {
                        warn!(context, failures, %err, "fetch failed, keeping last reading");
                        entry.state = ButtonState::Displaying;
                        show(&self.host, context, &Face::Value(prev));
                        Completion::KeptPrevious
                    }
                    None => {
                        warn!(context, failures, %err, "fetch failed");
                        entry.state = ButtonState::ErrorDisplaying;
                        show(&self.host, context, &Face::Error);
                        Completion::Failed
                    }
                }
            }
        }
    }
}

fn bump(seq: &mut u64) -> u64 {
    *seq += 1;
    *seq
}

fn show<H: Host>(host: &H, context: &str, face: &Face) {
    if let Err(err) = host.show(context, face) {
        warn!(context, %err, "display update failed");
    }
}
