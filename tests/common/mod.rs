#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use streamdeck_poller::{
    ConfigStore, Controller, ControllerOptions, DataSource, Face, FetchError, GlobalConfig, Host,
    HostError, Settings,
};
use tokio::sync::oneshot;

pub fn settings(v: Value) -> Settings {
    v.as_object().cloned().expect("settings must be a JSON object")
}

// ── Host ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    Show(String, Face),
    Write(String, Settings),
    Alert(String),
}

#[derive(Clone, Default)]
pub struct RecordingHost {
    calls: Arc<Mutex<Vec<HostCall>>>,
    fail_writes: Arc<AtomicBool>,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn faces(&self, context: &str) -> Vec<Face> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Show(ctx, face) if ctx == context => Some(face),
                _ => None,
            })
            .collect()
    }

    pub fn last_face(&self, context: &str) -> Option<Face> {
        self.faces(context).pop()
    }

    pub fn writes(&self, context: &str) -> Vec<Settings> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Write(ctx, s) if ctx == context => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self, context: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HostCall::Alert(ctx) if ctx == context))
            .count()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Host for RecordingHost {
    fn show(&self, context: &str, face: &Face) -> Result<(), HostError> {
        self.calls
            .lock()
            .unwrap()
            .push(HostCall::Show(context.to_string(), face.clone()));
        Ok(())
    }

    fn write_settings(&self, context: &str, settings: &Settings) -> Result<(), HostError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HostError::Disconnected);
        }
        self.calls
            .lock()
            .unwrap()
            .push(HostCall::Write(context.to_string(), settings.clone()));
        Ok(())
    }

    fn alert(&self, context: &str) -> Result<(), HostError> {
        self.calls
            .lock()
            .unwrap()
            .push(HostCall::Alert(context.to_string()));
        Ok(())
    }
}

// ── Source ──────────────────────────────────────────────────────────────────

pub struct Call {
    pub settings: Settings,
    pub config: GlobalConfig,
    reply: Option<oneshot::Sender<Result<String, FetchError>>>,
}

/// Every fetch parks until the test resolves it by call index.
#[derive(Clone, Default)]
pub struct ManualSource {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ManualSource {
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn settings_of(&self, call: usize) -> Settings {
        self.calls.lock().unwrap()[call].settings.clone()
    }

    pub fn config_of(&self, call: usize) -> GlobalConfig {
        self.calls.lock().unwrap()[call].config.clone()
    }

    pub fn resolve(&self, call: usize, result: Result<String, FetchError>) {
        let reply = self.calls.lock().unwrap()[call]
            .reply
            .take()
            .expect("call already resolved");
        let _ = reply.send(result);
    }

    /// Lets spawned fetch tasks run until `n` calls have been made.
    pub async fn wait_calls(&self, n: usize) {
        for _ in 0..1000 {
            if self.calls() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} fetch calls, saw {}", self.calls());
    }

    /// Lets pending tasks run, then checks the call count did not move.
    pub async fn assert_calls(&self, n: usize) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(self.calls(), n);
    }
}

#[async_trait]
impl DataSource for ManualSource {
    async fn fetch(&self, settings: &Settings, config: &GlobalConfig) -> Result<String, FetchError> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(Call {
            settings: settings.clone(),
            config: config.clone(),
            reply: Some(tx),
        });
        rx.await
            .unwrap_or_else(|_| Err(FetchError::Aborted("test dropped the call".into())))
    }
}

pub type TestController = Controller<ManualSource, RecordingHost>;

pub struct Harness {
    pub ctrl: TestController,
    pub source: ManualSource,
    pub store: ConfigStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(ControllerOptions::default())
    }

    pub fn with_options(options: ControllerOptions) -> Self {
        let source = ManualSource::default();
        let store = ConfigStore::new(GlobalConfig::default());
        let ctrl = Controller::new(source.clone(), RecordingHost::default(), store.subscribe(), options);
        Self { ctrl, source, store }
    }

    pub fn host(&self) -> &RecordingHost {
        self.ctrl.host()
    }
}
