use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::warn;

pub const TOKEN_ENV: &str = "POLLER_API_TOKEN";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFRESH_SECS: u64 = 60;

/// Plugin-wide configuration shared by every key (Stream Deck global settings).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    pub api_token: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl GlobalConfig {
    /// Lenient decode of the global settings object. Unknown keys are ignored,
    /// a malformed object falls back to the defaults.
    pub fn from_value(v: &Value) -> Self {
        match serde_json::from_value::<GlobalConfig>(v.clone()) {
            Ok(cfg) => cfg.normalized(),
            Err(err) => {
                warn!("ignoring malformed global settings: {err}");
                GlobalConfig::default()
            }
        }
    }

    /// Fill a missing token from [`TOKEN_ENV`].
    pub fn with_env_fallback(mut self) -> Self {
        if self.api_token.is_none() {
            self.api_token = std::env::var(TOKEN_ENV)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1))
    }

    fn normalized(mut self) -> Self {
        let blank = |s: &Option<String>| s.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.api_token) {
            self.api_token = None;
        }
        if blank(&self.base_url) {
            self.base_url = None;
        }
        self
    }
}

/// Owner side of the global configuration.
///
/// Values are replaced wholesale, so a reader holding a snapshot never sees a
/// half-updated configuration.
pub struct ConfigStore {
    tx: watch::Sender<Arc<GlobalConfig>>,
}

impl ConfigStore {
    pub fn new(initial: GlobalConfig) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// Publish a new configuration. Returns false (and wakes nobody) when it
    /// equals the current one.
    pub fn replace(&self, next: GlobalConfig) -> bool {
        self.tx.send_if_modified(|cur| {
            if **cur == next {
                false
            } else {
                *cur = Arc::new(next);
                true
            }
        })
    }

    pub fn snapshot(&self) -> Arc<GlobalConfig> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> ConfigView {
        ConfigView { rx: self.tx.subscribe() }
    }
}

/// Read-only subscriber handed to the controller.
#[derive(Clone)]
pub struct ConfigView {
    rx: watch::Receiver<Arc<GlobalConfig>>,
}

impl ConfigView {
    pub fn snapshot(&self) -> Arc<GlobalConfig> {
        self.rx.borrow().clone()
    }

    /// Waits for the next replacement. Errors once the store is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

/// Knobs the plugin sets when it builds a controller.
#[derive(Clone, Debug)]
pub struct ControllerOptions {
    /// Poll period when a key has no `refreshInterval`.
    pub default_interval: Duration,
    /// Write the latest reading back to the key's settings (`lastValue`).
    pub persist_readings: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            persist_readings: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_and_blanks() {
        let cfg = GlobalConfig::from_value(&json!({
            "apiToken": "  ",
            "baseUrl": "https://api.example.com",
            "timeoutSecs": 3,
            "somethingElse": true,
        }));
        assert_eq!(cfg.api_token, None);
        assert_eq!(cfg.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(cfg.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn malformed_globals_fall_back_to_default() {
        let cfg = GlobalConfig::from_value(&json!({ "timeoutSecs": "fast" }));
        assert_eq!(cfg, GlobalConfig::default());
        assert_eq!(cfg.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[tokio::test]
    async fn replace_is_wholesale_and_skips_duplicates() {
        let store = ConfigStore::new(GlobalConfig::default());
        let mut view = store.subscribe();
        let before = view.snapshot();

        let next = GlobalConfig {
            api_token: Some("t".into()),
            ..GlobalConfig::default()
        };
        assert!(store.replace(next.clone()));
        view.changed().await.unwrap();
        assert_eq!(*view.snapshot(), next);
        // an old snapshot is untouched
        assert_eq!(*before, GlobalConfig::default());

        assert!(!store.replace(next));
    }
}
