use std::sync::OnceLock;

use anyhow::anyhow;
use streamdeck_lib::Context;
use streamdeck_poller::source::HttpSource;
use streamdeck_poller::{ConfigStore, Controller, ControllerOptions, GlobalConfig, HostEvent};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use crate::deck::DeckHost;

static BRIDGE: OnceLock<Bridge> = OnceLock::new();

struct Bridge {
    runtime: Runtime,
    config: ConfigStore,
    // Set on the first callback, which is the first time a Context exists.
    events: OnceLock<UnboundedSender<HostEvent>>,
}

pub fn install(runtime: Runtime) -> anyhow::Result<()> {
    let bridge = Bridge {
        runtime,
        config: ConfigStore::new(GlobalConfig::default().with_env_fallback()),
        events: OnceLock::new(),
    };
    BRIDGE
        .set(bridge)
        .map_err(|_| anyhow!("controller bridge installed twice"))
}

/// Forward a key notification to the controller, starting it if needed.
pub fn send(cx: &Context, event: HostEvent) {
    let Some(bridge) = BRIDGE.get() else {
        warn!("key event before the controller bridge was installed");
        return;
    };
    let tx = bridge.events.get_or_init(|| bridge.start(cx));
    if tx.send(event).is_err() {
        warn!("controller has stopped, dropping key event");
    }
}

/// Replace the global configuration; a no-op when nothing changed.
pub fn publish_config(config: GlobalConfig) {
    if let Some(bridge) = BRIDGE.get() {
        if bridge.config.replace(config) {
            debug!("global configuration replaced");
        }
    }
}

impl Bridge {
    fn start(&self, cx: &Context) -> UnboundedSender<HostEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let options = ControllerOptions {
            persist_readings: true,
            ..ControllerOptions::default()
        };
        let controller = Controller::new(
            HttpSource::new(),
            DeckHost::new(cx.clone()),
            self.config.subscribe(),
            options,
        );
        self.runtime.spawn(controller.run(rx));
        info!("poll controller started");
        tx
    }
}
