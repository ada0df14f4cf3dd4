mod actions;
mod bridge;
mod deck;
mod render;
mod state;

use streamdeck_lib::prelude::*;
use tracing::info;

use actions::poll::PollAction;

pub const PLUGIN_ID: &str = "icu.veelume.poller";

fn main() -> anyhow::Result<()> {
    let _guard = init(PLUGIN_ID);
    info!("Starting Poller Stream Deck plugin");

    // Controller, fetches and timers live here; streamdeck-lib keeps its own
    // threads for the websocket side.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("poller")
        .enable_all()
        .build()?;
    bridge::install(runtime)?;

    let plugin = Plugin::new().add_action(ActionFactory::default_of::<PollAction>());

    run_plugin(plugin)
}
