use serde_json::{Map, Value};
use streamdeck_lib::Context;
use streamdeck_poller::GlobalConfig;

/// Global settings keys the plugin reads.
const GLOBAL_KEYS: [&str; 3] = ["apiToken", "baseUrl", "timeoutSecs"];

/// Build the plugin-wide configuration from the global settings streamdeck-lib
/// currently holds.
pub fn load_global_config(cx: &Context) -> GlobalConfig {
    let globals = cx.globals();
    let mut obj = Map::new();
    for key in GLOBAL_KEYS {
        if let Some(v) = globals.get(key) {
            obj.insert(key.to_string(), v.clone());
        }
    }
    config_from_globals(&obj)
}

/// Build the plugin-wide configuration from a global settings payload (set
/// from any key's property inspector). A token missing there falls back to the
/// environment.
pub fn config_from_globals(globals: &Map<String, Value>) -> GlobalConfig {
    let obj: Map<String, Value> = GLOBAL_KEYS
        .iter()
        .filter_map(|k| globals.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect();
    GlobalConfig::from_value(&Value::Object(obj)).with_env_fallback()
}
