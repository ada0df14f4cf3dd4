use std::time::Duration;

use serde_json::{Map, Value};

/// Per-key settings as delivered by the host.
pub type Settings = Map<String, Value>;

pub const RESOURCE: &str = "resource";
pub const REFRESH_INTERVAL: &str = "refreshInterval";
pub const POINTER: &str = "pointer";
pub const LAST_VALUE: &str = "lastValue";

pub const MIN_REFRESH: Duration = Duration::from_secs(1);
pub const MAX_REFRESH: Duration = Duration::from_secs(24 * 60 * 60);

/// Merge `patch` over `base`. Keys in `patch` win; everything else is kept.
///
/// The property inspector only sends the fields it manages, so a plain
/// overwrite would silently drop the rest.
pub fn merge(base: &mut Settings, patch: &Settings) {
    for (k, v) in patch {
        base.insert(k.clone(), v.clone());
    }
}

/// Returns a merged copy without touching `base`.
pub fn merged(base: &Settings, patch: &Settings) -> Settings {
    let mut out = base.clone();
    merge(&mut out, patch);
    out
}

/// A required key counts as present when it holds something other than
/// null, an empty/whitespace string, or an empty container.
pub fn has_value(v: &Settings, k: &str) -> bool {
    match v.get(k) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

pub fn is_configured(v: &Settings, required: &[&str]) -> bool {
    required.iter().all(|k| has_value(v, k))
}

/// True when any of `keys` differs between the two maps.
pub fn any_changed(a: &Settings, b: &Settings, keys: &[&str]) -> bool {
    keys.iter().any(|k| a.get(*k) != b.get(*k))
}

// ── Typed view ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct PollSettings {
    pub resource: Option<String>,
    pub refresh_interval: Duration,
    pub pointer: Option<String>,
    pub last_value: Option<String>,
}

impl PollSettings {
    pub fn parse(v: &Settings, default_interval: Duration) -> Self {
        let refresh_interval = get_u64(v, REFRESH_INTERVAL)
            .map(Duration::from_secs)
            .unwrap_or(default_interval)
            .clamp(MIN_REFRESH, MAX_REFRESH);
        Self {
            resource: get_trimmed(v, RESOURCE),
            refresh_interval,
            pointer: get_trimmed(v, POINTER),
            last_value: get_str(v, LAST_VALUE).map(str::to_string),
        }
    }
}

fn get_str<'a>(v: &'a Settings, k: &str) -> Option<&'a str> {
    v.get(k)?.as_str()
}

fn get_trimmed(v: &Settings, k: &str) -> Option<String> {
    get_str(v, k)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn get_u64(v: &Settings, k: &str) -> Option<u64> {
    match v.get(k) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Settings {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_keeps_fields_outside_patch() {
        let mut base = map(json!({ "resource": "https://a", "refreshInterval": 60, "pointer": "/x" }));
        merge(&mut base, &map(json!({ "refreshInterval": 30 })));
        assert_eq!(
            base,
            map(json!({ "resource": "https://a", "refreshInterval": 30, "pointer": "/x" }))
        );
    }

    #[test]
    fn merge_adds_new_keys() {
        let base = map(json!({ "resource": "r" }));
        let out = merged(&base, &map(json!({ "lastValue": "7" })));
        assert_eq!(out.get("resource"), Some(&json!("r")));
        assert_eq!(out.get("lastValue"), Some(&json!("7")));
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn blank_resource_is_not_configured() {
        let required = [RESOURCE];
        assert!(!is_configured(&map(json!({})), &required));
        assert!(!is_configured(&map(json!({ "resource": "   " })), &required));
        assert!(!is_configured(&map(json!({ "resource": null })), &required));
        assert!(is_configured(&map(json!({ "resource": "x" })), &required));
    }

    #[test]
    fn interval_accepts_numbers_and_strings() {
        let d = Duration::from_secs(60);
        let s = PollSettings::parse(&map(json!({ "refreshInterval": 30 })), d);
        assert_eq!(s.refresh_interval, Duration::from_secs(30));
        let s = PollSettings::parse(&map(json!({ "refreshInterval": " 15 " })), d);
        assert_eq!(s.refresh_interval, Duration::from_secs(15));
    }

    #[test]
    fn interval_falls_back_and_clamps() {
        let d = Duration::from_secs(60);
        assert_eq!(PollSettings::parse(&map(json!({})), d).refresh_interval, d);
        assert_eq!(
            PollSettings::parse(&map(json!({ "refreshInterval": "soon" })), d).refresh_interval,
            d
        );
        assert_eq!(
            PollSettings::parse(&map(json!({ "refreshInterval": 0 })), d).refresh_interval,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn huge_interval_is_capped_at_a_day() {
        let d = Duration::from_secs(60);
        let s = PollSettings::parse(&map(json!({ "refreshInterval": u64::MAX })), d);
        assert_eq!(s.refresh_interval, MAX_REFRESH);
        let s = PollSettings::parse(&map(json!({ "refreshInterval": "18446744073709551615" })), d);
        assert_eq!(s.refresh_interval, MAX_REFRESH);
        // an out-of-range default is capped too
        assert_eq!(PollSettings::parse(&map(json!({})), Duration::MAX).refresh_interval, MAX_REFRESH);
    }

    #[test]
    fn changed_keys_detected() {
        let a = map(json!({ "resource": "a", "pointer": "/x" }));
        let b = map(json!({ "resource": "b", "pointer": "/x" }));
        assert!(any_changed(&a, &b, &[RESOURCE]));
        assert!(!any_changed(&a, &b, &[POINTER]));
    }
}
