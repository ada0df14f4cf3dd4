use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde_json::Value;
use tracing::debug;

use super::DataSource;
use crate::config::{DEFAULT_REFRESH_SECS, GlobalConfig};
use crate::error::FetchError;
use crate::settings::{PollSettings, Settings};

/// Longest reading shown on a key.
const MAX_TEXT_CHARS: usize = 32;

/// Polls `resource` over HTTP(S) and turns the body into a key label.
///
/// JSON bodies can be narrowed with a `pointer` setting (`/data/0/price`),
/// anything else is shown as trimmed text.
#[derive(Clone, Default)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch(&self, settings: &Settings, config: &GlobalConfig) -> Result<String, FetchError> {
        let parsed = PollSettings::parse(settings, Duration::from_secs(DEFAULT_REFRESH_SECS));
        let resource = parsed
            .resource
            .as_deref()
            .ok_or_else(|| FetchError::Transport("no resource configured".into()))?;
        let url = resolve_url(resource, config.base_url.as_deref())?;

        let mut req = self
            .client
            .get(&url)
            .timeout(config.timeout())
            .header(header::ACCEPT, "application/json, text/plain;q=0.9");
        if let Some(token) = &config.api_token {
            req = req.bearer_auth(token);
        }

        debug!(%url, "polling");
        let resp = req.send().await?;
        check_status(resp.status())?;

        let body = resp.text().await?;
        reading_from_body(&body, parsed.pointer.as_deref())
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::Unauthorized),
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
        s => Err(FetchError::Status(s.as_u16())),
    }
}

fn resolve_url(resource: &str, base: Option<&str>) -> Result<String, FetchError> {
    if resource.starts_with("http://") || resource.starts_with("https://") {
        return Ok(resource.to_string());
    }
    match base {
        Some(base) => Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            resource.trim_start_matches('/')
        )),
        None => Err(FetchError::Transport(format!(
            "`{resource}` is not an absolute URL and no base URL is set"
        ))),
    }
}

fn reading_from_body(body: &str, pointer: Option<&str>) -> Result<String, FetchError> {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            let target = match pointer {
                Some(p) => json.pointer(p).ok_or_else(|| FetchError::Missing(p.to_string()))?,
                None => &json,
            };
            match target {
                Value::Null => Err(FetchError::Missing(pointer.unwrap_or("").to_string())),
                Value::String(s) => Ok(clip(s)),
                Value::Number(n) => Ok(clip(&n.to_string())),
                Value::Bool(b) => Ok(if *b { "ON" } else { "OFF" }.to_string()),
                other => Ok(clip(&other.to_string())),
            }
        }
        Err(err) if pointer.is_some() => Err(FetchError::Parse(err.to_string())),
        Err(_) => Ok(clip(body.trim().lines().next().unwrap_or(""))),
    }
}

fn clip(text: &str) -> String {
    text.trim().chars().take(MAX_TEXT_CHARS).collect()
}
