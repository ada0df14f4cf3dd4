use async_trait::async_trait;

use crate::config::GlobalConfig;
use crate::error::FetchError;
use crate::settings::{RESOURCE, Settings};

pub mod http;

pub use http::HttpSource;

/// Where a polling key gets its reading from.
///
/// The controller may call `fetch` again for the same key before an earlier
/// call finished; only the newest result is ever shown.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Settings keys that must be present before any fetch is attempted.
    fn required_keys(&self) -> &[&'static str] {
        &[RESOURCE]
    }

    async fn fetch(&self, settings: &Settings, config: &GlobalConfig) -> Result<String, FetchError>;
}
