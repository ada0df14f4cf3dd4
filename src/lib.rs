pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod settings;
pub mod source;

pub use config::{ConfigStore, ConfigView, ControllerOptions, GlobalConfig};
pub use error::{FetchError, HostError};
pub use host::{Face, Host};
pub use lifecycle::{ButtonState, Completion, Controller, Handled, HostEvent, InstanceSnapshot, Reconcile};
pub use settings::{PollSettings, Settings};
pub use source::DataSource;
