use crate::error::HostError;
use crate::settings::Settings;

/// What a key is showing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Face {
    /// Required settings are missing.
    Unconfigured,
    Loading,
    Value(String),
    Error,
}

impl Face {
    /// Short text drawn on the key.
    pub fn label(&self) -> &str {
        match self {
            Face::Unconfigured => "SET UP",
            Face::Loading => "…",
            Face::Value(s) => s,
            Face::Error => "ERR",
        }
    }
}

/// The Stream Deck side of the controller.
///
/// Calls are fire-and-forget: the controller logs a failed call and carries
/// on, it never retries or propagates it.
pub trait Host: Send + 'static {
    fn show(&self, context: &str, face: &Face) -> Result<(), HostError>;

    /// Persist settings for a key. The host may echo them back later as a
    /// settings-changed notification.
    fn write_settings(&self, context: &str, settings: &Settings) -> Result<(), HostError>;

    /// Short "this did nothing" feedback on the key.
    fn alert(&self, _context: &str) -> Result<(), HostError> {
        Ok(())
    }
}
