use thiserror::Error;

/// Why a fetch produced no reading.
///
/// Never escapes the controller: it is turned into a display transition.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unauthorized (check the API token)")]
    Unauthorized,

    #[error("rate limited by the remote service")]
    RateLimited,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("could not read response: {0}")]
    Parse(String),

    #[error("nothing found at pointer `{0}`")]
    Missing(String),

    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_body() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// A display update or settings write the host refused.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("host is not connected")]
    Disconnected,

    #[error("host call failed: {0}")]
    Call(String),
}
