use crate::property_store::StoreError;
use reqwest::StatusCode;

/// Result type alias for tracker operations
pub type Result<T, E = TrackerError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("collection endpoint returned {0}")]
    Status(StatusCode),
}

impl TransportError {
    /// Connection-level failures and throttling/unavailability responses.
    pub fn is_retriable(&self, retry_on_status: &[u16]) -> bool {
        match self {
            TransportError::Reqwest(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            TransportError::Status(status) => retry_on_status.contains(&status.as_u16()),
        }
    }
}

/// Errors that can occur while normalizing or dispatching a hit
#[derive(thiserror::Error, Debug)]
pub enum TrackerError {
    #[error("tracking ID required: the hit has no `tid` and no default tracking ID is configured")]
    Configuration,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("property store error: {0}")]
    Store(#[from] StoreError),
}
