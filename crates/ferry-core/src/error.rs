use thiserror::Error;

/// Hosting REST API failures. Fatal when raised while listing
/// repositories; commit lookups degrade to "absent" instead.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("hosting api request failed: {0}")]
    Request(String),

    #[error("hosting api returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected hosting api payload: {0}")]
    Payload(String),
}

impl UpstreamError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// Local git mirror operation failures. Always scoped to the repository
/// being processed; the job continues with the next one.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mirror clone failed: {0}")]
    Clone(String),

    #[error("mirror fetch failed: {0}")]
    Fetch(String),

    #[error("mirror push failed: {0}")]
    Push(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("mirror task aborted: {0}")]
    Task(String),
}
