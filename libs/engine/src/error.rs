use stride_api::{ErrorKind, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("store: {0}")]
    Store(#[source] StoreError),

    #[error("record handler: {0}")]
    Handler(String),
}

impl EngineError {
    /// True for failures of the store connection itself, as opposed to a
    /// request the store understood and rejected.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EngineError::StoreUnavailable(_))
    }
}

/// Store errors keep their category: connectivity problems become
/// `StoreUnavailable`, malformed ids `InvalidIdentifier`.
impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e.kind() {
            ErrorKind::Unavailable => EngineError::StoreUnavailable(e),
            ErrorKind::InvalidIdentifier => EngineError::InvalidIdentifier(e.message().to_string()),
            ErrorKind::Config => EngineError::Config(e.message().to_string()),
            ErrorKind::NotFound | ErrorKind::Conflict | ErrorKind::Format => EngineError::Store(e),
        }
    }
}
