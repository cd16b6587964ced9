use thiserror::Error;

/// Every failure a user can see. Each variant becomes an error notice at the
/// boundary where it happens; none of them ends the assistant screen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("not signed in: {0}")]
    Unauthenticated(String),

    #[error("voice connection error: {0}")]
    ConnectionError(String),

    #[error("upload failed: {0}")]
    UploadError(String),
}

impl AssistantError {
    pub fn connection(err: impl std::fmt::Display) -> Self {
        Self::ConnectionError(err.to_string())
    }

    pub fn upload(err: impl std::fmt::Display) -> Self {
        Self::UploadError(err.to_string())
    }
}
