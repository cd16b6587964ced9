use crate::error::AssistantError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A short-lived, non-blocking message for the user (a toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn info(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            description: None,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: Some(description.into()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }

    pub fn connecting() -> Self {
        Self::info("Connecting to AI Assistant...")
    }

    pub fn connected() -> Self {
        Self::info("AI Assistance Connected")
    }

    pub fn disconnected() -> Self {
        Self::info("AI Assistance Disconnected")
    }

    pub fn upload_requested() -> Self {
        Self::info("AI requested an image upload")
    }

    pub fn uploading(filename: &str) -> Self {
        Self::info(format!("Uploading image \"{filename}\"..."))
    }

    pub fn analysis_complete() -> Self {
        Self::info("Analysis complete").with_description("Informing AI...")
    }

    /// Maps an error to the notice shown where it originated.
    pub fn from_error(err: &AssistantError) -> Self {
        match err {
            AssistantError::PermissionDenied(_) => Self::error(
                "Microphone Permission Denied",
                "Please allow audio permissions to use the voice assistant.",
            ),
            AssistantError::InvalidConfiguration(detail) => {
                Self::error("Invalid Configuration", detail.clone())
            }
            AssistantError::Unauthenticated(_) => {
                Self::error("Auth Error", "You must be logged in.")
            }
            AssistantError::ConnectionError(detail) => {
                Self::error("Voice Connection Error", detail.clone())
            }
            AssistantError::UploadError(detail) => {
                Self::error("Image upload failed", detail.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_notices_carry_detail() {
        let n = Notice::from_error(&AssistantError::UploadError("status 500".into()));
        assert!(n.is_error());
        assert_eq!(n.title, "Image upload failed");
        assert_eq!(n.description.as_deref(), Some("status 500"));
    }

    #[test]
    fn auth_notice_does_not_leak_detail() {
        let n = Notice::from_error(&AssistantError::Unauthenticated("keyring empty".into()));
        assert_eq!(n.description.as_deref(), Some("You must be logged in."));
    }
}
