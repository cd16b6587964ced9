use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Connecting,
    Active,
}

/// Why the last session returned to Idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Local,
    Remote,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    pub id: u64,
    pub file_name: String,
    pub status: UploadStatus,
    // Session generation that issued the upload.
    pub generation: u64,
}

/// Snapshot for a UI: enough to render the call button and upload prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub generation: u64,
    pub upload_visible: bool,
    pub upload: Option<UploadRequest>,
    pub last_end: Option<EndReason>,
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }
}
