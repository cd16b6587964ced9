use agrivoice_core::{AssistantId, BearerToken, Notice, OutboundMessage, SessionEvent, VariableValues};
use async_trait::async_trait;
use tokio::sync::broadcast;

#[derive(Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub public_key: String,
    pub assistant_id: AssistantId,
    pub variables: VariableValues,
}

impl std::fmt::Debug for StartRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Variable values carry the user's bearer token.
        let names: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        f.debug_struct("StartRequest")
            .field("assistant_id", &self.assistant_id)
            .field("variables", &names)
            .finish()
    }
}

/// Narrow view of the external voice SDK.
///
/// `start` returning `Ok` only means the connect was acknowledged; the call is
/// live once `SessionEvent::CallStart` is delivered to subscribers.
#[async_trait]
pub trait VoiceSession: Send + Sync {
    async fn start(&self, request: &StartRequest) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()>;

    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}

#[async_trait]
pub trait MicrophoneAccess: Send + Sync {
    /// Opens the capture device, prompting the OS for consent if needed.
    async fn request_capture(&self) -> anyhow::Result<()>;

    /// Resumes the audio processing graph fed by the capture stream.
    async fn resume_processing(&self) -> anyhow::Result<()>;

    async fn release(&self);
}

pub trait TokenSource: Send + Sync {
    fn bearer_token(&self) -> anyhow::Result<Option<BearerToken>>;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
