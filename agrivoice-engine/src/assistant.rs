use crate::controller::{SessionController, UploadOutcome};
use crate::interjector::UploadInterjector;
use crate::permission::PermissionGate;
use crate::session::SessionStatus;
use crate::traits::{MicrophoneAccess, Notifier, TokenSource, VoiceSession};
use agrivoice_core::{AppConfig, AssistantError, SessionEvent};
use agrivoice_providers::disease_detection::ImageFile;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// One mounted assistant screen: a permission gate, a session controller and
/// an upload interjector fed by a single event pump.
pub struct VoiceAssistant {
    permission: PermissionGate,
    controller: SessionController,
    interjector: UploadInterjector,
    assistant_id: Option<String>,
    pump: Option<JoinHandle<()>>,
}

impl VoiceAssistant {
    /// Subscribes to `voice` and asks for the microphone. A denied microphone
    /// does not fail the mount; it only keeps `start` disabled.
    pub async fn mount(
        cfg: &AppConfig,
        voice: Arc<dyn VoiceSession>,
        mic: Arc<dyn MicrophoneAccess>,
        auth: Arc<dyn TokenSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let events = voice.subscribe();

        let permission = PermissionGate::new(mic, notifier.clone());
        let controller = SessionController::new(
            voice,
            auth.clone(),
            permission.clone(),
            notifier.clone(),
            cfg.voice.public_key.clone(),
        );
        let interjector =
            UploadInterjector::new(controller.clone(), auth, notifier, cfg.api_base_url.clone());

        let pump = tokio::spawn(pump_events(
            events,
            controller.clone(),
            interjector.clone(),
        ));

        if let Err(e) = permission.request_microphone_access().await {
            log::warn!("assistant mounted without microphone: {e}");
        }

        Self {
            permission,
            controller,
            interjector,
            assistant_id: cfg.voice.assistant_id.clone(),
            pump: Some(pump),
        }
    }

    pub fn has_permission(&self) -> bool {
        self.permission.has_permission()
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn interjector(&self) -> &UploadInterjector {
        &self.interjector
    }

    /// Starts a call with the configured assistant.
    pub async fn start_call(&self) -> Result<(), AssistantError> {
        self.controller
            .start(self.assistant_id.as_deref().unwrap_or_default())
            .await
    }

    pub async fn stop_call(&self) -> Result<(), AssistantError> {
        self.controller.stop().await
    }

    pub async fn submit_image(&self, image: ImageFile) -> Result<UploadOutcome, AssistantError> {
        self.interjector.submit_image(image).await
    }

    pub async fn status(&self) -> SessionStatus {
        self.controller.status().await
    }

    /// Stops listening, ends any call and gives the microphone back.
    pub async fn unmount(mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Err(e) = self.controller.stop().await {
            log::debug!("stop on unmount: {e}");
        }
        self.permission.release().await;
        log::info!("assistant unmounted");
    }
}

impl Drop for VoiceAssistant {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Delivers events one at a time, in arrival order.
async fn pump_events(
    mut events: broadcast::Receiver<SessionEvent>,
    controller: SessionController,
    interjector: UploadInterjector,
) {
    loop {
        match events.recv().await {
            Ok(event) => dispatch(&controller, &interjector, &event).await,
            Err(RecvError::Lagged(n)) => log::warn!("dropped {n} voice events"),
            Err(RecvError::Closed) => {
                log::info!("voice event stream closed");
                break;
            }
        }
    }
}

async fn dispatch(
    controller: &SessionController,
    interjector: &UploadInterjector,
    event: &SessionEvent,
) {
    controller.handle_event(event).await;
    if let SessionEvent::Message(message) = event {
        interjector.observe(message).await;
    }
}
