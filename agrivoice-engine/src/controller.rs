use crate::permission::PermissionGate;
use crate::session::{EndReason, SessionPhase, SessionStatus, UploadRequest, UploadStatus};
use crate::traits::{Notifier, StartRequest, TokenSource, VoiceSession};
use agrivoice_core::{
    AssistantError, AssistantId, IncomingMessage, Notice, OutboundMessage, SessionEvent,
    is_upload_request, token_variables,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What happened to an analysis result once it came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Sent into the session that asked for it.
    Delivered,
    /// That session was gone by the time the result arrived.
    Discarded,
}

#[derive(Debug, Default)]
struct Inner {
    phase: SessionPhase,
    generation: u64,
    upload_visible: bool,
    upload: Option<UploadRequest>,
    next_upload_id: u64,
    last_end: Option<EndReason>,
}

impl Inner {
    fn set_phase(&mut self, next: SessionPhase) {
        if self.phase != next {
            log::info!("session phase: {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
    }

    fn enter_idle(&mut self, reason: EndReason) {
        self.set_phase(SessionPhase::Idle);
        self.upload_visible = false;
        self.last_end = Some(reason);
    }

    fn is_live(&self, generation: u64) -> bool {
        self.phase == SessionPhase::Active && self.generation == generation
    }
}

/// Owns the session state machine around an external voice session.
///
/// All state sits behind one async mutex; event handlers take it for their
/// whole run so they never interleave.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Mutex<Inner>>,
    voice: Arc<dyn VoiceSession>,
    auth: Arc<dyn TokenSource>,
    permission: PermissionGate,
    notifier: Arc<dyn Notifier>,
    public_key: Option<String>,
}

impl SessionController {
    pub fn new(
        voice: Arc<dyn VoiceSession>,
        auth: Arc<dyn TokenSource>,
        permission: PermissionGate,
        notifier: Arc<dyn Notifier>,
        public_key: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            voice,
            auth,
            permission,
            notifier,
            public_key,
        }
    }

    pub fn voice(&self) -> &Arc<dyn VoiceSession> {
        &self.voice
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.lock().await;
        SessionStatus {
            phase: inner.phase,
            generation: inner.generation,
            upload_visible: inner.upload_visible,
            upload: inner.upload.clone(),
            last_end: inner.last_end.clone(),
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    pub async fn upload_visible(&self) -> bool {
        self.inner.lock().await.upload_visible
    }

    fn validated_start(&self, assistant_id: &str) -> Result<StartRequest, AssistantError> {
        let public_key = self
            .public_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AssistantError::InvalidConfiguration("missing public key".into()))?;
        let assistant_id = AssistantId::parse(assistant_id)?;

        let token = match self.auth.bearer_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                return Err(AssistantError::Unauthenticated(
                    "no bearer token available".into(),
                ));
            }
            Err(e) => return Err(AssistantError::Unauthenticated(format!("{e:#}"))),
        };

        Ok(StartRequest {
            public_key: public_key.to_string(),
            assistant_id,
            variables: token_variables(&token),
        })
    }

    /// Begins connecting. Returns once the voice service acknowledged the
    /// connect; the phase becomes Active only on the "call-start" event.
    pub async fn start(&self, assistant_id: &str) -> Result<(), AssistantError> {
        if !self.permission.has_permission() {
            log::warn!("start refused: microphone permission not granted");
            return Err(AssistantError::PermissionDenied(
                "microphone permission not granted".into(),
            ));
        }

        let (request, generation) = {
            let mut inner = self.inner.lock().await;
            if inner.phase != SessionPhase::Idle {
                log::warn!("start ignored: session already {:?}", inner.phase);
                return Ok(());
            }

            let request = match self.validated_start(assistant_id) {
                Ok(r) => r,
                Err(e) => {
                    log::error!("start refused: {e}");
                    self.notifier.notify(Notice::from_error(&e));
                    return Err(e);
                }
            };

            inner.generation += 1;
            inner.set_phase(SessionPhase::Connecting);
            self.notifier.notify(Notice::connecting());
            (request, inner.generation)
        };

        log::info!("starting voice call: {request:?}");

        // Not under the lock: a stop() or an early event may arrive while connecting.
        let res = self.voice.start(&request).await;

        let Err(e) = res else {
            return Ok(());
        };

        let err = AssistantError::connection(format!("{e:#}"));
        log::error!("failed to start call: {e:#}");

        let mut inner = self.inner.lock().await;
        if inner.generation == generation && inner.phase != SessionPhase::Idle {
            inner.enter_idle(EndReason::Error(err.to_string()));
        }
        self.notifier
            .notify(Notice::error("Failed to start call", format!("{e:#}")));
        Err(err)
    }

    /// Ends the session locally. The voice service's own "call-end" that
    /// follows is ignored.
    pub async fn stop(&self) -> Result<(), AssistantError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.phase == SessionPhase::Idle {
                log::warn!("stop ignored: no session");
                return Ok(());
            }
            inner.enter_idle(EndReason::Local);
            self.notifier.notify(Notice::disconnected());
        }

        if let Err(e) = self.voice.stop().await {
            log::error!("voice call teardown failed: {e:#}");
            let err = AssistantError::connection(format!("{e:#}"));
            self.notifier.notify(Notice::from_error(&err));
            return Err(err);
        }
        Ok(())
    }

    pub async fn handle_event(&self, event: &SessionEvent) {
        let mut inner = self.inner.lock().await;
        match event {
            SessionEvent::CallStart => {
                if inner.phase != SessionPhase::Connecting {
                    log::warn!("call-start ignored in phase {:?}", inner.phase);
                    return;
                }
                inner.set_phase(SessionPhase::Active);
                self.notifier.notify(Notice::connected());
            }
            SessionEvent::CallEnd => {
                if inner.phase == SessionPhase::Idle {
                    log::debug!("call-end ignored: already idle");
                    return;
                }
                inner.enter_idle(EndReason::Remote);
                self.notifier.notify(Notice::disconnected());
            }
            SessionEvent::Error(message) => {
                log::error!("voice session error: {message}");
                if inner.phase != SessionPhase::Idle {
                    inner.enter_idle(EndReason::Error(message.clone()));
                }
                self.notifier.notify(Notice::from_error(&AssistantError::ConnectionError(
                    message.clone(),
                )));
            }
            SessionEvent::Message(_) => {}
        }
    }

    /// Raises the upload prompt for a matching assistant message. Returns
    /// true only on the transition from hidden to visible.
    pub(crate) async fn raise_upload_prompt(&self, message: &IncomingMessage) -> bool {
        if !is_upload_request(message) {
            return false;
        }
        let mut inner = self.inner.lock().await;
        if inner.phase != SessionPhase::Active {
            log::debug!("upload request ignored in phase {:?}", inner.phase);
            return false;
        }
        if inner.upload_visible {
            return false;
        }
        inner.upload_visible = true;
        log::info!("assistant requested an image upload");
        self.notifier.notify(Notice::upload_requested());
        true
    }

    /// Registers an upload against the current session. It stays Pending
    /// until the request is actually sent.
    pub(crate) async fn begin_upload(
        &self,
        file_name: &str,
    ) -> Result<UploadRequest, AssistantError> {
        let mut inner = self.inner.lock().await;
        if inner.phase != SessionPhase::Active {
            return Err(AssistantError::UploadError("no active session".into()));
        }
        inner.next_upload_id += 1;
        let req = UploadRequest {
            id: inner.next_upload_id,
            file_name: file_name.to_string(),
            status: UploadStatus::Pending,
            generation: inner.generation,
        };
        inner.upload = Some(req.clone());
        Ok(req)
    }

    pub(crate) async fn set_upload_status(&self, id: u64, status: UploadStatus) {
        let mut inner = self.inner.lock().await;
        Self::mark_upload(&mut inner, id, status);
    }

    fn mark_upload(inner: &mut Inner, id: u64, status: UploadStatus) {
        // A newer upload may have replaced this one.
        if let Some(up) = inner.upload.as_mut().filter(|u| u.id == id) {
            up.status = status;
        }
    }

    /// Liveness check and send as one step under the session lock.
    pub(crate) async fn deliver_upload(
        &self,
        upload: &UploadRequest,
        message: OutboundMessage,
    ) -> Result<UploadOutcome, AssistantError> {
        let mut inner = self.inner.lock().await;
        if !inner.is_live(upload.generation) {
            log::warn!(
                "analysis result for upload {} discarded: session {} no longer active",
                upload.id,
                upload.generation
            );
            // A newer session owns the prompt now; only the issuing one may clear it.
            if inner.generation == upload.generation {
                inner.upload_visible = false;
            }
            Self::mark_upload(&mut inner, upload.id, UploadStatus::Succeeded);
            return Ok(UploadOutcome::Discarded);
        }

        if let Err(e) = self.voice.send(&message).await {
            log::error!("failed to send analysis result: {e:#}");
            Self::mark_upload(&mut inner, upload.id, UploadStatus::Failed);
            let err = AssistantError::connection(format!("{e:#}"));
            self.notifier.notify(Notice::from_error(&err));
            return Err(err);
        }

        inner.upload_visible = false;
        Self::mark_upload(&mut inner, upload.id, UploadStatus::Succeeded);
        Ok(UploadOutcome::Delivered)
    }
}
