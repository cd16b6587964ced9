use crate::traits::{MicrophoneAccess, Notifier};
use agrivoice_core::{AssistantError, Notice};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    NotRequested,
    Granted,
    Denied(String),
}

/// Asks for microphone capture once per mount and remembers the answer.
///
/// There is no retry: a denied gate stays denied until a new gate is built.
#[derive(Clone)]
pub struct PermissionGate {
    mic: Arc<dyn MicrophoneAccess>,
    notifier: Arc<dyn Notifier>,
    outcome: Arc<Mutex<Outcome>>,
    granted: Arc<AtomicBool>,
}

impl PermissionGate {
    pub fn new(mic: Arc<dyn MicrophoneAccess>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            mic,
            notifier,
            outcome: Arc::new(Mutex::new(Outcome::NotRequested)),
            granted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn has_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    pub async fn request_microphone_access(&self) -> Result<(), AssistantError> {
        // Held across the prompt so concurrent callers share one request.
        let mut outcome = self.outcome.lock().await;
        match &*outcome {
            Outcome::Granted => return Ok(()),
            Outcome::Denied(reason) => return Err(AssistantError::PermissionDenied(reason.clone())),
            Outcome::NotRequested => {}
        }

        let res = async {
            self.mic.request_capture().await?;
            self.mic.resume_processing().await
        }
        .await;

        match res {
            Ok(()) => {
                log::info!("microphone permission granted");
                *outcome = Outcome::Granted;
                self.granted.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                log::error!("microphone permission error: {e:#}");
                let err = AssistantError::PermissionDenied(format!("{e:#}"));
                *outcome = Outcome::Denied(format!("{e:#}"));
                self.notifier.notify(Notice::from_error(&err));
                Err(err)
            }
        }
    }

    /// Gives the capture stream back. Safe to call when nothing was acquired.
    pub async fn release(&self) {
        if self.granted.swap(false, Ordering::SeqCst) {
            self.mic.release().await;
        }
    }
}
