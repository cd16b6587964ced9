//! In-memory stand-ins for the capability traits, shared by unit and
//! integration tests and by the CLI's offline demo.

use crate::traits::{MicrophoneAccess, Notifier, StartRequest, TokenSource, VoiceSession};
use agrivoice_core::{BearerToken, Notice, OutboundMessage, SessionEvent};
use anyhow::anyhow;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Records every call and lets the test push events by hand.
pub struct FakeVoiceSession {
    events: broadcast::Sender<SessionEvent>,
    starts: Mutex<Vec<StartRequest>>,
    sent: Mutex<Vec<OutboundMessage>>,
    stops: AtomicUsize,
    start_error: Mutex<Option<String>>,
    fail_send: AtomicBool,
}

impl Default for FakeVoiceSession {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            starts: Mutex::new(vec![]),
            sent: Mutex::new(vec![]),
            stops: AtomicUsize::new(0),
            start_error: Mutex::new(None),
            fail_send: AtomicBool::new(false),
        }
    }
}

impl FakeVoiceSession {
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub fn fail_next_start(&self, reason: impl Into<String>) {
        *self.start_error.lock().unwrap() = Some(reason.into());
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn starts(&self) -> Vec<StartRequest> {
        self.starts.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VoiceSession for FakeVoiceSession {
    async fn start(&self, request: &StartRequest) -> anyhow::Result<()> {
        self.starts.lock().unwrap().push(request.clone());
        match self.start_error.lock().unwrap().take() {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(anyhow!("voice call closed"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[derive(Debug, Default)]
pub struct FakeMicrophone {
    deny: Option<String>,
    pub requests: AtomicUsize,
    pub released: AtomicBool,
}

impl FakeMicrophone {
    pub fn granting() -> Self {
        Self::default()
    }

    pub fn denying(reason: impl Into<String>) -> Self {
        Self {
            deny: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl MicrophoneAccess for FakeMicrophone {
    async fn request_capture(&self) -> anyhow::Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match &self.deny {
            Some(reason) => Err(anyhow!(reason.clone())),
            None => Ok(()),
        }
    }

    async fn resume_processing(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct StaticToken(pub Option<BearerToken>);

impl StaticToken {
    pub fn new(token: &str) -> Self {
        Self(Some(BearerToken::new(token)))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn bearer_token(&self) -> anyhow::Result<Option<BearerToken>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Default)]
pub struct MemoryNotifier {
    pub notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }

    pub fn count(&self, title: &str) -> usize {
        self.titles().iter().filter(|t| t.as_str() == title).count()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
