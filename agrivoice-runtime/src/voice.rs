use agrivoice_core::{OutboundMessage, SessionEvent};
use agrivoice_engine::traits::{StartRequest, VoiceSession};
use agrivoice_providers::voice_realtime::{
    RealtimeVoiceConfig, RealtimeVoiceHandle, connect_voice_call,
};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, broadcast};

const EVENT_CAPACITY: usize = 64;

/// [`VoiceSession`] over the realtime websocket. One instance outlives many
/// calls; subscribers keep their receiver across calls.
pub struct RealtimeVoiceSession {
    ws_url: String,
    events: broadcast::Sender<SessionEvent>,
    call: Mutex<Option<RealtimeVoiceHandle>>,
    // Bumped by every stop(), under the `call` lock.
    stops: AtomicU64,
}

impl RealtimeVoiceSession {
    pub fn new(ws_url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            ws_url: ws_url.into(),
            events,
            call: Mutex::new(None),
            stops: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl VoiceSession for RealtimeVoiceSession {
    async fn start(&self, request: &StartRequest) -> anyhow::Result<()> {
        let cfg = RealtimeVoiceConfig::new(&self.ws_url, request.public_key.clone())?;
        let stops_at_start = self.stops.load(Ordering::SeqCst);
        let handle = connect_voice_call(
            &cfg,
            &request.assistant_id,
            &request.variables,
            self.events.clone(),
        )
        .await?;

        let mut call = self.call.lock().await;
        if self.stops.load(Ordering::SeqCst) != stops_at_start {
            log::info!("voice call stopped while connecting; ending it");
            drop(call);
            return handle.stop().await;
        }
        if let Some(old) = call.replace(handle) {
            if !old.is_closed() {
                log::warn!("replacing a voice call that was still open");
                let _ = old.stop().await;
            }
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let handle = {
            let mut call = self.call.lock().await;
            self.stops.fetch_add(1, Ordering::SeqCst);
            call.take()
        };
        let Some(handle) = handle else {
            return Ok(());
        };
        if handle.is_closed() {
            return Ok(());
        }
        handle.stop().await
    }

    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        let call = self.call.lock().await;
        let handle = call.as_ref().ok_or_else(|| anyhow!("no voice call"))?;
        handle.send(message.clone()).await
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
