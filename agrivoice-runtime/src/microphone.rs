use agrivoice_audio::MicrophoneCapture;
use agrivoice_engine::traits::MicrophoneAccess;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// [`MicrophoneAccess`] over the default OS input device.
#[derive(Default)]
pub struct SystemMicrophone {
    capture: Arc<Mutex<Option<MicrophoneCapture>>>,
}

impl SystemMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak_level(&self) -> Option<f32> {
        let guard = self.capture.lock().ok()?;
        guard.as_ref().map(MicrophoneCapture::peak_level)
    }
}

#[async_trait]
impl MicrophoneAccess for SystemMicrophone {
    async fn request_capture(&self) -> anyhow::Result<()> {
        // Opening blocks on the device handshake.
        let capture = tokio::task::spawn_blocking(MicrophoneCapture::open_default)
            .await
            .context("join microphone open")?
            .context("open microphone")?;

        let mut slot = self
            .capture
            .lock()
            .map_err(|_| anyhow!("microphone state poisoned"))?;
        if let Some(old) = slot.replace(capture) {
            old.close();
        }
        Ok(())
    }

    async fn resume_processing(&self) -> anyhow::Result<()> {
        let slot = self
            .capture
            .lock()
            .map_err(|_| anyhow!("microphone state poisoned"))?;
        let capture = slot.as_ref().ok_or_else(|| anyhow!("microphone not open"))?;
        capture.resume().context("resume microphone")
    }

    async fn release(&self) {
        let taken = match self.capture.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(capture) = taken {
            let _ = tokio::task::spawn_blocking(move || capture.close()).await;
            log::info!("microphone released");
        }
    }
}

#[cfg(all(test, not(any(windows, target_os = "macos"))))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_platform_denies_capture() {
        let mic = SystemMicrophone::new();
        let err = mic.request_capture().await.unwrap_err();
        assert!(format!("{err:#}").contains("not supported"));
        assert!(mic.resume_processing().await.is_err());
        assert_eq!(mic.peak_level(), None);
        mic.release().await;
    }
}
