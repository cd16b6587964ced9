//
// CPAL-backed microphone capture.
//
// Supported platforms:
// - Windows
// - macOS
//
// Audio itself is carried by the voice service; this stream exists to hold the
// OS capture grant for the lifetime of the assistant screen and to report a
// level meter.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream};

use crate::error::CaptureError;

enum Cmd {
    Resume,
    Shutdown,
}

enum WorkerMsg {
    Ready,
    Error(String),
}

pub struct MicrophoneCapture {
    cmd_tx: mpsc::Sender<Cmd>,
    worker_handle: Option<std::thread::JoinHandle<()>>,
    peak: Arc<AtomicU32>,
}

impl MicrophoneCapture {
    /// Opens the default input device. Blocks up to two seconds while the OS
    /// prompts for consent or the device spins up.
    pub fn open_default() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::NoInputDevice)?;
        if let Ok(name) = device.name() {
            log::info!("Using input device: {name}");
        }

        let default_cfg = device.default_input_config()?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<Cmd>();
        let (worker_tx, worker_rx) = mpsc::channel::<WorkerMsg>();
        let peak = Arc::new(AtomicU32::new(0));
        let peak_worker = peak.clone();

        let worker_handle = std::thread::spawn(move || {
            let processing = Arc::new(AtomicBool::new(false));
            let sample_format = default_cfg.sample_format();
            let channels = default_cfg.channels() as usize;
            let config: cpal::StreamConfig = default_cfg.into();

            let stream = match sample_format {
                SampleFormat::I16 => build_input_stream::<i16>(
                    &device,
                    &config,
                    channels,
                    processing.clone(),
                    peak_worker,
                ),
                SampleFormat::U16 => build_input_stream::<u16>(
                    &device,
                    &config,
                    channels,
                    processing.clone(),
                    peak_worker,
                ),
                SampleFormat::I32 => build_input_stream::<i32>(
                    &device,
                    &config,
                    channels,
                    processing.clone(),
                    peak_worker,
                ),
                _ => build_input_stream::<f32>(
                    &device,
                    &config,
                    channels,
                    processing.clone(),
                    peak_worker,
                ),
            };

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = worker_tx.send(WorkerMsg::Error(format!("build stream: {e}")));
                    log::error!("Audio stream build failed: {e}");
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = worker_tx.send(WorkerMsg::Error(format!("play stream: {e}")));
                log::error!("Audio stream play failed: {e}");
                return;
            }

            let _ = worker_tx.send(WorkerMsg::Ready);

            // The stream must stay on this thread; park here until told to stop.
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Cmd::Resume => processing.store(true, Ordering::SeqCst),
                    Cmd::Shutdown => break,
                }
            }
            drop(stream);
        });

        match worker_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(WorkerMsg::Ready) => {}
            Ok(WorkerMsg::Error(e)) => return Err(CaptureError::Worker(e)),
            Err(mpsc::RecvTimeoutError::Timeout) => return Err(CaptureError::WorkerTimeout),
            Err(_) => return Err(CaptureError::Channel),
        }

        Ok(Self {
            cmd_tx,
            worker_handle: Some(worker_handle),
            peak,
        })
    }

    /// Starts metering the captured audio.
    pub fn resume(&self) -> Result<(), CaptureError> {
        self.cmd_tx
            .send(Cmd::Resume)
            .map_err(|_| CaptureError::Channel)
    }

    /// Peak amplitude of the most recent buffer, 0.0 to 1.0.
    pub fn peak_level(&self) -> f32 {
        f32::from_bits(self.peak.load(Ordering::Relaxed))
    }

    pub fn close(mut self) {
        let _ = self.cmd_tx.send(Cmd::Shutdown);
        if let Some(h) = self.worker_handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Cmd::Shutdown);
    }
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    processing: Arc<AtomicBool>,
    peak: Arc<AtomicU32>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: Sample + SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let cb = move |data: &[T], _: &cpal::InputCallbackInfo| {
        if !processing.load(Ordering::Relaxed) {
            return;
        }
        let mut max = 0.0f32;
        for frame in data.chunks(channels.max(1)) {
            let mono =
                frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32;
            max = max.max(mono.abs());
        }
        peak.store(max.min(1.0).to_bits(), Ordering::Relaxed);
    };

    device.build_input_stream(
        config,
        cb,
        |err| {
            log::error!("Audio stream error: {err}");
        },
        None,
    )
}
