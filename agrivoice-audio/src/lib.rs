mod error;

#[cfg(any(windows, target_os = "macos"))]
mod capture;

#[cfg(not(any(windows, target_os = "macos")))]
mod unsupported;

pub use error::CaptureError;

#[cfg(any(windows, target_os = "macos"))]
pub use capture::MicrophoneCapture;

#[cfg(not(any(windows, target_os = "macos")))]
pub use unsupported::MicrophoneCapture;
