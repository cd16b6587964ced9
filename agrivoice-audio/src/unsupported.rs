use crate::error::CaptureError;

/// Stand-in on platforms without a capture backend. Opening always fails, so
/// the assistant mounts with the microphone denied.
#[derive(Debug)]
pub struct MicrophoneCapture {
    _private: (),
}

impl MicrophoneCapture {
    pub fn open_default() -> Result<Self, CaptureError> {
        Err(CaptureError::Unsupported)
    }

    pub fn resume(&self) -> Result<(), CaptureError> {
        Err(CaptureError::Unsupported)
    }

    pub fn peak_level(&self) -> f32 {
        0.0
    }

    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_reports_unsupported() {
        assert!(matches!(
            MicrophoneCapture::open_default(),
            Err(CaptureError::Unsupported)
        ));
    }
}
