use thiserror::Error;

/// Failures the recorder controller distinguishes
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The user (or the OS) refused microphone access
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable input device, or the stream could not be opened
    #[error("Audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The chunk POST failed or the endpoint answered with an error status
    #[error("Upload failed: {0}")]
    UploadFailure(String),

    #[error("Failed to encode chunk: {0}")]
    Encode(#[from] hound::Error),
}

impl From<reqwest::Error> for RecorderError {
    fn from(err: reqwest::Error) -> Self {
        RecorderError::UploadFailure(err.to_string())
    }
}

pub type RecorderResult<T> = std::result::Result<T, RecorderError>;
