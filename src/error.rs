use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Camera/microphone permission denied: {0}")]
    PermissionDenied(String),
    #[error("In-browser recording is not supported on this device")]
    RecordingUnsupported,
    #[error("Recorder not started")]
    RecorderNotStarted,
    #[error("Please stop the recording before continuing")]
    RecordingInProgress,
    #[error("Consent is required to proceed")]
    ConsentRequired,
    #[error("Invalid candidate details: {0}")]
    InvalidCandidate(String),
    #[error("Speed test failed: {0}")]
    SpeedTest(String),
    #[error("{action} is not valid in step {step}")]
    InvalidAction { step: String, action: &'static str },
    #[error("Record store error: {0}")]
    RecordStore(String),
    #[error("Storage upload error: {0}")]
    BlobStore(String),
    #[error("Notification failed: {0}")]
    Notification(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
