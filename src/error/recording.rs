// Recording error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Recording error code constants
///
/// Error code range: 1001-1006
pub struct RecordingErrorCodes {}

impl RecordingErrorCodes {
    /// start() called while a recording is already running
    pub const ALREADY_RECORDING: i32 = 1001;

    /// Audio input device could not be opened
    pub const DEVICE_UNAVAILABLE: i32 = 1002;

    /// No Tokio runtime available to drive the recording timers
    pub const RUNTIME_UNAVAILABLE: i32 = 1003;

    /// Captured samples could not be encoded
    pub const ENCODE_FAILED: i32 = 1004;

    /// Recorder state lock was poisoned
    pub const LOCK_POISONED: i32 = 1005;

    /// Operation requires an active recording
    pub const NOT_RECORDING: i32 = 1006;
}

/// Log a recording error with structured context
pub fn log_recording_error(err: &RecordingError, context: &str) {
    error!(
        "Recording error in {}: code={}, component=RecordingController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Recording-related errors
///
/// These errors cover the microphone capture lifecycle: device access,
/// timer scheduling and payload finalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingError {
    /// A recording is already in progress
    AlreadyRecording,

    /// Audio input device unavailable (missing, busy, permission denied)
    DeviceUnavailable { reason: String },

    /// Recording timers need a Tokio runtime
    RuntimeUnavailable,

    /// WAV encoding failed
    EncodeFailed { reason: String },

    /// Recorder lock was poisoned
    LockPoisoned,

    /// No recording is running
    NotRecording,
}

impl ErrorCode for RecordingError {
    fn code(&self) -> i32 {
        match self {
            RecordingError::AlreadyRecording => RecordingErrorCodes::ALREADY_RECORDING,
            RecordingError::DeviceUnavailable { .. } => RecordingErrorCodes::DEVICE_UNAVAILABLE,
            RecordingError::RuntimeUnavailable => RecordingErrorCodes::RUNTIME_UNAVAILABLE,
            RecordingError::EncodeFailed { .. } => RecordingErrorCodes::ENCODE_FAILED,
            RecordingError::LockPoisoned => RecordingErrorCodes::LOCK_POISONED,
            RecordingError::NotRecording => RecordingErrorCodes::NOT_RECORDING,
        }
    }

    fn message(&self) -> String {
        match self {
            RecordingError::AlreadyRecording => {
                "Recording already in progress. Call stop() first.".to_string()
            }
            RecordingError::DeviceUnavailable { reason } => {
                format!("Could not access microphone: {}", reason)
            }
            RecordingError::RuntimeUnavailable => {
                "Recording requires a running Tokio runtime".to_string()
            }
            RecordingError::EncodeFailed { reason } => {
                format!("Failed to encode recording: {}", reason)
            }
            RecordingError::LockPoisoned => "Recorder state lock poisoned".to_string(),
            RecordingError::NotRecording => "No recording in progress".to_string(),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecordingError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RecordingError {}

impl From<hound::Error> for RecordingError {
    fn from(err: hound::Error) -> Self {
        RecordingError::EncodeFailed {
            reason: err.to_string(),
        }
    }
}
