// Error types for the accent mastery practice core
//
// Each component owns one error enum with stable numeric codes so callers
// (UI shells, telemetry) can branch on a code instead of matching strings.

mod analysis;
mod recording;
mod session;
mod store;

pub use analysis::{log_analysis_error, AnalysisError, AnalysisErrorCodes};
pub use recording::{log_recording_error, RecordingError, RecordingErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};
pub use store::{log_store_error, StoreError, StoreErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the crate boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
