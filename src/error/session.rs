// Session state machine error types and constants

use crate::error::{AnalysisError, ErrorCode, RecordingError};
use crate::session::{SessionAction, SessionState};
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 3001-3004. Wrapped recording/analysis errors report
/// the inner error's code.
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Action not valid for the current state
    pub const INVALID_STATE_TRANSITION: i32 = 3001;

    /// Session state lock was poisoned
    pub const STATE_POISONED: i32 = 3004;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=PracticeSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the practice session state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Programming error: the UI offered an action the state does not allow
    InvalidStateTransition {
        from: SessionState,
        action: SessionAction,
    },

    /// Recording controller failure
    Recording(RecordingError),

    /// Analysis client failure
    Analysis(AnalysisError),

    /// Session lock poisoned
    StatePoisoned,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::InvalidStateTransition { .. } => {
                SessionErrorCodes::INVALID_STATE_TRANSITION
            }
            SessionError::Recording(inner) => inner.code(),
            SessionError::Analysis(inner) => inner.code(),
            SessionError::StatePoisoned => SessionErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::InvalidStateTransition { from, action } => format!(
                "Invalid state transition: cannot {} while {}",
                action.as_str(),
                from.as_str()
            ),
            SessionError::Recording(inner) => inner.message(),
            SessionError::Analysis(inner) => inner.message(),
            SessionError::StatePoisoned => "Session state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Recording(inner) => Some(inner),
            SessionError::Analysis(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<RecordingError> for SessionError {
    fn from(err: RecordingError) -> Self {
        SessionError::Recording(err)
    }
}

impl From<AnalysisError> for SessionError {
    fn from(err: AnalysisError) -> Self {
        SessionError::Analysis(err)
    }
}
