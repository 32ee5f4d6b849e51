// Analysis error types and constants

use crate::auth::SubscriptionTier;
use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Analysis error code constants
///
/// Error code range: 2001-2007
pub struct AnalysisErrorCodes {}

impl AnalysisErrorCodes {
    /// Request rejected before submission (missing audio, blank sentence)
    pub const INVALID_INPUT: i32 = 2001;

    /// Requested feature needs a higher subscription tier
    pub const UPGRADE_REQUIRED: i32 = 2002;

    /// Endpoint unreachable or returned a non-success status
    pub const SERVICE_UNAVAILABLE: i32 = 2003;

    /// Endpoint returned a malformed payload
    pub const INVALID_RESPONSE: i32 = 2004;

    /// No signed-in user
    pub const NOT_AUTHENTICATED: i32 = 2005;

    /// Analysis was cancelled before its result could be applied
    pub const CANCELLED: i32 = 2006;

    /// Analysis state lock was poisoned
    pub const LOCK_POISONED: i32 = 2007;
}

/// Log an analysis error with structured context
pub fn log_analysis_error(err: &AnalysisError, context: &str) {
    error!(
        "Analysis error in {}: code={}, component=AnalysisClient, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Analysis-related errors
///
/// None of these are retried automatically. Re-triggering analysis is a
/// user action.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// A required request field is missing or blank
    InvalidInput { field: &'static str },

    /// Feature gated behind a paid tier
    UpgradeRequired { tier: SubscriptionTier },

    /// Transport failure or non-2xx status (status is None when unreachable)
    ServiceUnavailable { status: Option<u16>, reason: String },

    /// Response body could not be normalized into an AnalysisResult
    InvalidResponse { reason: String },

    /// No signed-in user
    NotAuthenticated,

    /// Superseded by re-record or session teardown
    Cancelled,

    /// Lock poisoned
    LockPoisoned,
}

impl AnalysisError {
    /// Whether the UI should offer a retry affordance
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::ServiceUnavailable { .. } | AnalysisError::InvalidResponse { .. }
        )
    }
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::InvalidInput { .. } => AnalysisErrorCodes::INVALID_INPUT,
            AnalysisError::UpgradeRequired { .. } => AnalysisErrorCodes::UPGRADE_REQUIRED,
            AnalysisError::ServiceUnavailable { .. } => AnalysisErrorCodes::SERVICE_UNAVAILABLE,
            AnalysisError::InvalidResponse { .. } => AnalysisErrorCodes::INVALID_RESPONSE,
            AnalysisError::NotAuthenticated => AnalysisErrorCodes::NOT_AUTHENTICATED,
            AnalysisError::Cancelled => AnalysisErrorCodes::CANCELLED,
            AnalysisError::LockPoisoned => AnalysisErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::InvalidInput { field } => {
                format!("Missing required field: {}", field)
            }
            AnalysisError::UpgradeRequired { tier } => format!(
                "Advanced speech analysis requires a premium subscription (current tier: {})",
                tier.as_str()
            ),
            AnalysisError::ServiceUnavailable { status, reason } => match status {
                Some(code) => format!("Speech analysis service failed (HTTP {}): {}", code, reason),
                None => format!("Speech analysis service unreachable: {}", reason),
            },
            AnalysisError::InvalidResponse { reason } => {
                format!("Speech analysis returned an invalid response: {}", reason)
            }
            AnalysisError::NotAuthenticated => "User not authenticated".to_string(),
            AnalysisError::Cancelled => "Speech analysis cancelled".to_string(),
            AnalysisError::LockPoisoned => "Analysis state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnalysisError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AnalysisError {}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::ServiceUnavailable {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::InvalidResponse {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_codes() {
        assert_eq!(AnalysisError::InvalidInput { field: "audio" }.code(), 2001);
        assert_eq!(
            AnalysisError::UpgradeRequired {
                tier: SubscriptionTier::Free
            }
            .code(),
            2002
        );
        assert_eq!(
            AnalysisError::ServiceUnavailable {
                status: Some(500),
                reason: "test".to_string()
            }
            .code(),
            2003
        );
        assert_eq!(
            AnalysisError::InvalidResponse {
                reason: "test".to_string()
            }
            .code(),
            2004
        );
        assert_eq!(AnalysisError::NotAuthenticated.code(), 2005);
        assert_eq!(AnalysisError::Cancelled.code(), 2006);
        assert_eq!(AnalysisError::LockPoisoned.code(), 2007);
    }

    #[test]
    fn test_analysis_error_messages() {
        let err = AnalysisError::ServiceUnavailable {
            status: Some(503),
            reason: "bad gateway".to_string(),
        };
        assert!(err.message().contains("HTTP 503"));

        let err = AnalysisError::ServiceUnavailable {
            status: None,
            reason: "connection refused".to_string(),
        };
        assert!(err.message().contains("unreachable"));

        let err = AnalysisError::UpgradeRequired {
            tier: SubscriptionTier::Free,
        };
        assert!(err.message().contains("premium subscription"));
        assert!(err.message().contains("free"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(AnalysisError::ServiceUnavailable {
            status: None,
            reason: String::new()
        }
        .is_retryable());
        assert!(AnalysisError::InvalidResponse {
            reason: String::new()
        }
        .is_retryable());
        assert!(!AnalysisError::UpgradeRequired {
            tier: SubscriptionTier::Free
        }
        .is_retryable());
        assert!(!AnalysisError::Cancelled.is_retryable());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AnalysisError = json_err.into();
        assert!(matches!(err, AnalysisError::InvalidResponse { .. }));
    }
}
