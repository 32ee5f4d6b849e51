// Persistent store error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Store error code constants
///
/// Error code range: 4001-4003
pub struct StoreErrorCodes {}

impl StoreErrorCodes {
    /// Store lock was poisoned
    pub const LOCK_POISONED: i32 = 4001;

    /// Snapshot (de)serialization failed
    pub const SERIALIZATION: i32 = 4002;

    /// Snapshot file could not be read or written
    pub const IO: i32 = 4003;
}

/// Log a store error with structured context
pub fn log_store_error(err: &StoreError, context: &str) {
    error!(
        "Store error in {}: code={}, component=PracticeStore, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the persistent store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    LockPoisoned,
    Serialization { reason: String },
    Io { reason: String },
}

impl ErrorCode for StoreError {
    fn code(&self) -> i32 {
        match self {
            StoreError::LockPoisoned => StoreErrorCodes::LOCK_POISONED,
            StoreError::Serialization { .. } => StoreErrorCodes::SERIALIZATION,
            StoreError::Io { .. } => StoreErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            StoreError::LockPoisoned => "Store lock poisoned".to_string(),
            StoreError::Serialization { reason } => {
                format!("Store serialization failed: {}", reason)
            }
            StoreError::Io { reason } => format!("Store I/O failed: {}", reason),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization {
            reason: err.to_string(),
        }
    }
}
