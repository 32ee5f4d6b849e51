// Session notifications and the completion sink

use super::state::SessionState;
use crate::error::StoreError;
use crate::progress::SessionCompletion;

/// Published by `PracticeSession` for UI subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged { from: SessionState, to: SessionState },
    /// 0..=100, monotonic within one analysis call
    AnalysisProgress(u8),
    FeedbackReady { overall_accuracy: f32 },
    AnalysisFailed { code: i32, message: String },
    SentenceChanged { index: usize },
}

/// Receives every successful analysis, in completion order
pub trait SessionResultSink: Send + Sync {
    fn session_completed(&self, completion: &SessionCompletion) -> Result<(), StoreError>;
}

/// Sink that drops completions
#[derive(Default)]
pub struct NullSink {
    _unit: (),
}

impl SessionResultSink for NullSink {
    fn session_completed(&self, _completion: &SessionCompletion) -> Result<(), StoreError> {
        Ok(())
    }
}
