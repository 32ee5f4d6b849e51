// Practice session states and the transition table

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Recording,
    Recorded,
    Analyzing,
    FeedbackShown,
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Recorded => "recorded",
            SessionState::Analyzing => "analyzing",
            SessionState::FeedbackShown => "feedback shown",
            SessionState::Completed => "completed",
        }
    }

    /// States in which the attempt owns captured audio
    pub fn holds_audio(&self) -> bool {
        matches!(
            self,
            SessionState::Recorded | SessionState::Analyzing | SessionState::FeedbackShown
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionAction {
    Start,
    /// Manual stop and auto-stop alike
    Stop,
    ReRecord,
    Analyze,
    AnalysisSucceeded,
    AnalysisFailed,
    Continue,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::Start => "start",
            SessionAction::Stop => "stop",
            SessionAction::ReRecord => "re-record",
            SessionAction::Analyze => "analyze",
            SessionAction::AnalysisSucceeded => "complete analysis",
            SessionAction::AnalysisFailed => "fail analysis",
            SessionAction::Continue => "continue",
        }
    }
}

/// The complete transition table.
///
/// `has_next` only matters for `Continue` from `FeedbackShown`: it selects
/// between the next sentence (`Idle`) and the end of the set (`Completed`).
pub fn transition(
    state: SessionState,
    action: SessionAction,
    has_next: bool,
) -> Result<SessionState, SessionError> {
    use SessionAction as A;
    use SessionState as S;

    match (state, action) {
        (S::Idle, A::Start) => Ok(S::Recording),
        (S::Recording, A::Stop) => Ok(S::Recorded),
        (S::Recorded, A::Analyze) => Ok(S::Analyzing),
        (S::Recorded | S::Analyzing | S::FeedbackShown, A::ReRecord) => Ok(S::Idle),
        (S::Analyzing, A::AnalysisSucceeded) => Ok(S::FeedbackShown),
        (S::Analyzing, A::AnalysisFailed) => Ok(S::Recorded),
        (S::FeedbackShown, A::Continue) => Ok(if has_next { S::Idle } else { S::Completed }),
        (from, action) => Err(SessionError::InvalidStateTransition { from, action }),
    }
}
