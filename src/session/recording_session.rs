// RecordingSession - one attempt at one sentence
//
// Every mutation goes through the transition table, so the audio/result
// slots always agree with the state: audio exists exactly in Recorded,
// Analyzing and FeedbackShown, and a result exactly in FeedbackShown.

use chrono::{DateTime, Utc};

use super::state::{transition, SessionAction, SessionState};
use crate::analysis::AnalysisResult;
use crate::error::SessionError;
use crate::recording::CapturedAudio;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    state: SessionState,
    elapsed_secs: u32,
    level_samples: Vec<u8>,
    audio: Option<CapturedAudio>,
    result: Option<AnalysisResult>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            elapsed_secs: 0,
            level_samples: Vec::new(),
            audio: None,
            result: None,
            started_at: None,
            stopped_at: None,
        }
    }
}

impl RecordingSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn level_samples(&self) -> &[u8] {
        &self.level_samples
    }

    pub fn audio(&self) -> Option<&CapturedAudio> {
        self.audio.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    fn apply(&mut self, action: SessionAction, has_next: bool) -> Result<SessionState, SessionError> {
        let next = transition(self.state, action, has_next)?;
        self.state = next;
        Ok(next)
    }

    pub(crate) fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        self.apply(SessionAction::Start, true)?;
        *self = Self {
            state: SessionState::Recording,
            started_at: Some(now),
            ..Self::default()
        };
        Ok(())
    }

    pub(crate) fn stop(&mut self, audio: CapturedAudio) -> Result<(), SessionError> {
        self.apply(SessionAction::Stop, true)?;
        self.elapsed_secs = audio.duration_secs;
        self.level_samples = audio.level_samples.clone();
        self.started_at = Some(audio.started_at);
        self.stopped_at = Some(audio.stopped_at);
        self.audio = Some(audio);
        Ok(())
    }

    pub(crate) fn begin_analysis(&mut self) -> Result<(), SessionError> {
        self.apply(SessionAction::Analyze, true).map(|_| ())
    }

    pub(crate) fn analysis_succeeded(&mut self, result: AnalysisResult) -> Result<(), SessionError> {
        self.apply(SessionAction::AnalysisSucceeded, true)?;
        self.result = Some(result);
        Ok(())
    }

    pub(crate) fn analysis_failed(&mut self) -> Result<(), SessionError> {
        self.apply(SessionAction::AnalysisFailed, true).map(|_| ())
    }

    /// Discard audio and result and return to Idle
    pub(crate) fn re_record(&mut self) -> Result<(), SessionError> {
        self.apply(SessionAction::ReRecord, true)?;
        *self = Self::default();
        Ok(())
    }

    pub(crate) fn advance(&mut self, has_next: bool) -> Result<SessionState, SessionError> {
        let next = self.apply(SessionAction::Continue, has_next)?;
        let completed = next == SessionState::Completed;
        *self = Self::default();
        if completed {
            self.state = SessionState::Completed;
        }
        Ok(next)
    }

    /// Unconditional teardown to Idle, keeping Completed terminal
    pub(crate) fn reset(&mut self) {
        let completed = self.state == SessionState::Completed;
        *self = Self::default();
        if completed {
            self.state = SessionState::Completed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AudioQuality;

    fn audio() -> CapturedAudio {
        CapturedAudio {
            wav: vec![0; 64],
            duration_secs: 4,
            sample_rate: 16_000,
            sample_count: 10,
            level_samples: vec![1, 2, 3],
            started_at: Utc::now(),
            stopped_at: Utc::now(),
        }
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            overall_accuracy: 82.0,
            word_feedback: Vec::new(),
            phoneme_analysis: Vec::new(),
            improvement_tips: Vec::new(),
            recommended_exercises: Vec::new(),
            audio_quality: AudioQuality::Good,
            processing_time_seconds: 1.0,
        }
    }

    fn assert_invariant(session: &RecordingSession) {
        assert_eq!(session.audio().is_some(), session.state().holds_audio());
        assert_eq!(
            session.result().is_some(),
            session.state() == SessionState::FeedbackShown
        );
    }

    #[test]
    fn test_invariant_across_lifecycle() {
        let mut session = RecordingSession::default();
        assert_invariant(&session);

        session.start(Utc::now()).unwrap();
        assert_invariant(&session);
        session.stop(audio()).unwrap();
        assert_invariant(&session);
        assert_eq!(session.elapsed_secs(), 4);

        session.begin_analysis().unwrap();
        assert_invariant(&session);
        session.analysis_failed().unwrap();
        assert_invariant(&session);

        session.begin_analysis().unwrap();
        session.analysis_succeeded(result()).unwrap();
        assert_invariant(&session);

        session.re_record().unwrap();
        assert_invariant(&session);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_invalid_action_mutates_nothing() {
        let mut session = RecordingSession::default();
        session.start(Utc::now()).unwrap();
        let before = session.clone();
        assert!(session.begin_analysis().is_err());
        assert!(session.re_record().is_err());
        assert_eq!(session, before);
    }

    #[test]
    fn test_advance_past_last_sentence_completes() {
        let mut session = RecordingSession::default();
        session.start(Utc::now()).unwrap();
        session.stop(audio()).unwrap();
        session.begin_analysis().unwrap();
        session.analysis_succeeded(result()).unwrap();

        assert_eq!(session.advance(false).unwrap(), SessionState::Completed);
        assert_invariant(&session);
        session.reset();
        assert_eq!(session.state(), SessionState::Completed);
    }
}
