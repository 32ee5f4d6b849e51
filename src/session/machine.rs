//! PracticeSession: drives one practice set through record, analyze and
//! feedback, one sentence at a time.
//!
//! All state lives behind a single `std::sync::Mutex` that is never held
//! across an `.await`. Two paths can finish a recording: `stop()` and the
//! auto-stop watcher. Both consume the recorder's finished slot under the
//! session lock, so exactly one of them moves the attempt to `Recorded`.
//!
//! The analysis call is the only suspension point. It runs outside the lock
//! under an `AbortHandle`, and its outcome is applied only if the session
//! generation still matches the one captured when the call began.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::{AbortHandle, Abortable};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::events::{SessionEvent, SessionResultSink};
use super::recording_session::RecordingSession;
use super::state::{transition, SessionAction, SessionState};
use crate::analysis::{AnalysisClient, AnalysisRequest, AnalysisResult, Difficulty};
use crate::auth::IdentityProvider;
use crate::content::{PracticeSentence, PracticeSet};
use crate::error::{
    log_recording_error, log_session_error, log_store_error, AnalysisError, ErrorCode,
    RecordingError, SessionError,
};
use crate::progress::{Clock, SessionCompletion};
use crate::recording::{RecordingController, RecordingEvent, RecordingStatus};

/// Collaborators a session needs besides its content
pub struct SessionDeps {
    pub recorder: RecordingController,
    pub client: Arc<AnalysisClient>,
    pub sink: Arc<dyn SessionResultSink>,
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
    pub mastery_threshold: f32,
}

/// What an analysis call needs once it leaves the lock
struct Submission {
    generation: u64,
    accent: String,
    sentence_text: String,
    difficulty: Difficulty,
    recorded_secs: u32,
}

struct SessionInner {
    set: PracticeSet,
    accent: String,
    difficulty: Difficulty,
    sentence_index: usize,
    attempt: RecordingSession,
    generation: u64,
    analysis_abort: Option<AbortHandle>,
}

impl SessionInner {
    fn has_next(&self) -> bool {
        self.sentence_index + 1 < self.set.len()
    }

    /// Abort any in-flight analysis and invalidate its result
    fn cancel_analysis(&mut self) {
        if let Some(handle) = self.analysis_abort.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

/// One practice screen: a set of sentences and the attempt on the current one
///
/// Owns its own `RecordingController` and publishes every state change and
/// analysis progress value as a `SessionEvent`.
///
/// # Lifecycle
/// - `start` / `stop` record the current sentence (auto-stop at the cap)
/// - `analyze` submits the capture and shows feedback on success
/// - `re_record` discards the attempt, `continue_next` moves on
/// - `close` (or drop) tears down timers and any in-flight analysis
///
/// # Notes
/// - Needs a Tokio runtime for `start` and `analyze`
/// - Successful analyses are forwarded to the `SessionResultSink`
pub struct PracticeSession {
    inner: Arc<Mutex<SessionInner>>,
    recorder: Arc<RecordingController>,
    client: Arc<AnalysisClient>,
    sink: Arc<dyn SessionResultSink>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<SessionEvent>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    mastery_threshold: f32,
}

fn lock_inner(inner: &Mutex<SessionInner>) -> Result<MutexGuard<'_, SessionInner>, SessionError> {
    inner.lock().map_err(|_| SessionError::StatePoisoned)
}

fn emit(events: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    let _ = events.send(event);
}

fn rejected<T>(err: SessionError, context: &str) -> Result<T, SessionError> {
    log_session_error(&err, context);
    Err(err)
}

/// Auto-stop path: move a finished capture into the attempt if it is
/// still recording. Manual stop takes its capture under the same lock.
fn apply_finished(
    inner: &Mutex<SessionInner>,
    recorder: &RecordingController,
    events: &broadcast::Sender<SessionEvent>,
) -> Result<bool, SessionError> {
    let mut guard = lock_inner(inner)?;
    if guard.attempt.state() != SessionState::Recording {
        return Ok(false);
    }
    let Some(audio) = recorder.take_finished()? else {
        return Ok(false);
    };
    let duration = audio.duration_secs;
    guard.attempt.stop(audio)?;
    drop(guard);

    log::info!("[PracticeSession] Recorded {}s of audio", duration);
    emit(
        events,
        SessionEvent::StateChanged {
            from: SessionState::Recording,
            to: SessionState::Recorded,
        },
    );
    Ok(true)
}

impl PracticeSession {
    pub fn new(
        set: PracticeSet,
        accent: impl Into<String>,
        difficulty: Difficulty,
        deps: SessionDeps,
    ) -> Self {
        let (events, _) = broadcast::channel(128);
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                set,
                accent: accent.into(),
                difficulty,
                sentence_index: 0,
                attempt: RecordingSession::default(),
                generation: 0,
                analysis_abort: None,
            })),
            recorder: Arc::new(deps.recorder),
            client: deps.client,
            sink: deps.sink,
            identity: deps.identity,
            clock: deps.clock,
            events,
            watcher: Mutex::new(None),
            mastery_threshold: deps.mastery_threshold,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionInner>, SessionError> {
        lock_inner(&self.inner)
    }

    /// Spawn the auto-stop watcher on first use
    fn ensure_watcher(&self, handle: &Handle) -> Result<(), SessionError> {
        let mut watcher = self
            .watcher
            .lock()
            .map_err(|_| SessionError::StatePoisoned)?;
        if watcher.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }

        let waiter = self.recorder.finished_waiter();
        let inner: Weak<Mutex<SessionInner>> = Arc::downgrade(&self.inner);
        let recorder: Weak<RecordingController> = Arc::downgrade(&self.recorder);
        let events = self.events.clone();
        *watcher = Some(handle.spawn(async move {
            while waiter.wait().await {
                let (Some(inner), Some(recorder)) = (inner.upgrade(), recorder.upgrade()) else {
                    break;
                };
                if let Err(err) = apply_finished(&inner, &recorder, &events) {
                    log_session_error(&err, "auto-stop");
                }
            }
            log::debug!("[PracticeSession] Auto-stop watcher exited");
        }));
        Ok(())
    }

    /// Begin recording the current sentence
    ///
    /// Opens the audio input and starts the elapsed and level timers.
    ///
    /// # Errors
    /// - `Recording(AlreadyRecording)` while a recording is running
    /// - `InvalidStateTransition` outside `Idle`
    /// - `Recording(RuntimeUnavailable)` without a Tokio runtime
    /// - `Recording(DeviceUnavailable)` when the input cannot be opened
    ///
    /// # Notes
    /// - On any error the session stays `Idle` with no timers or watcher
    /// - A later call can succeed once the device is available
    pub fn start(&self) -> Result<(), SessionError> {
        let mut inner = self.lock()?;
        let from = inner.attempt.state();
        if from == SessionState::Recording {
            return rejected(RecordingError::AlreadyRecording.into(), "start");
        }
        if let Err(err) = transition(from, SessionAction::Start, true) {
            return rejected(err, "start");
        }

        let handle = Handle::try_current().map_err(|_| {
            let err = RecordingError::RuntimeUnavailable;
            log_recording_error(&err, "start");
            SessionError::Recording(err)
        })?;
        self.recorder.start()?;
        if let Err(err) = self.ensure_watcher(&handle) {
            if let Err(cancel_err) = self.recorder.cancel() {
                log_recording_error(&cancel_err, "start");
            }
            return Err(err);
        }
        inner.attempt.start(self.clock.now())?;
        drop(inner);

        emit(
            &self.events,
            SessionEvent::StateChanged {
                from,
                to: SessionState::Recording,
            },
        );
        Ok(())
    }

    /// Stop recording. A no-op unless the attempt is recording.
    pub fn stop(&self) -> Result<(), SessionError> {
        let mut inner = self.lock()?;
        if inner.attempt.state() != SessionState::Recording {
            return Ok(());
        }
        let to = match self.recorder.stop() {
            Ok(Some(audio)) => {
                log::info!("[PracticeSession] Recorded {}s of audio", audio.duration_secs);
                inner.attempt.stop(audio)?;
                SessionState::Recorded
            }
            Ok(None) => {
                // Recorder lost its capture; nothing to analyze
                log::warn!("[PracticeSession] Stop found no capture");
                inner.attempt.reset();
                SessionState::Idle
            }
            Err(err) => {
                inner.attempt.reset();
                drop(inner);
                log_recording_error(&err, "stop");
                emit(
                    &self.events,
                    SessionEvent::StateChanged {
                        from: SessionState::Recording,
                        to: SessionState::Idle,
                    },
                );
                return Err(err.into());
            }
        };
        drop(inner);

        emit(
            &self.events,
            SessionEvent::StateChanged {
                from: SessionState::Recording,
                to,
            },
        );
        Ok(())
    }

    /// Submit the recorded attempt for analysis.
    ///
    /// # Returns
    /// The scored result; the session is then in `FeedbackShown`.
    ///
    /// # Errors
    /// - `Analysis(InvalidInput | UpgradeRequired | NotAuthenticated)` before
    ///   any network call; the attempt stays `Recorded`
    /// - `Analysis(ServiceUnavailable | InvalidResponse)` from the call; the
    ///   attempt returns to `Recorded` for a retry
    /// - `Analysis(Cancelled)` when re-record or close won the race
    ///
    /// # Notes
    /// - Progress values 0..=100 are published as `AnalysisProgress`
    /// - A sink failure is logged and does not undo the feedback
    pub async fn analyze(&self) -> Result<AnalysisResult, SessionError> {
        let user = self.identity.current_user();
        let (prepared, registration, submission) = {
            let mut inner = self.lock()?;
            let from = inner.attempt.state();
            if let Err(err) = transition(from, SessionAction::Analyze, true) {
                return rejected(err, "analyze");
            }

            let sentence_text = inner
                .set
                .sentences
                .get(inner.sentence_index)
                .map(|sentence| sentence.text.clone())
                .unwrap_or_default();
            let audio = inner
                .attempt
                .audio()
                .map(|audio| audio.payload().to_vec())
                .unwrap_or_default();
            let request = AnalysisRequest::new(audio, sentence_text.clone(), inner.accent.clone())
                .with_difficulty(inner.difficulty);
            let prepared = match self.client.prepare(&request, user.as_ref()) {
                Ok(prepared) => prepared,
                Err(err) => return rejected(err.into(), "analyze"),
            };

            let (abort, registration) = AbortHandle::new_pair();
            inner.cancel_analysis();
            inner.analysis_abort = Some(abort);
            inner.attempt.begin_analysis()?;
            let submission = Submission {
                generation: inner.generation,
                accent: inner.accent.clone(),
                sentence_text,
                difficulty: inner.difficulty,
                recorded_secs: inner.attempt.elapsed_secs(),
            };
            (prepared, registration, submission)
        };
        emit(
            &self.events,
            SessionEvent::StateChanged {
                from: SessionState::Recorded,
                to: SessionState::Analyzing,
            },
        );

        let session_id = prepared.session_id().to_string();
        let events = self.events.clone();
        let mut on_progress = move |value: u8| emit(&events, SessionEvent::AnalysisProgress(value));
        let outcome =
            Abortable::new(self.client.execute(prepared, &mut on_progress), registration).await;

        let mut inner = self.lock()?;
        let current = inner.generation == submission.generation
            && inner.attempt.state() == SessionState::Analyzing;
        let outcome = match outcome {
            Ok(outcome) if current => outcome,
            _ => {
                drop(inner);
                log::info!("[PracticeSession] Dropped superseded analysis {}", session_id);
                return Err(AnalysisError::Cancelled.into());
            }
        };
        inner.analysis_abort = None;

        match outcome {
            Ok(result) => {
                inner.attempt.analysis_succeeded(result.clone())?;
                drop(inner);

                emit(
                    &self.events,
                    SessionEvent::StateChanged {
                        from: SessionState::Analyzing,
                        to: SessionState::FeedbackShown,
                    },
                );
                emit(
                    &self.events,
                    SessionEvent::FeedbackReady {
                        overall_accuracy: result.overall_accuracy,
                    },
                );

                let completion = SessionCompletion::from_result(
                    user.map(|user| user.id).unwrap_or_default(),
                    submission.accent,
                    session_id,
                    submission.sentence_text,
                    submission.difficulty,
                    submission.recorded_secs,
                    &result,
                    self.mastery_threshold,
                    self.clock.now(),
                );
                if let Err(err) = self.sink.session_completed(&completion) {
                    log_store_error(&err, "session_completed");
                }
                Ok(result)
            }
            Err(err) => {
                inner.attempt.analysis_failed()?;
                drop(inner);

                emit(
                    &self.events,
                    SessionEvent::StateChanged {
                        from: SessionState::Analyzing,
                        to: SessionState::Recorded,
                    },
                );
                emit(
                    &self.events,
                    SessionEvent::AnalysisFailed {
                        code: err.code(),
                        message: err.message(),
                    },
                );
                Err(err.into())
            }
        }
    }

    /// Discard the attempt and return to `Idle` on the same sentence
    pub fn re_record(&self) -> Result<(), SessionError> {
        let mut inner = self.lock()?;
        let from = inner.attempt.state();
        if let Err(err) = inner.attempt.re_record() {
            return rejected(err, "re_record");
        }
        if from == SessionState::Analyzing {
            inner.cancel_analysis();
            log::info!("[PracticeSession] In-flight analysis cancelled by re-record");
        }
        drop(inner);

        emit(
            &self.events,
            SessionEvent::StateChanged {
                from,
                to: SessionState::Idle,
            },
        );
        Ok(())
    }

    /// Leave the feedback screen: next sentence, or `Completed` after the last
    pub fn continue_next(&self) -> Result<SessionState, SessionError> {
        let mut inner = self.lock()?;
        let from = inner.attempt.state();
        let has_next = inner.has_next();
        let to = match inner.attempt.advance(has_next) {
            Ok(to) => to,
            Err(err) => return rejected(err, "continue"),
        };
        let changed_sentence = if to == SessionState::Idle {
            inner.sentence_index += 1;
            Some(inner.sentence_index)
        } else {
            None
        };
        drop(inner);

        emit(&self.events, SessionEvent::StateChanged { from, to });
        if let Some(index) = changed_sentence {
            emit(&self.events, SessionEvent::SentenceChanged { index });
        } else {
            log::info!("[PracticeSession] Practice set completed");
        }
        Ok(to)
    }

    /// Navigate-away teardown: recorder, timers and in-flight analysis
    pub fn close(&self) {
        if let Err(err) = self.recorder.cancel() {
            log_recording_error(&err, "close");
        }
        let (from, to) = match self.lock() {
            Ok(mut inner) => {
                let from = inner.attempt.state();
                inner.cancel_analysis();
                inner.attempt.reset();
                (from, inner.attempt.state())
            }
            Err(err) => {
                log_session_error(&err, "close");
                return;
            }
        };
        if from != to {
            emit(&self.events, SessionEvent::StateChanged { from, to });
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock()
            .map(|inner| inner.attempt.state())
            .unwrap_or(SessionState::Idle)
    }

    /// Copy of the current attempt
    pub fn attempt(&self) -> Result<RecordingSession, SessionError> {
        Ok(self.lock()?.attempt.clone())
    }

    pub fn sentence_index(&self) -> usize {
        self.lock().map(|inner| inner.sentence_index).unwrap_or(0)
    }

    pub fn sentence_count(&self) -> usize {
        self.lock().map(|inner| inner.set.len()).unwrap_or(0)
    }

    pub fn current_sentence(&self) -> Option<PracticeSentence> {
        let inner = self.lock().ok()?;
        inner.set.sentences.get(inner.sentence_index).cloned()
    }

    pub fn accent(&self) -> String {
        self.lock()
            .map(|inner| inner.accent.clone())
            .unwrap_or_default()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.lock()
            .map(|inner| inner.difficulty)
            .unwrap_or_default()
    }

    /// Live elapsed time and level for the recording indicator
    pub fn recording_status(&self) -> Result<RecordingStatus, SessionError> {
        Ok(self.recorder.status()?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_recording(&self) -> broadcast::Receiver<RecordingEvent> {
        self.recorder.subscribe()
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        self.close();
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(task) = watcher.take() {
                task.abort();
            }
        }
    }
}
