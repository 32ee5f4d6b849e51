//! End-to-end practice flows through AppContext
//!
//! Every test runs on paused Tokio time, so recording timers and analysis
//! progress ticks advance deterministically. The analysis webhook is
//! replaced by a counting transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use accent_mastery::analysis::{AnalysisTransport, Difficulty, TransportResponse, WebhookPayload};
use accent_mastery::auth::{CurrentUser, SubscriptionTier};
use accent_mastery::config::AppConfig;
use accent_mastery::content::PracticeSet;
use accent_mastery::error::{AnalysisError, SessionError};
use accent_mastery::progress::FixedClock;
use accent_mastery::recording::SyntheticInput;
use accent_mastery::session::{PracticeSession, SessionEvent, SessionState};
use accent_mastery::store::{InMemoryStore, PracticeStore};
use accent_mastery::AppContext;
use chrono::NaiveDate;
use futures::future::BoxFuture;

const SCORED_82: &str = r#"{
    "overallAccuracy": 82,
    "wordFeedback": [
        {"word": "meeting", "score": 94, "status": "excellent", "phonemes": [{"symbol": "/iː/", "accuracy": 94}]},
        {"word": "three", "score": 68, "status": "needs-work", "phonemes": [{"symbol": "/θ/", "accuracy": 68}]}
    ],
    "phonemeAnalysis": [
        {"symbol": "/iː/", "accuracy": 94, "feedback": "Good length", "tips": []},
        {"symbol": "/ɑː/", "accuracy": 90, "feedback": "Open enough", "tips": []},
        {"symbol": "/θ/", "accuracy": 68, "feedback": "Sounds like /t/", "tips": ["Tongue between teeth"]}
    ],
    "improvementTips": ["Keep the tongue forward for th"],
    "recommendedExercises": [
        {"title": "TH drills", "description": "Minimal pairs: tree / three", "difficulty": "beginner"}
    ],
    "processingTime": 2.5,
    "audioQuality": "good"
}"#;

struct CountingTransport {
    calls: AtomicUsize,
    status: u16,
    body: &'static str,
}

impl CountingTransport {
    fn new(status: u16, body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            status,
            body,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AnalysisTransport for CountingTransport {
    fn send(
        &self,
        _payload: WebhookPayload,
    ) -> BoxFuture<'static, Result<TransportResponse, AnalysisError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = TransportResponse {
            status: self.status,
            body: self.body.as_bytes().to_vec(),
        };
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(800)).await;
            Ok(response)
        })
    }
}

struct Fixture {
    ctx: AppContext,
    store: Arc<dyn PracticeStore>,
    transport: Arc<CountingTransport>,
}

fn fixture(transport: Arc<CountingTransport>, tier: SubscriptionTier) -> Fixture {
    let store: Arc<dyn PracticeStore> = Arc::new(InMemoryStore::new());
    let ctx = AppContext::from_parts(
        AppConfig::default(),
        Arc::clone(&store),
        Arc::new(FixedClock::at_date(
            NaiveDate::from_ymd_opt(2024, 11, 12).unwrap(),
        )),
        transport.clone(),
        Arc::new(SyntheticInput::seeded(42)),
    );
    ctx.user_session()
        .hydrate(CurrentUser::new("learner-1", "learner@example.com", tier));
    Fixture {
        ctx,
        store,
        transport,
    }
}

fn session(fixture: &Fixture, difficulty: Difficulty) -> PracticeSession {
    fixture
        .ctx
        .new_practice_session(PracticeSet::vowel_sounds(), "american", difficulty)
}

async fn record_for(session: &PracticeSession, secs: u64) {
    session.start().unwrap();
    tokio::time::sleep(Duration::from_millis(secs * 1_000 + 20)).await;
    session.stop().unwrap();
}

/// Scenario A: record 5s, stop, re-record
#[tokio::test(start_paused = true)]
async fn test_record_stop_then_re_record() {
    let fixture = fixture(CountingTransport::new(200, SCORED_82), SubscriptionTier::Free);
    let session = session(&fixture, Difficulty::Intermediate);

    record_for(&session, 5).await;
    assert_eq!(session.state(), SessionState::Recorded);
    let attempt = session.attempt().unwrap();
    let audio = attempt.audio().expect("recorded audio");
    assert_eq!(audio.duration_secs, 5);
    assert!(!audio.payload().is_empty());
    assert!(!session.recording_status().unwrap().is_recording);
    assert_eq!(session.recording_status().unwrap().level, 0);

    session.re_record().unwrap();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.attempt().unwrap().audio().is_none());
    assert_eq!(fixture.transport.calls(), 0);
}

/// Scenario B: a successful analysis feeds the daily progress row
#[tokio::test(start_paused = true)]
async fn test_successful_analysis_updates_progress() {
    let fixture = fixture(CountingTransport::new(200, SCORED_82), SubscriptionTier::Free);
    let session = session(&fixture, Difficulty::Intermediate);
    let mut events = session.subscribe();

    record_for(&session, 4).await;
    let result = session.analyze().await.unwrap();
    assert_eq!(result.overall_accuracy, 82.0);
    assert_eq!(session.state(), SessionState::FeedbackShown);

    let records = fixture.store.progress_for_user("learner-1").unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.sessions_completed, 1);
    assert_eq!(record.average_accuracy, 82.0);
    assert_eq!(record.total_practice_seconds, 6.5);
    assert!(record.mastered_phonemes.contains("/iː/"));
    assert!(record.mastered_phonemes.contains("/ɑː/"));
    assert!(!record.mastered_phonemes.contains("/θ/"));
    assert_eq!(record.phonemes_practiced.len(), 3);
    assert_eq!(record.streak_count, 1);

    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::AnalysisProgress(value) = event {
            progress.push(value);
        }
    }
    assert_eq!(progress.first(), Some(&0));
    assert_eq!(progress.last(), Some(&100));
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(progress.iter().filter(|value| **value == 100).count(), 1);

    // Second sentence folds into the same daily row
    session.continue_next().unwrap();
    record_for(&session, 2).await;
    session.analyze().await.unwrap();
    let records = fixture.store.progress_for_user("learner-1").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sessions_completed, 2);
    assert_eq!(fixture.store.practice_sessions("learner-1").unwrap().len(), 2);
}

/// Scenario C: HTTP failure returns to Recorded and leaves progress alone
#[tokio::test(start_paused = true)]
async fn test_http_error_keeps_recording_and_progress() {
    let fixture = fixture(
        CountingTransport::new(502, "bad gateway"),
        SubscriptionTier::Free,
    );
    let session = session(&fixture, Difficulty::Intermediate);

    record_for(&session, 3).await;
    let err = session.analyze().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Analysis(AnalysisError::ServiceUnavailable {
            status: Some(502),
            ..
        })
    ));
    assert_eq!(session.state(), SessionState::Recorded);
    assert!(session.attempt().unwrap().audio().is_some());
    assert!(fixture
        .store
        .progress_for_user("learner-1")
        .unwrap()
        .is_empty());
    assert_eq!(fixture.transport.calls(), 1);
}

/// Scenario D: the 30 s cap auto-stops into the same state as a manual stop
#[tokio::test(start_paused = true)]
async fn test_auto_stop_at_cap() {
    let fixture = fixture(CountingTransport::new(200, SCORED_82), SubscriptionTier::Free);
    let session = session(&fixture, Difficulty::Intermediate);

    session.start().unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(session.state(), SessionState::Recorded);
    assert!(!session.recording_status().unwrap().is_recording);
    let attempt = session.attempt().unwrap();
    let audio = attempt.audio().expect("auto-stopped audio");
    assert_eq!(audio.duration_secs, 30);
    assert_eq!(attempt.elapsed_secs(), 30);

    // Manual stop afterwards is a no-op and the capture analyzes normally
    session.stop().unwrap();
    assert_eq!(session.attempt().unwrap(), attempt);
    session.analyze().await.unwrap();
    assert_eq!(session.state(), SessionState::FeedbackShown);
}

/// Scenario E: advanced difficulty on the free tier never reaches the network
#[tokio::test(start_paused = true)]
async fn test_free_tier_advanced_requires_upgrade() {
    let fixture = fixture(CountingTransport::new(200, SCORED_82), SubscriptionTier::Free);
    let session = session(&fixture, Difficulty::Advanced);

    record_for(&session, 2).await;
    let err = session.analyze().await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Analysis(AnalysisError::UpgradeRequired {
            tier: SubscriptionTier::Free
        })
    );
    assert_eq!(fixture.transport.calls(), 0);
    assert_eq!(session.state(), SessionState::Recorded);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_session_stops_timers() {
    let fixture = fixture(CountingTransport::new(200, SCORED_82), SubscriptionTier::Free);
    let session = session(&fixture, Difficulty::Intermediate);
    let mut recording_events = session.subscribe_recording();

    session.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    drop(session);
    while recording_events.try_recv().is_ok() {}

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(recording_events.try_recv().is_err());
}
