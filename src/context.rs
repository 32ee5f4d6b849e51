// AppContext: Dependency Injection Container
// Centralizes the shared services every practice session draws on

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::achievements::{AchievementCatalog, AchievementTracker, PendingAchievement};
use crate::analysis::{AnalysisClient, AnalysisTransport, Difficulty, HttpTransport};
use crate::auth::{IdentityProvider, UserSession};
use crate::config::AppConfig;
use crate::content::PracticeSet;
use crate::error::StoreError;
use crate::managers::BroadcastChannelManager;
use crate::pipeline::{AchievementUnlocked, ProgressPipeline, ProgressUpdated};
use crate::progress::{Clock, ProgressAggregator, ProgressSummary, SystemClock};
use crate::recording::{default_input, AudioInput, RecordingController};
use crate::session::{PracticeSession, SessionDeps};
use crate::store::{InMemoryStore, LiveProgress, PracticeStore};

/// AppContext: Dependency injection container for application services
///
/// Owns the long-lived pieces:
/// - Configuration and the signed-in user session
/// - Persistent store and the clock that defines "today"
/// - Analysis client and audio input shared by every practice session
/// - Progress pipeline, achievement tracker and their broadcast channels
///
/// Practice sessions are created per practice screen via
/// `new_practice_session` and torn down when dropped.
pub struct AppContext {
    config: AppConfig,
    user: UserSession,
    store: Arc<dyn PracticeStore>,
    clock: Arc<dyn Clock>,
    client: Arc<AnalysisClient>,
    input: Arc<dyn AudioInput>,
    broadcasts: Arc<BroadcastChannelManager>,
    tracker: Arc<AchievementTracker>,
    pipeline: Arc<ProgressPipeline>,
}

impl AppContext {
    /// Production wiring: webhook transport, in-memory store, system clock
    /// and the default audio input
    pub fn new(config: AppConfig) -> Self {
        let transport: Arc<dyn AnalysisTransport> =
            Arc::new(HttpTransport::from_config(&config.analysis));
        Self::from_parts(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(SystemClock::default()),
            transport,
            default_input(),
        )
    }

    /// Wire a context from explicit collaborators
    ///
    /// Used by tests and by hosts that bring their own store or transport.
    ///
    /// # Notes
    /// - Broadcast channels are initialized here, so subscribers can attach
    ///   before the first session completes
    /// - No user is signed in; hydrate `user_session()` first
    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn PracticeStore>,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn AnalysisTransport>,
        input: Arc<dyn AudioInput>,
    ) -> Self {
        let broadcasts = Arc::new(BroadcastChannelManager::new());
        broadcasts.init_progress();
        broadcasts.init_achievements();

        let tracker = Arc::new(AchievementTracker::new(
            Arc::clone(&store),
            Arc::new(AchievementCatalog::default()),
            Arc::clone(&clock),
            config.progress.weekly_goal,
        ));
        let pipeline = Arc::new(ProgressPipeline::new(
            ProgressAggregator::new(Arc::clone(&store), Arc::clone(&clock)),
            Arc::clone(&tracker),
            Arc::clone(&broadcasts),
        ));
        let client = Arc::new(AnalysisClient::new(transport, &config.analysis));

        Self {
            config,
            user: UserSession::new(),
            store,
            clock,
            client,
            input,
            broadcasts,
            tracker,
            pipeline,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The explicit user session (hydrate / sign out / tier changes)
    pub fn user_session(&self) -> &UserSession {
        &self.user
    }

    pub fn store(&self) -> Arc<dyn PracticeStore> {
        Arc::clone(&self.store)
    }

    pub fn tracker(&self) -> &AchievementTracker {
        &self.tracker
    }

    // ========================================================================
    // PRACTICE SESSIONS
    // ========================================================================

    /// Create a practice session with its own recorder.
    ///
    /// # Returns
    /// A `PracticeSession` on the first sentence of `set`, in `Idle`.
    ///
    /// # Notes
    /// - Successful analyses flow into the progress pipeline
    /// - Recording limits come from `config().recording`
    /// - Drop the session (or call `close`) on navigate-away
    pub fn new_practice_session(
        &self,
        set: PracticeSet,
        accent: impl Into<String>,
        difficulty: Difficulty,
    ) -> PracticeSession {
        let accent = accent.into();
        log::info!(
            "[AppContext] New practice session: {} ({}, {})",
            set.title,
            accent,
            difficulty.as_str()
        );
        PracticeSession::new(
            set,
            accent,
            difficulty,
            SessionDeps {
                recorder: RecordingController::new(
                    Arc::clone(&self.input),
                    self.config.recording.clone(),
                ),
                client: Arc::clone(&self.client),
                sink: self.pipeline.clone(),
                identity: Arc::new(self.user.clone()),
                clock: Arc::clone(&self.clock),
                mastery_threshold: self.config.progress.mastery_threshold,
            },
        )
    }

    // ========================================================================
    // DASHBOARD AND NOTIFICATIONS
    // ========================================================================

    /// Dashboard aggregates for the signed-in user
    ///
    /// # Returns
    /// `Ok(None)` when nobody is signed in.
    pub fn dashboard_summary(&self) -> Result<Option<ProgressSummary>, StoreError> {
        match self.user.current_user() {
            Some(user) => self.tracker.summary_for(&user.id).map(Some),
            None => Ok(None),
        }
    }

    /// Oldest unlocked achievement not yet shown to the signed-in user
    pub fn pending_achievement(&self) -> Result<Option<PendingAchievement>, StoreError> {
        match self.user.current_user() {
            Some(user) => self.tracker.next_pending(&user.id),
            None => Ok(None),
        }
    }

    /// Confirm the achievement notification was shown
    ///
    /// # Returns
    /// `true` only for the call that flipped `notified`. Unknown, unearned
    /// or already acknowledged achievements give `false`, as does being
    /// signed out.
    pub fn acknowledge_achievement(&self, achievement_id: &str) -> Result<bool, StoreError> {
        match self.user.current_user() {
            Some(user) => self.tracker.acknowledge(&user.id, achievement_id),
            None => Ok(false),
        }
    }

    /// Follow the signed-in user's progress rows. Requires a Tokio runtime.
    pub async fn live_progress(&self) -> Result<Option<LiveProgress>, StoreError> {
        let Some(user) = self.user.current_user() else {
            return Ok(None);
        };
        LiveProgress::start(Arc::clone(&self.store), &user.id)
            .await
            .map(Some)
    }

    pub fn subscribe_progress(&self) -> Option<broadcast::Receiver<ProgressUpdated>> {
        self.broadcasts.subscribe_progress()
    }

    pub fn subscribe_achievements(&self) -> Option<broadcast::Receiver<AchievementUnlocked>> {
        self.broadcasts.subscribe_achievements()
    }

    pub fn sign_out(&self) {
        self.user.sign_out();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{TransportResponse, WebhookPayload};
    use crate::auth::{CurrentUser, SubscriptionTier};
    use crate::error::AnalysisError;
    use crate::progress::FixedClock;
    use crate::recording::SyntheticInput;
    use crate::session::SessionState;
    use chrono::NaiveDate;
    use futures::future::BoxFuture;
    use std::time::Duration;

    struct FixedReply;

    impl AnalysisTransport for FixedReply {
        fn send(
            &self,
            _payload: WebhookPayload,
        ) -> BoxFuture<'static, Result<TransportResponse, AnalysisError>> {
            Box::pin(async {
                Ok(TransportResponse {
                    status: 200,
                    body: br#"{"overallAccuracy": 91, "wordFeedback": [], "phonemeAnalysis": [],
                        "improvementTips": [], "recommendedExercises": [],
                        "processingTimeSeconds": 1.5, "audioQuality": "excellent"}"#
                        .to_vec(),
                })
            })
        }
    }

    fn context() -> AppContext {
        AppContext::from_parts(
            AppConfig::default(),
            Arc::new(InMemoryStore::new()),
            Arc::new(FixedClock::at_date(
                NaiveDate::from_ymd_opt(2024, 10, 7).unwrap(),
            )),
            Arc::new(FixedReply),
            Arc::new(SyntheticInput::seeded(5)),
        )
    }

    #[test]
    fn test_signed_out_context_has_no_dashboard() {
        let ctx = context();
        assert_eq!(ctx.dashboard_summary().unwrap(), None);
        assert!(ctx.pending_achievement().unwrap().is_none());
        assert!(!ctx.acknowledge_achievement("first_session").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_feeds_dashboard_and_achievements() {
        let ctx = context();
        ctx.user_session().hydrate(CurrentUser::new(
            "u1",
            "learner@example.com",
            SubscriptionTier::Standard,
        ));
        let mut unlocks = ctx.subscribe_achievements().unwrap();

        let session = ctx.new_practice_session(
            PracticeSet::vowel_sounds(),
            "american",
            Difficulty::Advanced,
        );
        session.start().unwrap();
        tokio::time::sleep(Duration::from_millis(4_050)).await;
        session.stop().unwrap();
        session.analyze().await.unwrap();
        assert_eq!(session.state(), SessionState::FeedbackShown);

        let summary = ctx.dashboard_summary().unwrap().unwrap();
        assert_eq!(summary.total_sessions, 1);
        assert_eq!(summary.current_streak, 1);
        assert_eq!(summary.best_accuracy, 91.0);

        let mut unlocked = Vec::new();
        while let Ok(event) = unlocks.try_recv() {
            unlocked.push(event.achievement.id);
        }
        assert!(unlocked.contains(&"first_session".to_string()));
        assert!(unlocked.contains(&"accuracy_expert".to_string()));

        let pending = ctx.pending_achievement().unwrap().unwrap();
        assert!(ctx.acknowledge_achievement(&pending.achievement.id).unwrap());
        assert!(!ctx.acknowledge_achievement(&pending.achievement.id).unwrap());
    }
}
