// ProgressPipeline: what happens after a successful analysis
//
// completion -> ProgressAggregator (daily record + history row)
//            -> AchievementTracker (unlocks persisted as pending)
//            -> BroadcastChannelManager (progress / unlock notifications)

use std::sync::Arc;

use crate::achievements::{Achievement, AchievementTracker};
use crate::error::{log_store_error, StoreError};
use crate::managers::BroadcastChannelManager;
use crate::progress::{ProgressAggregator, ProgressRecord, SessionCompletion};
use crate::session::SessionResultSink;

/// A daily progress row changed for a user
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdated {
    pub user_id: String,
    pub record: ProgressRecord,
}

/// An achievement was earned and is waiting to be shown
#[derive(Debug, Clone, PartialEq)]
pub struct AchievementUnlocked {
    pub user_id: String,
    pub achievement: Achievement,
}

pub struct ProgressPipeline {
    aggregator: ProgressAggregator,
    tracker: Arc<AchievementTracker>,
    broadcasts: Arc<BroadcastChannelManager>,
}

impl ProgressPipeline {
    pub fn new(
        aggregator: ProgressAggregator,
        tracker: Arc<AchievementTracker>,
        broadcasts: Arc<BroadcastChannelManager>,
    ) -> Self {
        Self {
            aggregator,
            tracker,
            broadcasts,
        }
    }

    /// Aggregate one completion and evaluate achievements.
    ///
    /// Returns the achievements unlocked by this completion.
    pub fn process(&self, completion: &SessionCompletion) -> Result<Vec<Achievement>, StoreError> {
        let record = self.aggregator.record_completion(completion)?;
        self.broadcasts.publish_progress(ProgressUpdated {
            user_id: completion.user_id.clone(),
            record,
        });

        let unlocked = self.tracker.evaluate_for(&completion.user_id)?;
        for achievement in &unlocked {
            self.broadcasts.publish_achievement(AchievementUnlocked {
                user_id: completion.user_id.clone(),
                achievement: achievement.clone(),
            });
        }
        Ok(unlocked)
    }
}

impl SessionResultSink for ProgressPipeline {
    fn session_completed(&self, completion: &SessionCompletion) -> Result<(), StoreError> {
        self.process(completion).map(|_| ()).map_err(|err| {
            log_store_error(&err, "session_completed");
            err
        })
    }
}
