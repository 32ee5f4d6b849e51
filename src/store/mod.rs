// Store module - persistence seam for progress, history and achievements
//
// PracticeStore is the contract the aggregator and tracker write through.
// Writes are merges, never blind overwrites, so concurrent and repeated
// writes converge. InMemoryStore is the bundled implementation; remote
// backends implement the same trait.

mod feed;
mod live;
mod memory;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::achievements::UserAchievement;
use crate::error::StoreError;
use crate::progress::{PracticeSessionRecord, ProgressKey, ProgressRecord};

pub use feed::ChangeFeed;
pub use live::LiveProgress;
pub use memory::{InMemoryStore, StoreSnapshot};

/// A committed write, published to change-feed subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreChange {
    Progress(ProgressRecord),
    PracticeSession(PracticeSessionRecord),
    Achievement(UserAchievement),
}

impl StoreChange {
    pub fn user_id(&self) -> &str {
        match self {
            StoreChange::Progress(record) => &record.user_id,
            StoreChange::PracticeSession(record) => &record.user_id,
            StoreChange::Achievement(achievement) => &achievement.user_id,
        }
    }
}

pub trait PracticeStore: Send + Sync {
    /// Merge `record` into the row for its key and return the stored row
    fn upsert_progress(&self, record: ProgressRecord) -> Result<ProgressRecord, StoreError>;

    fn progress(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>, StoreError>;

    /// All progress rows for a user, oldest date first
    fn progress_for_user(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError>;

    /// Most recent row for (user, accent) dated on or before `date`
    fn latest_progress_until(
        &self,
        user_id: &str,
        accent: &str,
        date: NaiveDate,
    ) -> Result<Option<ProgressRecord>, StoreError>;

    /// Insert a history row. Returns false when the session id is already
    /// recorded.
    fn insert_practice_session(&self, record: PracticeSessionRecord) -> Result<bool, StoreError>;

    /// History rows for a user, oldest first
    fn practice_sessions(&self, user_id: &str) -> Result<Vec<PracticeSessionRecord>, StoreError>;

    fn user_achievements(&self, user_id: &str) -> Result<Vec<UserAchievement>, StoreError>;

    /// Monotonic merge of `achievement` into the stored row
    fn upsert_user_achievement(
        &self,
        achievement: UserAchievement,
    ) -> Result<UserAchievement, StoreError>;

    /// Merge an earned row. Returns true only when this call flipped
    /// `is_earned`, so concurrent evaluations report an unlock once.
    fn earn_achievement(&self, achievement: UserAchievement) -> Result<bool, StoreError>;

    /// Set `notified` on an earned row. Returns true only when this call
    /// flipped the flag; rows still in progress are left untouched.
    fn mark_notified(&self, user_id: &str, achievement_id: &str) -> Result<bool, StoreError>;

    /// Change feed filtered to one user
    fn subscribe(&self, user_id: &str) -> ChangeFeed;
}
