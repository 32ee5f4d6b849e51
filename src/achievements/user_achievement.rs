// Per-user achievement state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's standing against one catalog entry
///
/// `is_earned` and `notified` only ever go from false to true, and
/// `progress_value` never decreases. `merge` enforces this for every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAchievement {
    pub user_id: String,
    pub achievement_id: String,
    pub is_earned: bool,
    pub progress_value: u32,
    pub notified: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

impl UserAchievement {
    pub fn in_progress(user_id: &str, achievement_id: &str, progress_value: u32) -> Self {
        Self {
            user_id: user_id.to_string(),
            achievement_id: achievement_id.to_string(),
            is_earned: false,
            progress_value,
            notified: false,
            earned_at: None,
        }
    }

    pub fn earned(
        user_id: &str,
        achievement_id: &str,
        progress_value: u32,
        earned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            is_earned: true,
            earned_at: Some(earned_at),
            ..Self::in_progress(user_id, achievement_id, progress_value)
        }
    }

    /// Earned but not yet shown to the user
    pub fn is_pending(&self) -> bool {
        self.is_earned && !self.notified
    }

    /// Monotonic merge: flags OR together, progress takes the maximum and
    /// the earliest earn time wins.
    pub fn merge(&mut self, other: &UserAchievement) {
        self.is_earned |= other.is_earned;
        self.notified |= other.notified;
        self.progress_value = self.progress_value.max(other.progress_value);
        self.earned_at = match (self.earned_at, other.earned_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}
