// Pure achievement evaluation over aggregate progress

use std::collections::HashMap;

use super::catalog::{Achievement, AchievementCatalog};
use super::user_achievement::UserAchievement;
use crate::progress::ProgressSummary;

/// Outcome of one evaluation pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    /// Requirement met and not previously earned
    pub newly_earned: Vec<Achievement>,
    /// (achievement id, current value) for unearned entries whose progress
    /// moved forward
    pub progress_updates: Vec<(String, u32)>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.newly_earned.is_empty() && self.progress_updates.is_empty()
    }
}

/// Compare the catalog against `summary` and the user's stored rows.
///
/// Running this twice on the same inputs yields the same result, and
/// entries already earned are never returned again.
pub fn evaluate(
    catalog: &AchievementCatalog,
    summary: &ProgressSummary,
    existing: &[UserAchievement],
) -> Evaluation {
    let by_id: HashMap<&str, &UserAchievement> = existing
        .iter()
        .map(|a| (a.achievement_id.as_str(), a))
        .collect();

    let mut evaluation = Evaluation::default();
    for achievement in catalog.iter() {
        let stored = by_id.get(achievement.id.as_str());
        if stored.is_some_and(|a| a.is_earned) {
            continue;
        }

        let value = achievement
            .requirement
            .current_value(summary)
            .min(achievement.requirement.target());
        if achievement.requirement.is_met(summary) {
            evaluation.newly_earned.push(achievement.clone());
        } else if stored.map_or(value > 0, |a| value > a.progress_value) {
            evaluation
                .progress_updates
                .push((achievement.id.clone(), value));
        }
    }
    evaluation
}
