// ProgressSummary - dashboard aggregates across a user's daily rows

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::record::ProgressRecord;
use super::streak::is_streak_live;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total_sessions: u32,
    pub total_practice_minutes: u32,
    /// Mean over every session, not over days
    pub average_accuracy: f32,
    pub best_accuracy: f32,
    /// Longest streak still live today
    pub current_streak: u32,
    pub longest_streak: u32,
    pub mastered_phonemes: u32,
    pub distinct_accents: u32,
    /// Sessions since the most recent Sunday
    pub weekly_sessions: u32,
    pub weekly_goal: u32,
}

impl ProgressSummary {
    pub fn from_records(records: &[ProgressRecord], today: NaiveDate, weekly_goal: u32) -> Self {
        let total_sessions: u32 = records.iter().map(|r| r.sessions_completed).sum();
        let total_seconds: f64 = records.iter().map(|r| r.total_practice_seconds).sum();
        let accuracy_sum: f64 = records.iter().map(|r| r.accuracy_sum()).sum();

        let average_accuracy = if total_sessions == 0 {
            0.0
        } else {
            (accuracy_sum / total_sessions as f64) as f32
        };
        let best_accuracy = records
            .iter()
            .filter_map(|r| r.best_accuracy())
            .fold(0.0_f32, f32::max);

        let current_streak = records
            .iter()
            .filter(|r| r.is_streak_active && is_streak_live(r.date, today))
            .map(|r| r.streak_count)
            .max()
            .unwrap_or(0);

        let mastered: BTreeSet<&String> =
            records.iter().flat_map(|r| r.mastered_phonemes.iter()).collect();
        let accents: BTreeSet<&String> = records
            .iter()
            .filter(|r| r.sessions_completed > 0)
            .map(|r| &r.accent)
            .collect();

        let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
        let weekly_sessions = records
            .iter()
            .filter(|r| r.date >= week_start && r.date <= today)
            .map(|r| r.sessions_completed)
            .sum();

        Self {
            total_sessions,
            total_practice_minutes: (total_seconds / 60.0).ceil() as u32,
            average_accuracy,
            best_accuracy,
            current_streak,
            longest_streak: longest_streak(records),
            mastered_phonemes: mastered.len() as u32,
            distinct_accents: accents.len() as u32,
            weekly_sessions,
            weekly_goal,
        }
    }

    pub fn weekly_goal_met(&self) -> bool {
        self.weekly_sessions >= self.weekly_goal
    }
}

/// Longest run of consecutive practice days for any accent
fn longest_streak(records: &[ProgressRecord]) -> u32 {
    let mut by_accent: HashMap<&str, BTreeSet<NaiveDate>> = HashMap::new();
    for record in records.iter().filter(|r| r.sessions_completed > 0) {
        by_accent.entry(&record.accent).or_default().insert(record.date);
    }

    let mut longest = records.iter().map(|r| r.streak_count).max().unwrap_or(0);
    for dates in by_accent.values() {
        let mut run = 0u32;
        let mut previous: Option<NaiveDate> = None;
        for date in dates {
            run = match previous {
                Some(prev) if prev.succ_opt() == Some(*date) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous = Some(*date);
        }
    }
    longest
}
