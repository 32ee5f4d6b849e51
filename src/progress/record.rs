//! Daily progress records and the per-session contributions they fold.
//!
//! A `ProgressRecord` never stores running totals directly. It stores the
//! contribution of every session keyed by session id and derives its totals
//! from them. Merging two records is then a map union followed by a
//! recompute, which makes the merge commutative, associative and idempotent:
//! concurrent completions and re-delivered completions converge to the same
//! row.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, Difficulty, PhonemeScore};

/// Everything the progress pipeline needs from one successful analysis
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    pub user_id: String,
    pub accent: String,
    pub session_id: String,
    pub sentence_text: String,
    pub difficulty: Difficulty,
    pub accuracy: f32,
    /// Recording duration plus analysis processing time
    pub practice_seconds: f64,
    pub phonemes_practiced: BTreeSet<String>,
    pub mastered_phonemes: BTreeSet<String>,
    pub phoneme_feedback: Vec<PhonemeScore>,
    pub completed_at: DateTime<Utc>,
}

impl SessionCompletion {
    #[allow(clippy::too_many_arguments)]
    pub fn from_result(
        user_id: impl Into<String>,
        accent: impl Into<String>,
        session_id: impl Into<String>,
        sentence_text: impl Into<String>,
        difficulty: Difficulty,
        recording_secs: u32,
        result: &AnalysisResult,
        mastery_threshold: f32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            accent: accent.into(),
            session_id: session_id.into(),
            sentence_text: sentence_text.into(),
            difficulty,
            accuracy: result.overall_accuracy,
            practice_seconds: recording_secs as f64 + result.processing_time_seconds,
            phonemes_practiced: result.phoneme_symbols().into_iter().collect(),
            mastered_phonemes: result.mastered_symbols(mastery_threshold).into_iter().collect(),
            phoneme_feedback: result.phoneme_analysis.clone(),
            completed_at,
        }
    }

    pub fn contribution(&self) -> SessionContribution {
        SessionContribution {
            accuracy: self.accuracy,
            practice_seconds: self.practice_seconds,
            phonemes_practiced: self.phonemes_practiced.clone(),
            mastered_phonemes: self.mastered_phonemes.clone(),
            completed_at: self.completed_at,
        }
    }
}

/// One session's share of a daily record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContribution {
    pub accuracy: f32,
    pub practice_seconds: f64,
    pub phonemes_practiced: BTreeSet<String>,
    pub mastered_phonemes: BTreeSet<String>,
    pub completed_at: DateTime<Utc>,
}

impl SessionContribution {
    /// Total order used when two copies of the same session disagree
    fn precedence(&self, other: &Self) -> Ordering {
        self.completed_at
            .cmp(&other.completed_at)
            .then_with(|| self.accuracy.total_cmp(&other.accuracy))
            .then_with(|| self.practice_seconds.total_cmp(&other.practice_seconds))
            .then_with(|| self.phonemes_practiced.cmp(&other.phonemes_practiced))
            .then_with(|| self.mastered_phonemes.cmp(&other.mastered_phonemes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgressKey {
    pub user_id: String,
    pub accent: String,
    pub date: NaiveDate,
}

/// Aggregate practice for one (user, accent, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub accent: String,
    pub date: NaiveDate,
    pub sessions_completed: u32,
    pub total_practice_seconds: f64,
    pub average_accuracy: f32,
    pub phonemes_practiced: BTreeSet<String>,
    pub mastered_phonemes: BTreeSet<String>,
    pub streak_count: u32,
    pub is_streak_active: bool,
    pub last_practice_at: Option<DateTime<Utc>>,
    pub contributions: BTreeMap<String, SessionContribution>,
}

impl ProgressRecord {
    /// Empty record for a key, before any session
    pub fn empty(key: ProgressKey) -> Self {
        Self {
            user_id: key.user_id,
            accent: key.accent,
            date: key.date,
            sessions_completed: 0,
            total_practice_seconds: 0.0,
            average_accuracy: 0.0,
            phonemes_practiced: BTreeSet::new(),
            mastered_phonemes: BTreeSet::new(),
            streak_count: 0,
            is_streak_active: false,
            last_practice_at: None,
            contributions: BTreeMap::new(),
        }
    }

    /// Single-session record for the completion's day
    pub fn from_completion(completion: &SessionCompletion, date: NaiveDate, streak_count: u32) -> Self {
        let mut record = Self::empty(ProgressKey {
            user_id: completion.user_id.clone(),
            accent: completion.accent.clone(),
            date,
        });
        record
            .contributions
            .insert(completion.session_id.clone(), completion.contribution());
        record.streak_count = streak_count;
        record.is_streak_active = true;
        record.recompute();
        record
    }

    pub fn key(&self) -> ProgressKey {
        ProgressKey {
            user_id: self.user_id.clone(),
            accent: self.accent.clone(),
            date: self.date,
        }
    }

    /// Fold `other` into this record. Records for different keys are left
    /// untouched and `false` is returned.
    pub fn merge(&mut self, other: &ProgressRecord) -> bool {
        if self.user_id != other.user_id || self.accent != other.accent || self.date != other.date
        {
            log::warn!(
                "[ProgressRecord] Refusing to merge {:?} into {:?}",
                other.key(),
                self.key()
            );
            return false;
        }

        for (session_id, incoming) in &other.contributions {
            match self.contributions.get(session_id) {
                Some(existing) if existing.precedence(incoming) != Ordering::Less => {}
                _ => {
                    self.contributions.insert(session_id.clone(), incoming.clone());
                }
            }
        }
        self.streak_count = self.streak_count.max(other.streak_count);
        self.is_streak_active = self.is_streak_active || other.is_streak_active;
        self.recompute();
        true
    }

    /// Merge of two records without mutating either
    pub fn merged(&self, other: &ProgressRecord) -> ProgressRecord {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    fn recompute(&mut self) {
        let count = self.contributions.len();
        self.sessions_completed = count as u32;
        self.total_practice_seconds = self.contributions.values().map(|c| c.practice_seconds).sum();
        self.average_accuracy = if count == 0 {
            0.0
        } else {
            let sum: f64 = self.contributions.values().map(|c| c.accuracy as f64).sum();
            (sum / count as f64) as f32
        };
        self.phonemes_practiced = self
            .contributions
            .values()
            .flat_map(|c| c.phonemes_practiced.iter().cloned())
            .collect();
        self.mastered_phonemes = self
            .contributions
            .values()
            .flat_map(|c| c.mastered_phonemes.iter().cloned())
            .collect();
        self.last_practice_at = self.contributions.values().map(|c| c.completed_at).max();
    }

    /// Practice time in whole minutes, rounded up
    pub fn total_practice_minutes(&self) -> u32 {
        (self.total_practice_seconds / 60.0).ceil() as u32
    }

    /// Sum of accuracies, for session-weighted averages across records
    pub fn accuracy_sum(&self) -> f64 {
        self.contributions.values().map(|c| c.accuracy as f64).sum()
    }

    pub fn best_accuracy(&self) -> Option<f32> {
        self.contributions
            .values()
            .map(|c| c.accuracy)
            .max_by(|a, b| a.total_cmp(b))
    }
}

/// One row of practice history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub accent: String,
    pub sentence_text: String,
    pub accuracy: f32,
    pub duration_seconds: f64,
    pub difficulty: Difficulty,
    pub phoneme_feedback: Vec<PhonemeScore>,
    pub completed_at: DateTime<Utc>,
}

impl From<&SessionCompletion> for PracticeSessionRecord {
    fn from(completion: &SessionCompletion) -> Self {
        Self {
            session_id: completion.session_id.clone(),
            user_id: completion.user_id.clone(),
            accent: completion.accent.clone(),
            sentence_text: completion.sentence_text.clone(),
            accuracy: completion.accuracy,
            duration_seconds: completion.practice_seconds,
            difficulty: completion.difficulty,
            phoneme_feedback: completion.phoneme_feedback.clone(),
            completed_at: completion.completed_at,
        }
    }
}
