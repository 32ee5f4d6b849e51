//! InMemoryStore: process-local PracticeStore with JSON snapshots.
//!
//! All tables live behind one mutex so every write is a single atomic
//! read-merge-write. Committed changes are published on a broadcast
//! channel after the lock is released.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{ChangeFeed, PracticeStore, StoreChange};
use crate::achievements::UserAchievement;
use crate::error::{log_store_error, StoreError};
use crate::progress::{PracticeSessionRecord, ProgressKey, ProgressRecord};

/// Change channel depth before slow subscribers start lagging
const CHANGE_BUFFER: usize = 256;

/// Serializable image of every table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub progress: Vec<ProgressRecord>,
    #[serde(default)]
    pub practice_sessions: Vec<PracticeSessionRecord>,
    #[serde(default)]
    pub achievements: Vec<UserAchievement>,
}

#[derive(Default)]
struct Tables {
    progress: BTreeMap<ProgressKey, ProgressRecord>,
    practice_sessions: BTreeMap<String, PracticeSessionRecord>,
    achievements: BTreeMap<(String, String), UserAchievement>,
}

pub struct InMemoryStore {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<StoreChange>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            tables: Mutex::new(Tables::default()),
            changes,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn publish(&self, change: StoreChange) {
        let _ = self.changes.send(change);
    }

    /// Merge under the table lock. Returns the stored row and whether it
    /// was already earned before this write.
    fn merge_achievement(
        &self,
        achievement: UserAchievement,
    ) -> Result<(UserAchievement, bool), StoreError> {
        let (stored, was_earned, changed) = {
            let mut tables = self.lock()?;
            let key = (achievement.user_id.clone(), achievement.achievement_id.clone());
            match tables.achievements.get_mut(&key) {
                Some(existing) => {
                    let before = existing.clone();
                    existing.merge(&achievement);
                    (existing.clone(), before.is_earned, *existing != before)
                }
                None => {
                    tables.achievements.insert(key, achievement.clone());
                    (achievement, false, true)
                }
            }
        };
        if changed {
            self.publish(StoreChange::Achievement(stored.clone()));
        }
        Ok((stored, was_earned))
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.lock() {
            for record in snapshot.progress {
                let key = record.key();
                match tables.progress.get_mut(&key) {
                    Some(existing) => {
                        existing.merge(&record);
                    }
                    None => {
                        tables.progress.insert(key, record);
                    }
                }
            }
            for record in snapshot.practice_sessions {
                tables
                    .practice_sessions
                    .entry(record.session_id.clone())
                    .or_insert(record);
            }
            for achievement in snapshot.achievements {
                let key = (achievement.user_id.clone(), achievement.achievement_id.clone());
                tables
                    .achievements
                    .entry(key)
                    .and_modify(|existing| existing.merge(&achievement))
                    .or_insert(achievement);
            }
        }
        store
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        let tables = self.lock()?;
        Ok(StoreSnapshot {
            progress: tables.progress.values().cloned().collect(),
            practice_sessions: tables.practice_sessions.values().cloned().collect(),
            achievements: tables.achievements.values().cloned().collect(),
        })
    }

    /// Write every table to `path` as pretty JSON
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let snapshot = self.snapshot()?;
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path.as_ref(), json).map_err(|err| {
            let err = StoreError::from(err);
            log_store_error(&err, "save_snapshot");
            err
        })?;
        log::info!(
            "[InMemoryStore] Saved snapshot to {:?} ({} progress rows)",
            path.as_ref(),
            snapshot.progress.len()
        );
        Ok(())
    }

    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let snapshot: StoreSnapshot = serde_json::from_str(&contents)?;
        log::info!("[InMemoryStore] Loaded snapshot from {:?}", path.as_ref());
        Ok(Self::from_snapshot(snapshot))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PracticeStore for InMemoryStore {
    fn upsert_progress(&self, record: ProgressRecord) -> Result<ProgressRecord, StoreError> {
        let stored = {
            let mut tables = self.lock()?;
            let key = record.key();
            match tables.progress.get_mut(&key) {
                Some(existing) => {
                    existing.merge(&record);
                    existing.clone()
                }
                None => {
                    tables.progress.insert(key, record.clone());
                    record
                }
            }
        };
        self.publish(StoreChange::Progress(stored.clone()));
        Ok(stored)
    }

    fn progress(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(self.lock()?.progress.get(key).cloned())
    }

    fn progress_for_user(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        let tables = self.lock()?;
        let mut records: Vec<ProgressRecord> = tables
            .progress
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.accent.cmp(&b.accent)));
        Ok(records)
    }

    fn latest_progress_until(
        &self,
        user_id: &str,
        accent: &str,
        date: NaiveDate,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .progress
            .values()
            .filter(|r| r.user_id == user_id && r.accent == accent && r.date <= date)
            .max_by_key(|r| r.date)
            .cloned())
    }

    fn insert_practice_session(&self, record: PracticeSessionRecord) -> Result<bool, StoreError> {
        {
            let mut tables = self.lock()?;
            if tables.practice_sessions.contains_key(&record.session_id) {
                return Ok(false);
            }
            tables
                .practice_sessions
                .insert(record.session_id.clone(), record.clone());
        }
        self.publish(StoreChange::PracticeSession(record));
        Ok(true)
    }

    fn practice_sessions(&self, user_id: &str) -> Result<Vec<PracticeSessionRecord>, StoreError> {
        let tables = self.lock()?;
        let mut rows: Vec<PracticeSessionRecord> = tables
            .practice_sessions
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.completed_at);
        Ok(rows)
    }

    fn user_achievements(&self, user_id: &str) -> Result<Vec<UserAchievement>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .achievements
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn upsert_user_achievement(
        &self,
        achievement: UserAchievement,
    ) -> Result<UserAchievement, StoreError> {
        let (stored, _) = self.merge_achievement(achievement)?;
        Ok(stored)
    }

    fn earn_achievement(&self, achievement: UserAchievement) -> Result<bool, StoreError> {
        let (stored, was_earned) = self.merge_achievement(achievement)?;
        Ok(stored.is_earned && !was_earned)
    }

    fn mark_notified(&self, user_id: &str, achievement_id: &str) -> Result<bool, StoreError> {
        let flipped = {
            let mut tables = self.lock()?;
            let key = (user_id.to_string(), achievement_id.to_string());
            match tables.achievements.get_mut(&key) {
                Some(existing) if existing.is_earned && !existing.notified => {
                    existing.notified = true;
                    Some(existing.clone())
                }
                _ => None,
            }
        };
        match flipped {
            Some(achievement) => {
                self.publish(StoreChange::Achievement(achievement));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn subscribe(&self, user_id: &str) -> ChangeFeed {
        ChangeFeed::new(user_id, self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Difficulty;
    use crate::progress::SessionCompletion;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn completion(user: &str, session_id: &str, accuracy: f32) -> SessionCompletion {
        SessionCompletion {
            user_id: user.to_string(),
            accent: "american".to_string(),
            session_id: session_id.to_string(),
            sentence_text: "Our team achieved excellent results this quarter.".to_string(),
            difficulty: Difficulty::Intermediate,
            accuracy,
            practice_seconds: 40.0,
            phonemes_practiced: BTreeSet::new(),
            mastered_phonemes: BTreeSet::new(),
            phoneme_feedback: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_upsert_merges_existing_row() {
        let store = InMemoryStore::new();
        store
            .upsert_progress(ProgressRecord::from_completion(&completion("u1", "a", 60.0), day(1), 1))
            .unwrap();
        let stored = store
            .upsert_progress(ProgressRecord::from_completion(&completion("u1", "b", 80.0), day(1), 1))
            .unwrap();

        assert_eq!(stored.sessions_completed, 2);
        assert!((stored.average_accuracy - 70.0).abs() < 1e-4);
        assert_eq!(store.progress_for_user("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_latest_progress_until() {
        let store = InMemoryStore::new();
        for (d, id) in [(1, "a"), (3, "b"), (7, "c")] {
            store
                .upsert_progress(ProgressRecord::from_completion(&completion("u1", id, 70.0), day(d), 1))
                .unwrap();
        }
        let latest = store
            .latest_progress_until("u1", "american", day(5))
            .unwrap()
            .unwrap();
        assert_eq!(latest.date, day(3));
        assert!(store
            .latest_progress_until("u1", "british", day(5))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_history_insert_is_idempotent() {
        let store = InMemoryStore::new();
        let row = PracticeSessionRecord::from(&completion("u1", "s1", 75.0));
        assert!(store.insert_practice_session(row.clone()).unwrap());
        assert!(!store.insert_practice_session(row).unwrap());
        assert_eq!(store.practice_sessions("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_mark_notified_flips_once() {
        let store = InMemoryStore::new();
        store
            .upsert_user_achievement(UserAchievement::earned("u1", "first_session", 1, Utc::now()))
            .unwrap();
        assert!(store.mark_notified("u1", "first_session").unwrap());
        assert!(!store.mark_notified("u1", "first_session").unwrap());
        assert!(!store.mark_notified("u1", "missing").unwrap());

        // A stale write cannot clear the flags
        let stored = store
            .upsert_user_achievement(UserAchievement::in_progress("u1", "first_session", 0))
            .unwrap();
        assert!(stored.is_earned);
        assert!(stored.notified);
    }

    #[test]
    fn test_in_progress_row_cannot_be_notified() {
        let store = InMemoryStore::new();
        store
            .upsert_user_achievement(UserAchievement::in_progress("u1", "dedicated_learner", 3))
            .unwrap();
        assert!(!store.mark_notified("u1", "dedicated_learner").unwrap());

        assert!(store
            .earn_achievement(UserAchievement::earned("u1", "dedicated_learner", 10, Utc::now()))
            .unwrap());
        let rows = store.user_achievements("u1").unwrap();
        assert!(rows[0].is_pending());
        assert!(store.mark_notified("u1", "dedicated_learner").unwrap());
    }

    #[test]
    fn test_earn_flips_once() {
        let store = InMemoryStore::new();
        let earned = UserAchievement::earned("u1", "first_session", 1, Utc::now());
        assert!(store.earn_achievement(earned.clone()).unwrap());
        assert!(!store.earn_achievement(earned).unwrap());
    }

    #[test]
    fn test_change_feed_filters_by_user() {
        let store = InMemoryStore::new();
        let mut feed = store.subscribe("u1");
        store
            .upsert_progress(ProgressRecord::from_completion(&completion("u2", "x", 50.0), day(1), 1))
            .unwrap();
        store
            .upsert_progress(ProgressRecord::from_completion(&completion("u1", "y", 90.0), day(1), 1))
            .unwrap();

        match feed.try_next() {
            Some(StoreChange::Progress(record)) => assert_eq!(record.user_id, "u1"),
            other => panic!("unexpected change: {:?}", other),
        }
        assert!(feed.try_next().is_none());

        feed.unsubscribe();
        store
            .upsert_progress(ProgressRecord::from_completion(&completion("u1", "z", 90.0), day(2), 1))
            .unwrap();
        assert!(feed.try_next().is_none());
    }

    #[test]
    fn test_snapshot_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = InMemoryStore::new();
        store
            .upsert_progress(ProgressRecord::from_completion(&completion("u1", "a", 88.0), day(4), 2))
            .unwrap();
        store
            .upsert_user_achievement(UserAchievement::in_progress("u1", "week_warrior", 2))
            .unwrap();
        store.save_snapshot(&path).unwrap();

        let restored = InMemoryStore::load_snapshot(&path).unwrap();
        assert_eq!(restored.snapshot().unwrap(), store.snapshot().unwrap());
    }

    #[test]
    fn test_load_missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = InMemoryStore::load_snapshot(dir.path().join("missing.json"));
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }
}
