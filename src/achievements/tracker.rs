//! AchievementTracker: persists unlocks and drives the notification queue.
//!
//! Unlocks are written with `is_earned = true, notified = false`. The UI
//! pulls them one at a time through `next_pending` and confirms each with
//! `acknowledge`, which persists `notified = true` before returning so the
//! next evaluation cannot re-announce it.

use std::sync::Arc;

use super::catalog::{Achievement, AchievementCatalog};
use super::evaluator::evaluate;
use super::user_achievement::UserAchievement;
use crate::error::{log_store_error, StoreError};
use crate::progress::{Clock, ProgressSummary};
use crate::store::PracticeStore;

/// An earned achievement waiting to be shown
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAchievement {
    pub achievement: Achievement,
    pub record: UserAchievement,
}

pub struct AchievementTracker {
    store: Arc<dyn PracticeStore>,
    catalog: Arc<AchievementCatalog>,
    clock: Arc<dyn Clock>,
    weekly_goal: u32,
}

impl AchievementTracker {
    pub fn new(
        store: Arc<dyn PracticeStore>,
        catalog: Arc<AchievementCatalog>,
        clock: Arc<dyn Clock>,
        weekly_goal: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            weekly_goal,
        }
    }

    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    /// Dashboard summary from the user's stored progress
    pub fn summary_for(&self, user_id: &str) -> Result<ProgressSummary, StoreError> {
        let records = self.store.progress_for_user(user_id)?;
        Ok(ProgressSummary::from_records(
            &records,
            self.clock.today(),
            self.weekly_goal,
        ))
    }

    /// Evaluate the catalog for `user_id` and persist the outcome.
    ///
    /// Returns only the achievements unlocked by this call.
    pub fn evaluate_for(&self, user_id: &str) -> Result<Vec<Achievement>, StoreError> {
        let summary = self.summary_for(user_id)?;
        let existing = self.store.user_achievements(user_id)?;
        let evaluation = evaluate(&self.catalog, &summary, &existing);

        let now = self.clock.now();
        let mut unlocked = Vec::with_capacity(evaluation.newly_earned.len());
        for achievement in evaluation.newly_earned {
            let value = achievement.requirement.target();
            let flipped = self
                .store
                .earn_achievement(UserAchievement::earned(
                    user_id,
                    &achievement.id,
                    value,
                    now,
                ))
                .map_err(|err| {
                    log_store_error(&err, "evaluate_for");
                    err
                })?;
            if !flipped {
                // Another evaluation stored this unlock first
                continue;
            }
            log::info!(
                "[AchievementTracker] {} unlocked {} ({} pts)",
                user_id,
                achievement.id,
                achievement.points
            );
            unlocked.push(achievement);
        }

        for (achievement_id, value) in evaluation.progress_updates {
            self.store
                .upsert_user_achievement(UserAchievement::in_progress(
                    user_id,
                    &achievement_id,
                    value,
                ))?;
        }
        Ok(unlocked)
    }

    /// Earned, unacknowledged achievements, oldest unlock first
    pub fn pending(&self, user_id: &str) -> Result<Vec<PendingAchievement>, StoreError> {
        let mut pending: Vec<PendingAchievement> = self
            .store
            .user_achievements(user_id)?
            .into_iter()
            .filter(UserAchievement::is_pending)
            .filter_map(|record| {
                self.catalog
                    .get(&record.achievement_id)
                    .cloned()
                    .map(|achievement| PendingAchievement {
                        achievement,
                        record,
                    })
            })
            .collect();
        pending.sort_by(|a, b| {
            a.record
                .earned_at
                .cmp(&b.record.earned_at)
                .then_with(|| a.record.achievement_id.cmp(&b.record.achievement_id))
        });
        Ok(pending)
    }

    pub fn next_pending(&self, user_id: &str) -> Result<Option<PendingAchievement>, StoreError> {
        Ok(self.pending(user_id)?.into_iter().next())
    }

    /// Mark an unlock as shown. True only for the call that flipped it.
    pub fn acknowledge(&self, user_id: &str, achievement_id: &str) -> Result<bool, StoreError> {
        let flipped = self.store.mark_notified(user_id, achievement_id)?;
        if flipped {
            log::debug!(
                "[AchievementTracker] {} acknowledged {}",
                user_id,
                achievement_id
            );
        }
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Difficulty;
    use crate::progress::{FixedClock, ProgressAggregator, SessionCompletion};
    use crate::progress::{PracticeSessionRecord, ProgressKey, ProgressRecord};
    use crate::store::{ChangeFeed, InMemoryStore};
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeSet;
    use std::thread;
    use std::time::Duration;

    /// Store whose achievement reads are slow enough for two evaluations
    /// to overlap
    struct SlowReads {
        inner: InMemoryStore,
    }

    impl PracticeStore for SlowReads {
        fn upsert_progress(&self, record: ProgressRecord) -> Result<ProgressRecord, StoreError> {
            self.inner.upsert_progress(record)
        }

        fn progress(&self, key: &ProgressKey) -> Result<Option<ProgressRecord>, StoreError> {
            self.inner.progress(key)
        }

        fn progress_for_user(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
            self.inner.progress_for_user(user_id)
        }

        fn latest_progress_until(
            &self,
            user_id: &str,
            accent: &str,
            date: NaiveDate,
        ) -> Result<Option<ProgressRecord>, StoreError> {
            self.inner.latest_progress_until(user_id, accent, date)
        }

        fn insert_practice_session(
            &self,
            record: PracticeSessionRecord,
        ) -> Result<bool, StoreError> {
            self.inner.insert_practice_session(record)
        }

        fn practice_sessions(
            &self,
            user_id: &str,
        ) -> Result<Vec<PracticeSessionRecord>, StoreError> {
            self.inner.practice_sessions(user_id)
        }

        fn user_achievements(&self, user_id: &str) -> Result<Vec<UserAchievement>, StoreError> {
            let rows = self.inner.user_achievements(user_id);
            thread::sleep(Duration::from_millis(50));
            rows
        }

        fn upsert_user_achievement(
            &self,
            achievement: UserAchievement,
        ) -> Result<UserAchievement, StoreError> {
            self.inner.upsert_user_achievement(achievement)
        }

        fn earn_achievement(&self, achievement: UserAchievement) -> Result<bool, StoreError> {
            self.inner.earn_achievement(achievement)
        }

        fn mark_notified(&self, user_id: &str, achievement_id: &str) -> Result<bool, StoreError> {
            self.inner.mark_notified(user_id, achievement_id)
        }

        fn subscribe(&self, user_id: &str) -> ChangeFeed {
            self.inner.subscribe(user_id)
        }
    }

    struct Fixture {
        aggregator: ProgressAggregator,
        tracker: AchievementTracker,
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemoryStore::new()))
    }

    fn fixture_with(store: Arc<dyn PracticeStore>) -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_date(
            NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
        ));
        Fixture {
            aggregator: ProgressAggregator::new(store.clone(), clock.clone()),
            tracker: AchievementTracker::new(
                store,
                Arc::new(AchievementCatalog::default()),
                clock,
                5,
            ),
        }
    }

    fn complete(fixture: &Fixture, session_id: &str, accuracy: f32) {
        fixture
            .aggregator
            .record_completion(&SessionCompletion {
                user_id: "u1".to_string(),
                accent: "american".to_string(),
                session_id: session_id.to_string(),
                sentence_text: "The meeting will start at three thirty.".to_string(),
                difficulty: Difficulty::Intermediate,
                accuracy,
                practice_seconds: 30.0,
                phonemes_practiced: BTreeSet::new(),
                mastered_phonemes: BTreeSet::new(),
                phoneme_feedback: Vec::new(),
                completed_at: Utc::now(),
            })
            .unwrap();
    }

    #[test]
    fn test_unlock_then_acknowledge_once() {
        let fixture = fixture();
        complete(&fixture, "s1", 82.0);

        let unlocked = fixture.tracker.evaluate_for("u1").unwrap();
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, "first_session");

        let pending = fixture.tracker.next_pending("u1").unwrap().unwrap();
        assert_eq!(pending.achievement.id, "first_session");
        assert!(!pending.record.notified);

        assert!(fixture.tracker.acknowledge("u1", "first_session").unwrap());
        assert!(!fixture.tracker.acknowledge("u1", "first_session").unwrap());
        assert!(fixture.tracker.next_pending("u1").unwrap().is_none());

        // Re-evaluating the same state announces nothing
        assert!(fixture.tracker.evaluate_for("u1").unwrap().is_empty());
        assert!(fixture.tracker.pending("u1").unwrap().is_empty());
    }

    #[test]
    fn test_repeat_evaluation_without_ack_does_not_duplicate() {
        let fixture = fixture();
        complete(&fixture, "s1", 95.0);

        let first = fixture.tracker.evaluate_for("u1").unwrap();
        assert!(first.iter().any(|a| a.id == "accuracy_expert"));
        assert!(fixture.tracker.evaluate_for("u1").unwrap().is_empty());

        let pending = fixture.tracker.pending("u1").unwrap();
        assert_eq!(pending.len(), first.len());
    }

    #[test]
    fn test_acknowledge_before_earning_is_ignored() {
        let fixture = fixture();
        complete(&fixture, "s1", 70.0);
        fixture.tracker.evaluate_for("u1").unwrap();

        // dedicated_learner exists as an in-progress row at this point
        assert!(!fixture.tracker.acknowledge("u1", "dedicated_learner").unwrap());

        for n in 2..=10 {
            complete(&fixture, &format!("s{}", n), 70.0);
        }
        let unlocked = fixture.tracker.evaluate_for("u1").unwrap();
        assert!(unlocked.iter().any(|a| a.id == "dedicated_learner"));

        let pending: Vec<String> = fixture
            .tracker
            .pending("u1")
            .unwrap()
            .into_iter()
            .map(|p| p.achievement.id)
            .collect();
        assert!(pending.contains(&"dedicated_learner".to_string()));
        assert!(fixture.tracker.acknowledge("u1", "dedicated_learner").unwrap());
    }

    #[test]
    fn test_concurrent_evaluations_report_unlock_once() {
        let fixture = fixture_with(Arc::new(SlowReads {
            inner: InMemoryStore::new(),
        }));
        complete(&fixture, "s1", 70.0);

        let tracker = Arc::new(fixture.tracker);
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || tracker.evaluate_for("u1").unwrap())
            })
            .collect();
        let reported: Vec<String> = workers
            .into_iter()
            .flat_map(|worker| worker.join().unwrap())
            .map(|a| a.id)
            .collect();

        assert_eq!(reported, vec!["first_session".to_string()]);
        assert_eq!(tracker.pending("u1").unwrap().len(), 1);
    }
}
