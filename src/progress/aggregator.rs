// ProgressAggregator - folds session completions into the store

use std::sync::Arc;

use super::clock::Clock;
use super::record::{PracticeSessionRecord, ProgressRecord, SessionCompletion};
use super::streak::{compute_streak, StreakAnchor};
use crate::error::{log_store_error, StoreError};
use crate::store::PracticeStore;

pub struct ProgressAggregator {
    store: Arc<dyn PracticeStore>,
    clock: Arc<dyn Clock>,
}

impl ProgressAggregator {
    pub fn new(store: Arc<dyn PracticeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record one completed session and return the merged daily row.
    ///
    /// Safe to call more than once for the same completion: the row merge
    /// and the history insert are both keyed by session id.
    pub fn record_completion(
        &self,
        completion: &SessionCompletion,
    ) -> Result<ProgressRecord, StoreError> {
        let today = self.clock.today();

        let anchor = self
            .store
            .latest_progress_until(&completion.user_id, &completion.accent, today)?
            .map(|record| StreakAnchor {
                date: record.date,
                streak_count: record.streak_count,
                active: record.is_streak_active,
            });
        let streak = compute_streak(today, anchor);

        let record = ProgressRecord::from_completion(completion, today, streak);
        let stored = self.store.upsert_progress(record).map_err(|err| {
            log_store_error(&err, "record_completion");
            err
        })?;

        if !self
            .store
            .insert_practice_session(PracticeSessionRecord::from(completion))?
        {
            log::debug!(
                "[ProgressAggregator] History row for {} already present",
                completion.session_id
            );
        }

        log::info!(
            "[ProgressAggregator] {} / {} on {}: {} sessions, avg {:.1}, streak {}",
            completion.user_id,
            completion.accent,
            today,
            stored.sessions_completed,
            stored.average_accuracy,
            stored.streak_count
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Difficulty;
    use crate::progress::FixedClock;
    use crate::store::InMemoryStore;
    use chrono::{NaiveDate, Utc};
    use std::collections::BTreeSet;

    fn completion(session_id: &str, accuracy: f32, mastered: &[&str]) -> SessionCompletion {
        SessionCompletion {
            user_id: "u1".to_string(),
            accent: "american".to_string(),
            session_id: session_id.to_string(),
            sentence_text: "The meeting will start at three thirty.".to_string(),
            difficulty: Difficulty::Intermediate,
            accuracy,
            practice_seconds: 35.0,
            phonemes_practiced: ["/iː/", "/θ/"].iter().map(|s| s.to_string()).collect(),
            mastered_phonemes: mastered.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            phoneme_feedback: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    fn setup() -> (Arc<InMemoryStore>, Arc<FixedClock>, ProgressAggregator) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::at_date(
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        ));
        let aggregator = ProgressAggregator::new(store.clone(), clock.clone());
        (store, clock, aggregator)
    }

    #[test]
    fn test_same_day_sessions_fold_into_one_row() {
        let (store, _clock, aggregator) = setup();
        aggregator.record_completion(&completion("a", 70.0, &[])).unwrap();
        let row = aggregator
            .record_completion(&completion("b", 82.0, &["/iː/"]))
            .unwrap();

        assert_eq!(row.sessions_completed, 2);
        assert!((row.average_accuracy - 76.0).abs() < 1e-4);
        assert_eq!(row.streak_count, 1);
        assert!(row.mastered_phonemes.contains("/iː/"));
        assert_eq!(store.practice_sessions("u1").unwrap().len(), 2);
    }

    #[test]
    fn test_consecutive_days_extend_streak() {
        let (_store, clock, aggregator) = setup();
        aggregator.record_completion(&completion("d1", 70.0, &[])).unwrap();
        clock.advance_days(1);
        let row = aggregator.record_completion(&completion("d2", 70.0, &[])).unwrap();
        assert_eq!(row.streak_count, 2);

        clock.advance_days(3);
        let row = aggregator.record_completion(&completion("d5", 70.0, &[])).unwrap();
        assert_eq!(row.streak_count, 1);
    }

    #[test]
    fn test_duplicate_delivery_is_harmless() {
        let (store, _clock, aggregator) = setup();
        let c = completion("dup", 90.0, &[]);
        aggregator.record_completion(&c).unwrap();
        let row = aggregator.record_completion(&c).unwrap();

        assert_eq!(row.sessions_completed, 1);
        assert_eq!(store.practice_sessions("u1").unwrap().len(), 1);
    }
}
