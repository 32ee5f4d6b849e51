// Progress module - daily aggregates, streaks and the dashboard summary
//
// record: ProgressRecord and its commutative merge
// streak: pure streak arithmetic
// clock: injectable "today"
// aggregator: completion -> store upsert + history row
// summary: dashboard totals across rows

mod aggregator;
mod clock;
mod record;
mod streak;
mod summary;

pub use aggregator::ProgressAggregator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use record::{
    PracticeSessionRecord, ProgressKey, ProgressRecord, SessionCompletion, SessionContribution,
};
pub use streak::{compute_streak, is_streak_live, StreakAnchor};
pub use summary::ProgressSummary;
