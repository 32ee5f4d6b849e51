// Daily practice streaks

use chrono::NaiveDate;

/// The most recent known streak state for a (user, accent)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakAnchor {
    pub date: NaiveDate,
    pub streak_count: u32,
    pub active: bool,
}

/// Streak count for a practice on `today`
///
/// - same day as the anchor: unchanged
/// - anchor was yesterday and still active: extended by one
/// - anything else (gap, no history, clock skew): restarts at 1
pub fn compute_streak(today: NaiveDate, anchor: Option<StreakAnchor>) -> u32 {
    let Some(anchor) = anchor else {
        return 1;
    };
    if anchor.date == today {
        return anchor.streak_count.max(1);
    }
    match today.pred_opt() {
        Some(yesterday) if anchor.date == yesterday && anchor.active => anchor.streak_count + 1,
        _ => 1,
    }
}

/// Whether a streak last extended on `last_date` is still live on `today`
pub fn is_streak_live(last_date: NaiveDate, today: NaiveDate) -> bool {
    last_date == today || today.pred_opt() == Some(last_date)
}
