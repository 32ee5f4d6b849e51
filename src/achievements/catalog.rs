// Achievement catalog - static definitions of every unlockable

use serde::{Deserialize, Serialize};

use crate::progress::ProgressSummary;

/// What must be true for an achievement to unlock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Requirement {
    /// Total completed sessions
    SessionCount(u32),
    /// Best single-session accuracy
    Accuracy(u32),
    /// Live or historical daily streak
    Streak(u32),
    DistinctAccents(u32),
    MasteredPhonemes(u32),
    PracticeMinutes(u32),
}

impl Requirement {
    pub fn target(&self) -> u32 {
        match *self {
            Requirement::SessionCount(n)
            | Requirement::Accuracy(n)
            | Requirement::Streak(n)
            | Requirement::DistinctAccents(n)
            | Requirement::MasteredPhonemes(n)
            | Requirement::PracticeMinutes(n) => n,
        }
    }

    /// The summary's value for this requirement's metric
    pub fn current_value(&self, summary: &ProgressSummary) -> u32 {
        match self {
            Requirement::SessionCount(_) => summary.total_sessions,
            Requirement::Accuracy(_) => summary.best_accuracy.floor() as u32,
            Requirement::Streak(_) => summary.current_streak.max(summary.longest_streak),
            Requirement::DistinctAccents(_) => summary.distinct_accents,
            Requirement::MasteredPhonemes(_) => summary.mastered_phonemes,
            Requirement::PracticeMinutes(_) => summary.total_practice_minutes,
        }
    }

    pub fn is_met(&self, summary: &ProgressSummary) -> bool {
        self.current_value(summary) >= self.target()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub requirement: Requirement,
    pub points: u32,
    pub rarity: Rarity,
}

impl Achievement {
    pub fn new(
        id: &str,
        display_name: &str,
        description: &str,
        category: &str,
        requirement: Requirement,
        points: u32,
        rarity: Rarity,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            requirement,
            points,
            rarity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementCatalog {
    pub entries: Vec<Achievement>,
}

impl AchievementCatalog {
    pub fn new(entries: Vec<Achievement>) -> Self {
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&Achievement> {
        self.entries.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Achievement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for AchievementCatalog {
    fn default() -> Self {
        use Rarity::*;
        use Requirement::*;
        Self::new(vec![
            Achievement::new("first_session", "First Steps", "Complete your first practice session", "milestone", SessionCount(1), 10, Common),
            Achievement::new("dedicated_learner", "Dedicated Learner", "Complete 10 practice sessions", "milestone", SessionCount(10), 50, Common),
            Achievement::new("practice_pro", "Practice Pro", "Complete 50 practice sessions", "milestone", SessionCount(50), 200, Rare),
            Achievement::new("accuracy_expert", "Accuracy Expert", "Score 90% or higher in a session", "accuracy", Accuracy(90), 100, Rare),
            Achievement::new("perfectionist", "Perfectionist", "Score 98% or higher in a session", "accuracy", Accuracy(98), 250, Epic),
            Achievement::new("week_warrior", "Week Warrior", "Practice 7 days in a row", "streak", Streak(7), 150, Rare),
            Achievement::new("month_master", "Month Master", "Practice 30 days in a row", "streak", Streak(30), 500, Legendary),
            Achievement::new("accent_explorer", "Accent Explorer", "Practice 3 different accents", "exploration", DistinctAccents(3), 100, Rare),
            Achievement::new("sound_master", "Sound Master", "Master 10 phonemes", "mastery", MasteredPhonemes(10), 200, Epic),
            Achievement::new("hour_of_practice", "Hour of Practice", "Practice for 60 minutes in total", "milestone", PracticeMinutes(60), 100, Common),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_ids_unique() {
        let catalog = AchievementCatalog::default();
        let mut ids: Vec<&str> = catalog.iter().map(|a| a.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), catalog.len());
        assert!(catalog.get("first_session").is_some());
    }

    #[test]
    fn test_requirement_metrics() {
        let summary = ProgressSummary {
            total_sessions: 10,
            best_accuracy: 91.5,
            current_streak: 2,
            longest_streak: 7,
            ..ProgressSummary::default()
        };
        assert!(Requirement::SessionCount(10).is_met(&summary));
        assert!(Requirement::Accuracy(90).is_met(&summary));
        assert!(!Requirement::Accuracy(92).is_met(&summary));
        assert!(Requirement::Streak(7).is_met(&summary));
        assert!(!Requirement::DistinctAccents(1).is_met(&summary));
    }

    #[test]
    fn test_requirement_serde_shape() {
        let json = serde_json::to_string(&Requirement::Streak(7)).unwrap();
        assert_eq!(json, r#"{"type":"streak","value":7}"#);
    }
}
