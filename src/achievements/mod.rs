// Achievements module - catalog, pure evaluation and the unlock queue

mod catalog;
mod evaluator;
mod tracker;
mod user_achievement;

pub use catalog::{Achievement, AchievementCatalog, Rarity, Requirement};
pub use evaluator::{evaluate, Evaluation};
pub use tracker::{AchievementTracker, PendingAchievement};
pub use user_achievement::UserAchievement;
