// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::pipeline::{AchievementUnlocked, ProgressUpdated};

/// Manages the app-wide tokio broadcast channels
///
/// Session events are owned by each `PracticeSession`. This manager holds
/// the channels that outlive a single session:
/// - Progress: a user's daily record changed after an analysis
/// - Achievements: an achievement was unlocked and awaits acknowledgement
///
/// Channels must be initialized before anyone can subscribe. Publishing to
/// an uninitialized channel, or one with no subscribers, drops the message.
pub struct BroadcastChannelManager {
    progress: Arc<Mutex<Option<broadcast::Sender<ProgressUpdated>>>>,
    achievements: Arc<Mutex<Option<broadcast::Sender<AchievementUnlocked>>>>,
}

fn install<T: Clone>(slot: &Mutex<Option<broadcast::Sender<T>>>, capacity: usize) -> broadcast::Sender<T> {
    let (tx, _) = broadcast::channel(capacity);
    match slot.lock() {
        Ok(mut guard) => *guard = Some(tx.clone()),
        Err(_) => log::error!("[BroadcastChannelManager] Channel slot poisoned; sender not stored"),
    }
    tx
}

fn sender<T: Clone>(slot: &Mutex<Option<broadcast::Sender<T>>>) -> Option<broadcast::Sender<T>> {
    slot.lock().ok().and_then(|guard| guard.clone())
}

impl BroadcastChannelManager {
    /// Create a manager with all channels uninitialized
    pub fn new() -> Self {
        Self {
            progress: Arc::new(Mutex::new(None)),
            achievements: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // PROGRESS CHANNEL
    // ========================================================================

    /// Initialize the progress channel
    ///
    /// # Returns
    /// `broadcast::Sender<ProgressUpdated>` - Sender for the pipeline
    ///
    /// # Notes
    /// - Buffer size: 32 messages
    /// - Calling again replaces the stored channel; existing receivers stay on the old one
    pub fn init_progress(&self) -> broadcast::Sender<ProgressUpdated> {
        install(&self.progress, 32)
    }

    /// Subscribe to progress updates
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<ProgressUpdated>>` - Receiver or None if not initialized
    ///
    /// # Notes
    /// - Each subscriber gets an independent receiver
    /// - Slow subscribers lag and skip old messages
    pub fn subscribe_progress(&self) -> Option<broadcast::Receiver<ProgressUpdated>> {
        sender(&self.progress).map(|tx| tx.subscribe())
    }

    /// Publish a progress update. Dropped when uninitialized or unsubscribed.
    pub fn publish_progress(&self, update: ProgressUpdated) {
        if let Some(tx) = sender(&self.progress) {
            let _ = tx.send(update);
        }
    }

    // ========================================================================
    // ACHIEVEMENT CHANNEL
    // ========================================================================

    /// Initialize the achievement unlock channel.
    ///
    /// A single completion can unlock several achievements at once, so the
    /// buffer covers the whole catalog.
    pub fn init_achievements(&self) -> broadcast::Sender<AchievementUnlocked> {
        install(&self.achievements, 64)
    }

    /// Subscribe to achievement unlocks
    ///
    /// # Returns
    /// `Option<broadcast::Receiver<AchievementUnlocked>>` - Receiver or None if not initialized
    pub fn subscribe_achievements(&self) -> Option<broadcast::Receiver<AchievementUnlocked>> {
        sender(&self.achievements).map(|tx| tx.subscribe())
    }

    /// Publish an unlock. Dropped when uninitialized or unsubscribed.
    pub fn publish_achievement(&self, unlocked: AchievementUnlocked) {
        if let Some(tx) = sender(&self.achievements) {
            if tx.send(unlocked).is_err() {
                log::debug!("[BroadcastChannelManager] No achievement subscribers");
            }
        }
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::AchievementCatalog;

    fn unlocked(id: &str) -> AchievementUnlocked {
        AchievementUnlocked {
            user_id: "u1".to_string(),
            achievement: AchievementCatalog::default().get(id).cloned().unwrap(),
        }
    }

    #[test]
    fn test_progress_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();

        // Initially no subscription possible
        assert!(manager.subscribe_progress().is_none());

        let _tx = manager.init_progress();
        assert!(manager.subscribe_progress().is_some());
    }

    #[test]
    fn test_achievement_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        manager.init_achievements();

        let mut rx1 = manager.subscribe_achievements().unwrap();
        let mut rx2 = manager.subscribe_achievements().unwrap();

        manager.publish_achievement(unlocked("first_session"));

        assert_eq!(rx1.try_recv().unwrap().achievement.id, "first_session");
        assert_eq!(rx2.try_recv().unwrap().achievement.id, "first_session");
    }

    #[test]
    fn test_publish_before_init_is_dropped() {
        let manager = BroadcastChannelManager::default();
        manager.publish_achievement(unlocked("first_session"));

        manager.init_achievements();
        let mut rx = manager.subscribe_achievements().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
