// Managers Module
//
// Focused manager classes extracted from AppContext.
//
// - BroadcastChannelManager: progress and achievement broadcast channels

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;
