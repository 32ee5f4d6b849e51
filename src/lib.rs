// Accent Mastery practice core
// Record a sentence, have it scored, track progress and achievements

pub mod achievements;
pub mod analysis;
pub mod auth;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod managers;
pub mod pipeline;
pub mod progress;
pub mod recording;
pub mod session;
pub mod store;

pub use context::AppContext;

/// Install a `tracing_subscriber::fmt` subscriber that also receives `log`
/// records. Calling it again is a no-op.
pub fn init_logging() {
    if tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .is_ok()
    {
        log::info!("[accent_mastery] Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
