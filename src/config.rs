//! Configuration management for the practice core
//!
//! Runtime configuration is loaded from a JSON file so timer limits,
//! the analysis endpoint and progress thresholds can be tuned without
//! recompilation. Missing or invalid files fall back to defaults.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::analysis::Difficulty;

/// Env var carrying the analysis webhook URL
pub const ENV_ANALYSIS_WEBHOOK_URL: &str = "MAKE_SPEECH_ANALYSIS_WEBHOOK_URL";
/// Env var carrying the analysis webhook bearer token
pub const ENV_ANALYSIS_API_KEY: &str = "MAKE_API_KEY";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Recording controller parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Auto-stop limit in seconds
    pub max_duration_secs: u32,
    /// Elapsed-time tick period
    pub tick_interval_ms: u64,
    /// Level metering tick period
    pub level_interval_ms: u64,
    /// Capture sample rate requested from the input
    pub sample_rate: u32,
    /// FFT window used for level metering
    pub level_window: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 30,
            tick_interval_ms: 1000,
            level_interval_ms: 100,
            sample_rate: 16_000,
            level_window: 256,
        }
    }
}

/// Analysis client parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// POST target for speech analysis
    pub endpoint_url: String,
    /// Bearer token sent to the endpoint
    #[serde(default)]
    pub api_key: Option<String>,
    /// Whole-request timeout
    pub timeout_secs: u64,
    /// Period of in-flight progress updates
    pub progress_interval_ms: u64,
    /// Difficulty used when the caller omits one
    #[serde(default)]
    pub default_difficulty: Difficulty,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:3000/api/process-speech".to_string(),
            api_key: None,
            timeout_secs: 60,
            progress_interval_ms: 500,
            default_difficulty: Difficulty::Intermediate,
        }
    }
}

/// Progress aggregation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Phoneme accuracy at or above which a sound counts as mastered
    pub mastery_threshold: f32,
    /// Sessions per week shown as the dashboard goal
    pub weekly_goal: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: 90.0,
            weekly_goal: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, reporting failures
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    ///
    /// Falls back to defaults (with a warning) when the file is missing or
    /// invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_file(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!("[Config] {:#}. Using defaults.", err);
                Self::default()
            }
        }
    }

    /// Load the bundled config file and apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::load_from_file("assets/practice_config.json");
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Override endpoint settings from the environment
    ///
    /// `lookup` is injected so tests don't touch process-wide env state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_ANALYSIS_WEBHOOK_URL).filter(|v| !v.trim().is_empty()) {
            self.analysis.endpoint_url = url;
        }
        if let Some(key) = lookup(ENV_ANALYSIS_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.analysis.api_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.recording.max_duration_secs, 30);
        assert_eq!(config.recording.tick_interval_ms, 1000);
        assert_eq!(config.recording.level_interval_ms, 100);
        assert_eq!(config.analysis.default_difficulty, Difficulty::Intermediate);
        assert_eq!(config.progress.mastery_threshold, 90.0);
        assert_eq!(config.progress.weekly_goal, 5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            parsed.recording.max_duration_secs,
            config.recording.max_duration_secs
        );
        assert_eq!(parsed.analysis.endpoint_url, config.analysis.endpoint_url);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"recording": {{"max_duration_secs": 10, "tick_interval_ms": 1000, "level_interval_ms": 100, "sample_rate": 8000, "level_window": 128}}}}"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path());
        assert_eq!(config.recording.max_duration_secs, 10);
        assert_eq!(config.recording.sample_rate, 8000);
        assert_eq!(config.progress.weekly_goal, 5);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/practice_config.json");
        assert_eq!(config.recording.max_duration_secs, 30);
        assert!(AppConfig::try_load_from_file("/nonexistent/practice_config.json").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            ENV_ANALYSIS_WEBHOOK_URL => Some("https://hook.example/analyze".to_string()),
            ENV_ANALYSIS_API_KEY => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(config.analysis.endpoint_url, "https://hook.example/analyze");
        assert_eq!(config.analysis.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(
            config.analysis.endpoint_url,
            AnalysisConfig::default().endpoint_url
        );
        assert!(config.analysis.api_key.is_none());
    }
}
