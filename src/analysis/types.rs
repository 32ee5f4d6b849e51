// Analysis request and result types
//
// Results arrive as camelCase JSON from the analysis webhook and are
// validated before the rest of the crate sees them.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Requested feedback depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// One analysis submission
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Encoded WAV payload
    pub audio: Vec<u8>,
    pub target_sentence: String,
    pub accent: String,
    /// Defaults to `Intermediate`
    pub difficulty: Option<Difficulty>,
    /// Generated when absent
    pub session_id: Option<String>,
}

impl AnalysisRequest {
    pub fn new(
        audio: Vec<u8>,
        target_sentence: impl Into<String>,
        accent: impl Into<String>,
    ) -> Self {
        Self {
            audio,
            target_sentence: target_sentence.into(),
            accent: accent.into(),
            difficulty: None,
            session_id: None,
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordStatus {
    Excellent,
    Good,
    NeedsWork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Excellent,
    #[default]
    Good,
    Poor,
}

/// Accuracy for one phoneme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeScore {
    pub symbol: String,
    pub accuracy: f32,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordFeedback {
    pub word: String,
    #[serde(alias = "accuracy")]
    pub score: f32,
    pub status: WordStatus,
    #[serde(default)]
    pub phonemes: Vec<PhonemeScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedExercise {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: String,
}

/// Normalized analysis output, immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overall_accuracy: f32,
    #[serde(default)]
    pub word_feedback: Vec<WordFeedback>,
    #[serde(default)]
    pub phoneme_analysis: Vec<PhonemeScore>,
    #[serde(default)]
    pub improvement_tips: Vec<String>,
    #[serde(default)]
    pub recommended_exercises: Vec<RecommendedExercise>,
    #[serde(default)]
    pub audio_quality: AudioQuality,
    #[serde(default, alias = "processingTime")]
    pub processing_time_seconds: f64,
}

impl AnalysisResult {
    /// Reject scores outside 0..=100 and non-finite numbers
    pub fn validate(&self) -> Result<(), AnalysisError> {
        check_score("overallAccuracy", self.overall_accuracy)?;
        for word in &self.word_feedback {
            check_score("wordFeedback.score", word.score)?;
            for phoneme in &word.phonemes {
                check_score("wordFeedback.phonemes.accuracy", phoneme.accuracy)?;
            }
        }
        for phoneme in &self.phoneme_analysis {
            check_score("phonemeAnalysis.accuracy", phoneme.accuracy)?;
        }
        if !self.processing_time_seconds.is_finite() || self.processing_time_seconds < 0.0 {
            return Err(AnalysisError::InvalidResponse {
                reason: format!(
                    "processingTimeSeconds out of range: {}",
                    self.processing_time_seconds
                ),
            });
        }
        Ok(())
    }

    /// Every distinct phoneme symbol in the result, word breakdowns included
    pub fn phoneme_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .phoneme_analysis
            .iter()
            .chain(self.word_feedback.iter().flat_map(|w| w.phonemes.iter()))
            .map(|p| p.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Phoneme symbols scored at or above `threshold`
    pub fn mastered_symbols(&self, threshold: f32) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .phoneme_analysis
            .iter()
            .filter(|p| p.accuracy >= threshold)
            .map(|p| p.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

fn check_score(field: &str, value: f32) -> Result<(), AnalysisError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(AnalysisError::InvalidResponse {
            reason: format!("{} out of range: {}", field, value),
        })
    }
}
