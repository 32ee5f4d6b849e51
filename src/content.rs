// Static practice content
//
// Sentences are immutable for the lifetime of a session.

use serde::{Deserialize, Serialize};

use crate::analysis::Difficulty;

/// One target sentence with its transcription and coaching tip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSentence {
    pub text: String,
    pub phonetic: String,
    pub target_sounds: Vec<String>,
    pub tips: String,
}

impl PracticeSentence {
    pub fn new(
        text: impl Into<String>,
        phonetic: impl Into<String>,
        target_sounds: &[&str],
        tips: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            phonetic: phonetic.into(),
            target_sounds: target_sounds.iter().map(|s| s.to_string()).collect(),
            tips: tips.into(),
        }
    }
}

/// An ordered set of sentences practiced in one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeSet {
    pub title: String,
    pub difficulty: Difficulty,
    pub sentences: Vec<PracticeSentence>,
}

impl PracticeSet {
    /// Built-in business English vowel set
    pub fn vowel_sounds() -> Self {
        Self {
            title: "Business English - Vowel Sounds".to_string(),
            difficulty: Difficulty::Intermediate,
            sentences: vec![
                PracticeSentence::new(
                    "The meeting will start at three thirty.",
                    "/ðə ˈmiːtɪŋ wɪl stɑːrt æt θriː ˈθɜːrti/",
                    &["/iː/", "/ɑː/", "/θ/"],
                    "Focus on the long 'ee' sound in 'meeting' and the 'ar' sound in 'start'. The 'th' in 'three' should be voiceless.",
                ),
                PracticeSentence::new(
                    "Please review the quarterly report carefully.",
                    "/pliːz rɪˈvjuː ðə ˈkwɔːrtərli rɪˈpɔːrt ˈkɛrfəli/",
                    &["/iː/", "/uː/", "/ɔː/"],
                    "Pay attention to the 'oo' sound in 'review' and the 'or' sound in 'quarterly'. Make sure 'carefully' ends with a clear 'lee' sound.",
                ),
                PracticeSentence::new(
                    "Our team achieved excellent results this quarter.",
                    "/aʊər tiːm əˈtʃiːvd ˈɛksələnt rɪˈzʌlts ðɪs ˈkwɔːrtər/",
                    &["/aʊ/", "/iː/", "/ʌ/"],
                    "Focus on the 'ow' sound in 'our' and the short 'u' sound in 'results'. 'Achieved' should have a clear 'ee' sound.",
                ),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}
