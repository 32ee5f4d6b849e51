// Analysis module - external pronunciation scoring
//
// Architecture:
// - types: request/result model and response validation
// - transport: AnalysisTransport seam and the reqwest webhook transport
// - progress: bounded, monotonic progress reporting
// - client: AnalysisClient (prepare -> execute)

mod client;
mod progress;
mod transport;
mod types;

pub use client::{AnalysisClient, PreparedAnalysis};
pub use progress::{ProgressReporter, IN_FLIGHT_CAP};
pub use transport::{AnalysisTransport, HttpTransport, TransportResponse, WebhookPayload};
pub use types::{
    AnalysisRequest, AnalysisResult, AudioQuality, Difficulty, PhonemeScore, RecommendedExercise,
    WordFeedback, WordStatus,
};
