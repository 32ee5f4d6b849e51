//! AnalysisClient: submits captured audio for pronunciation scoring.
//!
//! Analysis is split in two phases:
//! - `prepare` validates the request and checks tier access synchronously,
//!   so rejected requests never reach the transport.
//! - `execute` performs the single network call while reporting progress.
//!
//! Failures are terminal for the call. Nothing here retries.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use chrono::Utc;
use serde::Deserialize;
use tokio::time::{interval_at, Instant};

use super::progress::ProgressReporter;
use super::transport::{AnalysisTransport, HttpTransport, TransportResponse, WebhookPayload};
use super::types::{AnalysisRequest, AnalysisResult, Difficulty};
use crate::auth::{CurrentUser, Feature, SubscriptionTier};
use crate::config::AnalysisConfig;
use crate::error::{log_analysis_error, AnalysisError};

/// A validated request, ready for exactly one transport call
#[derive(Debug, Clone)]
pub struct PreparedAnalysis {
    payload: WebhookPayload,
    difficulty: Difficulty,
    tier: SubscriptionTier,
}

impl PreparedAnalysis {
    pub fn session_id(&self) -> &str {
        &self.payload.session_id
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn payload(&self) -> &WebhookPayload {
        &self.payload
    }
}

/// `{success, data, error, upgradeRequired}` wrapper some deployments return
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<AnalysisResult>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    upgrade_required: bool,
}

pub struct AnalysisClient {
    transport: Arc<dyn AnalysisTransport>,
    progress_interval: Duration,
    default_difficulty: Difficulty,
}

impl AnalysisClient {
    pub fn new(transport: Arc<dyn AnalysisTransport>, config: &AnalysisConfig) -> Self {
        Self {
            transport,
            progress_interval: Duration::from_millis(config.progress_interval_ms.max(1)),
            default_difficulty: config.default_difficulty,
        }
    }

    /// Client posting to the configured webhook over HTTP
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(Arc::new(HttpTransport::from_config(config)), config)
    }

    /// Validate `request` for `user` without touching the network
    pub fn prepare(
        &self,
        request: &AnalysisRequest,
        user: Option<&CurrentUser>,
    ) -> Result<PreparedAnalysis, AnalysisError> {
        let user = user.ok_or(AnalysisError::NotAuthenticated)?;

        if request.audio.is_empty() {
            return Err(AnalysisError::InvalidInput { field: "audio" });
        }
        if request.target_sentence.trim().is_empty() {
            return Err(AnalysisError::InvalidInput {
                field: "target_sentence",
            });
        }
        if request.accent.trim().is_empty() {
            return Err(AnalysisError::InvalidInput { field: "accent" });
        }

        let difficulty = request.difficulty.unwrap_or(self.default_difficulty);
        let advanced = difficulty == Difficulty::Advanced;
        if advanced && !user.tier.allows(Feature::AdvancedFeedback) {
            return Err(AnalysisError::UpgradeRequired { tier: user.tier });
        }

        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| generate_session_id(&user.id));

        Ok(PreparedAnalysis {
            payload: WebhookPayload {
                audio_base64: base64::engine::general_purpose::STANDARD.encode(&request.audio),
                target_sentence: request.target_sentence.clone(),
                accent_type: request.accent.clone(),
                difficulty: difficulty.as_str().to_string(),
                session_id,
                user_id: user.id.clone(),
                user_tier: user.tier,
                analysis_type: if advanced { "advanced" } else { "standard" }.to_string(),
                timestamp: Utc::now().to_rfc3339(),
            },
            difficulty,
            tier: user.tier,
        })
    }

    /// Perform the transport call, reporting progress through `on_progress`
    pub async fn execute(
        &self,
        prepared: PreparedAnalysis,
        on_progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut reporter = ProgressReporter::new(on_progress);
        reporter.begin();

        let session_id = prepared.payload.session_id.clone();
        let tier = prepared.tier;
        log::info!(
            "[AnalysisClient] Submitting {} ({} analysis)",
            session_id,
            prepared.payload.analysis_type
        );

        let mut call = self.transport.send(prepared.payload);
        let mut ticker = interval_at(
            Instant::now() + self.progress_interval,
            self.progress_interval,
        );
        let outcome = loop {
            tokio::select! {
                response = &mut call => break response,
                _ = ticker.tick() => reporter.advance(),
            }
        };
        reporter.complete();

        let result = outcome.and_then(|response| interpret_response(response, tier));
        match &result {
            Ok(analysis) => log::info!(
                "[AnalysisClient] {} scored {:.1}",
                session_id,
                analysis.overall_accuracy
            ),
            Err(err) => log_analysis_error(err, "execute"),
        }
        result
    }

    /// Validate, gate and send one analysis request
    ///
    /// Runs `prepare` then `execute`.
    ///
    /// # Returns
    /// The normalized `AnalysisResult`.
    ///
    /// # Errors
    /// - `NotAuthenticated` without a user
    /// - `InvalidInput` for empty audio or a blank sentence or accent
    /// - `UpgradeRequired` for advanced difficulty without the tier feature
    /// - `ServiceUnavailable` for transport errors, non-2xx and failed envelopes
    /// - `InvalidResponse` for malformed or out-of-range replies
    ///
    /// # Notes
    /// - `on_progress` sees 0, then ticks capped at 90, then exactly one 100
    /// - Pre-validation failures make no transport call and report no progress
    /// - Never retries
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        user: Option<&CurrentUser>,
        on_progress: &mut (dyn FnMut(u8) + Send),
    ) -> Result<AnalysisResult, AnalysisError> {
        let prepared = self.prepare(request, user).map_err(|err| {
            log_analysis_error(&err, "prepare");
            err
        })?;
        self.execute(prepared, on_progress).await
    }
}

fn generate_session_id(user_id: &str) -> String {
    format!(
        "session_{}_{}_{:08x}",
        Utc::now().timestamp_millis(),
        user_id,
        rand::random::<u32>()
    )
}

/// Turn a webhook reply into a validated result
fn interpret_response(
    response: TransportResponse,
    tier: SubscriptionTier,
) -> Result<AnalysisResult, AnalysisError> {
    let parsed: Result<serde_json::Value, _> = serde_json::from_slice(&response.body);

    if !response.is_success() {
        let envelope = parsed
            .ok()
            .and_then(|value| serde_json::from_value::<ResponseEnvelope>(value).ok());
        if envelope.as_ref().is_some_and(|e| e.upgrade_required) {
            return Err(AnalysisError::UpgradeRequired { tier });
        }
        return Err(AnalysisError::ServiceUnavailable {
            status: Some(response.status),
            reason: envelope
                .and_then(|e| e.error)
                .unwrap_or_else(|| format!("HTTP error! status: {}", response.status)),
        });
    }

    let value = parsed?;
    let result = if value.get("success").is_some() {
        let envelope: ResponseEnvelope = serde_json::from_value(value)?;
        if !envelope.success {
            if envelope.upgrade_required {
                return Err(AnalysisError::UpgradeRequired { tier });
            }
            return Err(AnalysisError::ServiceUnavailable {
                status: Some(response.status),
                reason: envelope
                    .error
                    .unwrap_or_else(|| "Speech analysis failed".to_string()),
            });
        }
        envelope.data.ok_or_else(|| AnalysisError::InvalidResponse {
            reason: "envelope missing data".to_string(),
        })?
    } else {
        serde_json::from_value::<AnalysisResult>(value)?
    };

    result.validate()?;
    Ok(result)
}
