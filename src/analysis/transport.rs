// Analysis transport: the seam between the client and the webhook
//
// HttpTransport posts the JSON payload with reqwest. Tests substitute their
// own AnalysisTransport to count calls or inject latency.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::auth::SubscriptionTier;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;

/// JSON body posted to the analysis webhook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub audio_base64: String,
    pub target_sentence: String,
    pub accent_type: String,
    pub difficulty: String,
    pub session_id: String,
    pub user_id: String,
    pub user_tier: SubscriptionTier,
    /// `advanced` or `standard`
    pub analysis_type: String,
    /// RFC 3339 submission time
    pub timestamp: String,
}

/// Raw webhook reply, interpreted by the client
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Delivers a payload to the analysis service
pub trait AnalysisTransport: Send + Sync {
    fn send(&self, payload: WebhookPayload) -> BoxFuture<'static, Result<TransportResponse, AnalysisError>>;
}

/// reqwest-backed transport for the configured webhook
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                log::warn!("[HttpTransport] Client builder failed ({}), using defaults", err);
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint_url: endpoint_url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.endpoint_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

impl AnalysisTransport for HttpTransport {
    fn send(&self, payload: WebhookPayload) -> BoxFuture<'static, Result<TransportResponse, AnalysisError>> {
        let mut request = self
            .client
            .post(&self.endpoint_url)
            .header("X-User-ID", payload.user_id.as_str())
            .header("X-User-Tier", payload.user_tier.as_str())
            .json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            log::debug!(
                "[HttpTransport] Webhook replied {} ({} bytes)",
                status,
                body.len()
            );
            Ok(TransportResponse {
                status,
                body: body.to_vec(),
            })
        })
    }
}
