// SPDX-License-Identifier: MPL-2.0

//! Vision endpoint client
//!
//! [`VisionClient`] is the seam the extractor talks to; [`GeminiClient`]
//! implements it over the `generateContent` REST call.

use super::types::{ContentPart, VisionRequest, VisionResponse};
use crate::constants::{app_info, timing};
use crate::errors::{AppError, ExtractionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Sends one multimodal request and returns the model's reply parts
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// # Errors
    /// * `EndpointUnavailable` - transport failure or non-success status
    async fn generate(&self, request: VisionRequest) -> Result<VisionResponse, ExtractionError>;
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timing::HTTP_TIMEOUT_SECS))
            .user_agent(app_info::user_agent())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: &'a [ContentPart],
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

impl From<GenerateContentResponse> for VisionResponse {
    fn from(response: GenerateContentResponse) -> Self {
        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .map(ContentPart::text)
            .collect();
        VisionResponse { parts }
    }
}

#[async_trait]
impl VisionClient for GeminiClient {
    async fn generate(&self, request: VisionRequest) -> Result<VisionResponse, ExtractionError> {
        let body = GenerateContentRequest {
            contents: [RequestContent {
                role: "user",
                parts: &request.parts,
            }],
        };

        debug!(model = %request.model, parts = request.parts.len(), "Sending vision request");

        let response = self
            .http
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::EndpointUnavailable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Vision endpoint returned an error");
            return Err(ExtractionError::EndpointUnavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }

        let decoded: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::EndpointUnavailable(format!("Unreadable response: {}", e)))?;

        Ok(decoded.into())
    }
}
