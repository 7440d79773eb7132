// SPDX-License-Identifier: MPL-2.0

//! Recipe endpoint transport
//!
//! Services build a relative request (path plus query string) and hand it
//! to a [`RecipeHttp`]. [`SpoonacularClient`] resolves it against the base
//! URL and signs it with the API key.

use crate::constants::{app_info, timing};
use crate::errors::{AppError, RecipeError};
use crate::utils::with_timeout;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw reply of a recipe endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// GET transport for the recipe endpoints
#[async_trait]
pub trait RecipeHttp: Send + Sync {
    /// Fetch `path_and_query` (e.g. `/recipes/1/analyzedInstructions`)
    ///
    /// Any status is returned as a response; only transport failures are
    /// errors (`EndpointUnavailable`).
    async fn get(&self, path_and_query: &str) -> Result<HttpResponse, RecipeError>;
}

/// Percent-encode one query value, mapping spaces to `+`
pub fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// GET `path_and_query` and decode a JSON body
///
/// Timeouts and transport errors become `EndpointUnavailable`, non-2xx
/// statuses `RemoteError`, undecodable bodies `DecodeError`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &dyn RecipeHttp,
    path_and_query: &str,
    timeout: Option<Duration>,
) -> Result<T, RecipeError> {
    let response = with_timeout(timeout, http.get(path_and_query))
        .await
        .map_err(|_| {
            RecipeError::EndpointUnavailable(format!(
                "no reply within {:?}",
                timeout.unwrap_or_default()
            ))
        })??;

    if !response.is_success() {
        warn!(status = response.status, "Recipe endpoint returned an error");
        return Err(RecipeError::RemoteError {
            status_code: response.status,
            message: response.body.chars().take(200).collect(),
        });
    }

    serde_json::from_str(&response.body).map_err(|e| RecipeError::DecodeError(e.to_string()))
}

/// Spoonacular REST client
pub struct SpoonacularClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SpoonacularClient {
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

    fn signed_url(&self, path_and_query: &str) -> String {
        let separator = if path_and_query.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}apiKey={}",
            self.base_url,
            path_and_query,
            separator,
            encode_query_value(&self.api_key)
        )
    }
}

#[async_trait]
impl RecipeHttp for SpoonacularClient {
    async fn get(&self, path_and_query: &str) -> Result<HttpResponse, RecipeError> {
        debug!(request = path_and_query, "Calling recipe endpoint");

        let response = self
            .http
            .get(self.signed_url(path_and_query))
            .send()
            .await
            // Strip the URL so the key never reaches a log line
            .map_err(|e| RecipeError::EndpointUnavailable(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RecipeError::EndpointUnavailable(e.without_url().to_string()))?;

        debug!(status, size = body.len(), "Recipe endpoint replied");
        Ok(HttpResponse { status, body })
    }
}
