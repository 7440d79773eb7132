// SPDX-License-Identifier: MPL-2.0

//! Step-by-step instructions for a recipe

use super::client::{RecipeHttp, get_json};
use crate::constants::recipes::analyzed_instructions_path;
use crate::errors::RecipeError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One instruction; `index` is 1-based and for display only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub index: usize,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct InstructionGroup {
    #[serde(default)]
    steps: Vec<InstructionStep>,
}

#[derive(Debug, Deserialize)]
struct InstructionStep {
    step: String,
}

/// Fetches the analyzed instructions of a recipe
pub struct RecipeStepService {
    http: Arc<dyn RecipeHttp>,
    timeout: Option<Duration>,
}

impl RecipeStepService {
    pub fn new(http: Arc<dyn RecipeHttp>) -> Self {
        Self {
            http,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Steps of the first instruction group, in order
    ///
    /// # Errors
    /// * `NoStepsAvailable` - no group, or the first group has no steps
    /// * `RemoteError` / `DecodeError` / `EndpointUnavailable`
    pub async fn get_steps(&self, recipe_id: i64) -> Result<Vec<RecipeStep>, RecipeError> {
        info!(recipe_id, "Fetching recipe steps");

        let groups: Vec<InstructionGroup> = get_json(
            self.http.as_ref(),
            &analyzed_instructions_path(recipe_id),
            self.timeout,
        )
        .await?;

        let steps: Vec<RecipeStep> = groups
            .into_iter()
            .next()
            .map(|group| group.steps)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, s)| RecipeStep {
                index: i + 1,
                description: s.step.trim().to_string(),
            })
            .collect();

        if steps.is_empty() {
            return Err(RecipeError::NoStepsAvailable { recipe_id });
        }

        info!(recipe_id, count = steps.len(), "Recipe steps received");
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::client::HttpResponse;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl RecipeHttp for Fixed {
        async fn get(&self, path_and_query: &str) -> Result<HttpResponse, RecipeError> {
            assert_eq!(path_and_query, "/recipes/42/analyzedInstructions");
            Ok(HttpResponse::ok(self.0))
        }
    }

    async fn steps_for(body: &'static str) -> Result<Vec<RecipeStep>, RecipeError> {
        RecipeStepService::new(Arc::new(Fixed(body))).get_steps(42).await
    }

    #[tokio::test]
    async fn test_first_group_steps_are_indexed() {
        let steps = steps_for(
            r#"[{"name":"","steps":[{"number":1,"step":"Chop. "},{"number":2,"step":"Fry."}]},
                {"name":"sauce","steps":[{"number":1,"step":"Stir."}]}]"#,
        )
        .await
        .unwrap();
        assert_eq!(
            steps,
            vec![
                RecipeStep { index: 1, description: "Chop.".into() },
                RecipeStep { index: 2, description: "Fry.".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_instructions_are_reported() {
        let err = steps_for("[]").await.unwrap_err();
        assert_eq!(err, RecipeError::NoStepsAvailable { recipe_id: 42 });

        let err = steps_for(r#"[{"name":"","steps":[]}]"#).await.unwrap_err();
        assert_eq!(err, RecipeError::NoStepsAvailable { recipe_id: 42 });
    }

    #[tokio::test]
    async fn test_malformed_steps_are_decode_error() {
        let err = steps_for(r#"[{"steps":[{"number":1}]}]"#).await.unwrap_err();
        assert!(matches!(err, RecipeError::DecodeError(_)));
    }
}
