// SPDX-License-Identifier: MPL-2.0

//! Recipe search by ingredients

use super::client::{RecipeHttp, encode_query_value, get_json};
use crate::ai::IngredientList;
use crate::constants::recipes::{
    DEFAULT_RANKING, DEFAULT_RESULT_LIMIT, FIND_BY_INGREDIENTS_PATH,
};
use crate::errors::RecipeError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One ranked recipe candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResult {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub used_ingredient_count: Option<u32>,
    #[serde(default)]
    pub missed_ingredient_count: Option<u32>,
}

/// Search parameters sent with every query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub limit: u32,
    pub ranking: u8,
    pub ignore_pantry: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RESULT_LIMIT,
            ranking: DEFAULT_RANKING,
            ignore_pantry: true,
        }
    }
}

/// Relative request for `ingredients` with `options`
pub fn find_by_ingredients_request(ingredients: &IngredientList, options: &QueryOptions) -> String {
    let joined = ingredients
        .iter()
        .map(|name| encode_query_value(name))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "{}?ingredients={}&number={}&ranking={}&ignorePantry={}",
        FIND_BY_INGREDIENTS_PATH, joined, options.limit, options.ranking, options.ignore_pantry
    )
}

/// Finds recipes that use the detected ingredients
pub struct RecipeQueryService {
    http: Arc<dyn RecipeHttp>,
    options: QueryOptions,
    timeout: Option<Duration>,
}

impl RecipeQueryService {
    pub fn new(http: Arc<dyn RecipeHttp>) -> Self {
        Self {
            http,
            options: QueryOptions::default(),
            timeout: None,
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ranked candidates, in the order the endpoint returned them
    ///
    /// Every call hits the endpoint; nothing is cached.
    ///
    /// # Errors
    /// * `NoIngredients` - empty list, no request is made
    /// * `RemoteError` / `DecodeError` / `EndpointUnavailable`
    pub async fn find_by_ingredients(
        &self,
        ingredients: &IngredientList,
    ) -> Result<Vec<RecipeResult>, RecipeError> {
        if ingredients.is_empty() {
            return Err(RecipeError::NoIngredients);
        }

        let request = find_by_ingredients_request(ingredients, &self.options);
        info!(ingredients = ingredients.len(), "Querying recipes");

        let recipes: Vec<RecipeResult> =
            get_json(self.http.as_ref(), &request, self.timeout).await?;

        info!(count = recipes.len(), "Recipes received");
        Ok(recipes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::client::HttpResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHttp {
        body: String,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RecipeHttp for RecordingHttp {
        async fn get(&self, path_and_query: &str) -> Result<HttpResponse, RecipeError> {
            self.requests.lock().unwrap().push(path_and_query.to_string());
            Ok(HttpResponse::ok(self.body.clone()))
        }
    }

    #[test]
    fn test_request_format() {
        let list = IngredientList::from_names(["Tomato", "red onion"]);
        assert_eq!(
            find_by_ingredients_request(&list, &QueryOptions::default()),
            "/recipes/findByIngredients?ingredients=tomato,red+onion&number=3&ranking=1&ignorePantry=true"
        );
    }

    #[tokio::test]
    async fn test_empty_list_makes_no_call() {
        let http = Arc::new(RecordingHttp::default());
        let service = RecipeQueryService::new(http.clone());

        let err = service
            .find_by_ingredients(&IngredientList::empty())
            .await
            .unwrap_err();
        assert_eq!(err, RecipeError::NoIngredients);
        assert!(http.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_results_keep_remote_order() {
        let http = Arc::new(RecordingHttp {
            body: r#"[
                {"id": 9, "title": "Shakshuka", "image": "https://img/9.jpg",
                 "usedIngredientCount": 2, "missedIngredientCount": 1, "likes": 4},
                {"id": 3, "title": "Salsa"}
            ]"#
            .to_string(),
            ..Default::default()
        });
        let service = RecipeQueryService::new(http);

        let recipes = service
            .find_by_ingredients(&IngredientList::from_names(["tomato"]))
            .await
            .unwrap();
        assert_eq!(recipes.iter().map(|r| r.id).collect::<Vec<_>>(), vec![9, 3]);
        assert_eq!(recipes[0].used_ingredient_count, Some(2));
        assert_eq!(recipes[1].image, None);
    }

    #[tokio::test]
    async fn test_object_body_is_decode_error() {
        let http = Arc::new(RecordingHttp {
            body: r#"{"status":"failure"}"#.to_string(),
            ..Default::default()
        });
        let service = RecipeQueryService::new(http);

        let err = service
            .find_by_ingredients(&IngredientList::from_names(["egg"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeError::DecodeError(_)));
    }

    #[tokio::test]
    async fn test_each_call_queries_again() {
        let http = Arc::new(RecordingHttp {
            body: "[]".to_string(),
            ..Default::default()
        });
        let service = RecipeQueryService::new(http.clone());
        let list = IngredientList::from_names(["egg"]);

        service.find_by_ingredients(&list).await.unwrap();
        service.find_by_ingredients(&list).await.unwrap();
        assert_eq!(http.requests.lock().unwrap().len(), 2);
    }
}
