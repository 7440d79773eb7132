// SPDX-License-Identifier: MPL-2.0

//! Ingredient extraction from a captured photo
//!
//! The model is asked for a bare JSON array of strings, but replies are
//! cleaned up before parsing because models routinely wrap the array in
//! code fences or quotes.

use super::client::VisionClient;
use super::types::{ContentPart, VisionRequest};
use crate::constants::vision::{DEFAULT_PROMPT, JSON_ARRAY_INSTRUCTION};
use crate::errors::ExtractionError;
use crate::storage::{ImageRef, ImageStore};
use crate::utils::with_timeout;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ordered, lower-cased, de-duplicated ingredient names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientList(Vec<String>);

impl IngredientList {
    /// Normalize `names`: trim, lower-case, drop blanks and repeats.
    /// First occurrence wins.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for name in names {
            let normalized = name.as_ref().trim().to_lowercase();
            if !normalized.is_empty() && !list.contains(&normalized) {
                list.push(normalized);
            }
        }
        Self(list)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a IngredientList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Result of parsing a model reply
///
/// A malformed reply still yields a (empty) list; `malformed` carries the
/// error to surface alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub ingredients: IngredientList,
    pub malformed: Option<ExtractionError>,
}

const FENCES: [&str; 2] = ["```", "´´´"];
const SMART_QUOTES: [char; 6] = ['\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}', '\u{2033}', '\u{FF02}'];

/// Strip fences and stray quoting from a model reply
pub fn clean_reply(raw: &str) -> String {
    let mut text = raw.trim();

    for fence in FENCES {
        if let Some(rest) = text.strip_prefix(fence) {
            text = rest;
            // Optional language tag right after the opening fence
            if text.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
                text = &text[4..];
            }
            break;
        }
    }
    for fence in FENCES {
        if let Some(rest) = text.strip_suffix(fence) {
            text = rest;
            break;
        }
    }
    text = text.trim();

    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].trim();
    }

    text.chars()
        .map(|c| if SMART_QUOTES.contains(&c) { '"' } else { c })
        .collect()
}

/// Parse a cleaned reply as a JSON array of strings
///
/// Never fails: a reply that is not a string array yields an empty list
/// plus `MalformedModelReply`.
pub fn parse_ingredient_reply(raw: &str) -> ParsedReply {
    let cleaned = clean_reply(raw);
    match serde_json::from_str::<Vec<String>>(&cleaned) {
        Ok(names) => ParsedReply {
            ingredients: IngredientList::from_names(names),
            malformed: None,
        },
        Err(e) => ParsedReply {
            ingredients: IngredientList::empty(),
            malformed: Some(ExtractionError::MalformedModelReply {
                reason: e.to_string(),
                raw: raw.to_string(),
            }),
        },
    }
}

/// Turns a persisted capture into an ingredient list
pub struct IngredientExtractor {
    client: Arc<dyn VisionClient>,
    store: ImageStore,
    model: String,
    timeout: Option<Duration>,
}

impl IngredientExtractor {
    pub fn new(client: Arc<dyn VisionClient>, store: ImageStore, model: impl Into<String>) -> Self {
        Self {
            client,
            store,
            model: model.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the single multimodal request for `image_bytes`
    pub fn build_request(&self, image_bytes: &[u8], prompt: &str) -> VisionRequest {
        let prompt = match prompt.trim() {
            "" => DEFAULT_PROMPT,
            p => p,
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);

        VisionRequest {
            model: self.model.clone(),
            parts: vec![
                ContentPart::text(format!("{}\n{}", prompt, JSON_ARRAY_INSTRUCTION)),
                ContentPart::inline_data(self.store.format().mime_type(), encoded),
            ],
        }
    }

    /// Identify the ingredients in the image behind `image`
    ///
    /// # Errors
    /// * `NotFound` - the capture could not be read
    /// * `EndpointUnavailable` - the call failed or timed out
    /// * `EmptyReply` - the reply had no parts
    /// * `MalformedModelReply` - the reply was not a JSON string array
    pub async fn extract(
        &self,
        image: &ImageRef,
        prompt: &str,
    ) -> Result<IngredientList, ExtractionError> {
        let bytes = self.store.load(image).await?;
        let request = self.build_request(&bytes, prompt);

        info!(model = %self.model, image_size = bytes.len(), "Extracting ingredients");

        let response = with_timeout(self.timeout, self.client.generate(request))
            .await
            .map_err(|_| {
                ExtractionError::EndpointUnavailable(format!(
                    "no reply within {:?}",
                    self.timeout.unwrap_or_default()
                ))
            })??;

        let first = response.parts.first().ok_or(ExtractionError::EmptyReply)?;
        let raw = first.as_text().unwrap_or_default();
        debug!(reply_len = raw.len(), "Model reply received");

        let parsed = parse_ingredient_reply(raw);
        if let Some(err) = parsed.malformed {
            warn!(error = %err, "Model reply was not a JSON array");
            return Err(err);
        }

        info!(count = parsed.ingredients.len(), "Ingredients extracted");
        Ok(parsed.ingredients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::VisionResponse;
    use crate::errors::{ErrorKind, StorageError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedVision {
        reply: Result<VisionResponse, ExtractionError>,
        delay: Option<Duration>,
        seen: Mutex<Vec<VisionRequest>>,
    }

    impl ScriptedVision {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(VisionResponse::from_text(text)),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VisionClient for ScriptedVision {
        async fn generate(&self, request: VisionRequest) -> Result<VisionResponse, ExtractionError> {
            self.seen.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone()
        }
    }

    async fn saved_capture(dir: &std::path::Path) -> (ImageStore, ImageRef) {
        use crate::backends::camera::types::{CapturedImage, PixelFormat};
        let store = ImageStore::new(dir);
        let image = CapturedImage::new(2, 2, PixelFormat::RGB24, vec![9u8; 12]);
        let reference = store.save(&image).await.unwrap();
        (store, reference)
    }

    #[test]
    fn test_fenced_reply_parses() {
        let parsed = parse_ingredient_reply("```json\n[\"tomato\",\"onion\"]\n```");
        assert_eq!(parsed.ingredients, IngredientList::from_names(["tomato", "onion"]));
        assert!(parsed.malformed.is_none());
    }

    #[test]
    fn test_prose_reply_is_malformed() {
        let parsed = parse_ingredient_reply("\"not json at all\"");
        assert!(parsed.ingredients.is_empty());
        assert_eq!(
            parsed.malformed.map(|e| e.kind()),
            Some(ErrorKind::MalformedModelReply)
        );
    }

    #[test]
    fn test_smart_quotes_and_acute_fences() {
        let parsed = parse_ingredient_reply("´´´[\u{201C}Garlic\u{201D}, \u{201C}basil\u{201D}]´´´");
        assert_eq!(parsed.ingredients.as_slice(), ["garlic", "basil"]);
    }

    #[test]
    fn test_empty_array_is_valid() {
        let parsed = parse_ingredient_reply("[]");
        assert!(parsed.ingredients.is_empty());
        assert!(parsed.malformed.is_none());
    }

    #[test]
    fn test_names_are_normalized() {
        let list = IngredientList::from_names([" Red Onion ", "red onion", "", "Egg"]);
        assert_eq!(list.as_slice(), ["red onion", "egg"]);
    }

    #[tokio::test]
    async fn test_request_carries_prompt_and_png() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reference) = saved_capture(dir.path()).await;
        let vision = Arc::new(ScriptedVision::replying("[\"Egg\"]"));
        let extractor = IngredientExtractor::new(vision.clone(), store, "gemini-1.5-flash");

        let list = extractor.extract(&reference, "What food is here?").await.unwrap();
        assert_eq!(list.as_slice(), ["egg"]);

        let seen = vision.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.model, "gemini-1.5-flash");
        let text = request.parts[0].as_text().unwrap();
        assert!(text.starts_with("What food is here?"));
        assert!(text.contains("JSON array of strings"));

        let ContentPart::InlineData { inline_data } = &request.parts[1] else {
            panic!("second part should carry the image");
        };
        assert_eq!(inline_data.mime_type, "image/png");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&inline_data.data)
            .unwrap();
        assert_eq!(decoded, std::fs::read(&reference.path).unwrap());
    }

    #[tokio::test]
    async fn test_no_parts_is_empty_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reference) = saved_capture(dir.path()).await;
        let vision = Arc::new(ScriptedVision {
            reply: Ok(VisionResponse::default()),
            delay: None,
            seen: Mutex::new(Vec::new()),
        });
        let extractor = IngredientExtractor::new(vision, store, "m");

        let err = extractor.extract(&reference, "").await.unwrap_err();
        assert_eq!(err, ExtractionError::EmptyReply);
    }

    #[tokio::test]
    async fn test_missing_image_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let vision = Arc::new(ScriptedVision::replying("[]"));
        let extractor = IngredientExtractor::new(vision.clone(), ImageStore::new(dir.path()), "m");
        let reference = ImageRef::from_path(dir.path().join("missing.png"));

        let err = extractor.extract(&reference, "").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Image(StorageError::NotFound(_))));
        assert!(vision.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_endpoint_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reference) = saved_capture(dir.path()).await;
        let vision = Arc::new(ScriptedVision {
            reply: Ok(VisionResponse::from_text("[]")),
            delay: Some(Duration::from_secs(60)),
            seen: Mutex::new(Vec::new()),
        });
        let extractor = IngredientExtractor::new(vision, store, "m")
            .with_timeout(Some(Duration::from_secs(1)));

        let err = extractor.extract(&reference, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointUnavailable);
    }
}
