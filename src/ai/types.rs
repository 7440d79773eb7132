// SPDX-License-Identifier: MPL-2.0

//! Vision request and response types

use serde::{Deserialize, Serialize};

/// Binary payload carried inline next to the text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 (standard alphabet, padded)
    pub data: String,
}

/// One fragment of a multimodal message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentPart::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::InlineData { .. } => None,
        }
    }
}

/// Single-turn request to a vision-language model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
}

/// Parts of the model's reply, in the order they were returned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisionResponse {
    pub parts: Vec<ContentPart>,
}

impl VisionResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ContentPart::text(text)],
        }
    }
}
