// SPDX-License-Identifier: MPL-2.0

//! Ingredient recognition through a vision-language model

pub mod client;
pub mod ingredients;
pub mod types;

pub use client::{GeminiClient, VisionClient};
pub use ingredients::{
    IngredientExtractor, IngredientList, ParsedReply, clean_reply, parse_ingredient_reply,
};
pub use types::{ContentPart, InlineData, VisionRequest, VisionResponse};
