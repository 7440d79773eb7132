// SPDX-License-Identifier: MPL-2.0

//! Recipe search and instructions
//!
//! # Modules
//!
//! - [`client`]: Transport seam and the Spoonacular client
//! - [`query`]: Ranked recipe candidates for an ingredient list
//! - [`steps`]: Ordered instructions for one recipe

pub mod client;
pub mod query;
pub mod steps;

pub use client::{HttpResponse, RecipeHttp, SpoonacularClient};
pub use query::{QueryOptions, RecipeQueryService, RecipeResult};
pub use steps::{RecipeStep, RecipeStepService};
