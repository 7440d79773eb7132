// SPDX-License-Identifier: MPL-2.0

//! Sazon - from a photo of your ingredients to a recipe, step by step
//!
//! The crate captures a still from a headset passthrough camera, asks a
//! vision-language model which ingredients it shows, looks up matching
//! recipes and walks the user through the chosen recipe's instructions.
//!
//! # Architecture
//!
//! - [`backends`]: Camera capability contract, capture session, virtual camera
//! - [`pipelines`]: Snapshot-and-persist capture step
//! - [`storage`]: The fixed capture slot on disk
//! - [`ai`]: Ingredient extraction through the vision endpoint
//! - [`recipes`]: Recipe search and step retrieval
//! - [`app`]: The pipeline controller and its state machine
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let config = sazon::Config::load()?;
//! let camera = Arc::new(FileCameraBackend::from_image(Path::new("fridge.jpg"))?);
//! let services = PipelineServices::from_config(&config, camera)?;
//! let controller = PipelineController::new(services, Arc::new(NoopObserver));
//!
//! controller.capture().await?;
//! controller.extract(None).await?;
//! let recipes = controller.query().await?;
//! controller.select(recipes[0].id).await?;
//! ```

pub mod ai;
pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod recipes;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use app::{PipelineController, PipelineServices, PipelineState, Stage};
pub use config::Config;
pub use errors::{AppError, AppResult, ErrorKind, PipelineError};
