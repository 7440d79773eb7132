// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! The camera commands use the virtual backend, serving an image file as
//! the passthrough feed. The remote commands need `GEMINI_API_KEY` and/or
//! `SPOONACULAR_API_KEY` in the environment.

use sazon::ai::{GeminiClient, IngredientExtractor, IngredientList};
use sazon::app::{PipelineController, PipelineObserver, PipelineServices};
use sazon::backends::camera::{CameraBackend, CaptureSession};
use sazon::backends::virtual_camera::FileCameraBackend;
use sazon::config::{self, Config};
use sazon::constants::get_resolution_label;
use sazon::errors::ErrorKind;
use sazon::pipelines::photo::PhotoPipeline;
use sazon::recipes::{
    RecipeQueryService, RecipeResult, RecipeStep, RecipeStepService, SpoonacularClient,
};
use sazon::storage::{ImageRef, ImageStore};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn recipe_client(config: &Config) -> Result<Arc<SpoonacularClient>, Box<dyn std::error::Error>> {
    let key = config::api_key(config::SPOONACULAR_API_KEY_VAR, env_lookup)?;
    Ok(Arc::new(SpoonacularClient::new(key, config.recipe_base_url.clone())?))
}

fn print_recipes(recipes: &[RecipeResult]) {
    if recipes.is_empty() {
        println!("No recipes found for these ingredients.");
        return;
    }
    for (position, recipe) in recipes.iter().enumerate() {
        let counts = match (recipe.used_ingredient_count, recipe.missed_ingredient_count) {
            (Some(used), Some(missed)) => format!(" (uses {}, missing {})", used, missed),
            _ => String::new(),
        };
        println!("  [{}] {} #{}{}", position + 1, recipe.title, recipe.id, counts);
    }
}

fn print_step(step: &RecipeStep, total: usize) {
    println!();
    println!("Step {} of {}", step.index, total);
    println!("  {}", step.description);
}

/// List the cameras the virtual backend exposes for `image`
pub fn list_cameras(image: &Path) -> CliResult {
    let backend = FileCameraBackend::from_image(image)?;
    let cameras = backend.list_cameras();

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({} eye)", index, camera.name, camera.eye);
        let formats: Vec<String> = camera
            .supported_resolutions
            .iter()
            .map(|res| match get_resolution_label(res.width) {
                Some(label) => format!("{} [{}]", res, label),
                None => res.to_string(),
            })
            .collect();
        println!("      Resolutions: {}", formats.join(", "));
        println!();
    }
    Ok(())
}

/// Open the virtual camera, capture once and print the saved path
pub fn capture(config: &Config, image: &Path) -> CliResult {
    let backend: Arc<dyn CameraBackend> = Arc::new(FileCameraBackend::from_image(image)?);
    let pipeline = PhotoPipeline::new(ImageStore::new(config.capture_dir()), config.settle_delay());

    let rt = tokio::runtime::Runtime::new()?;
    let reference = rt.block_on(async {
        let mut session = CaptureSession::new(backend, config.stream_ready_timeout())
            .with_preferred_eye(config.preferred_eye);
        let stream = session.open_and_stream().await?;
        println!("Capture resolution: {}", stream.resolution);
        let reference = pipeline.capture(&session, &stream).await;
        session.close();
        reference
    })?;

    println!("Photo saved: {}", reference.path.display());
    Ok(())
}

/// Run extraction on an existing PNG
pub fn ingredients(config: &Config, png: &Path, prompt: Option<String>) -> CliResult {
    let key = config::api_key(config::GEMINI_API_KEY_VAR, env_lookup)?;
    let client = GeminiClient::new(key, config.vision_base_url.clone())?;
    let extractor = IngredientExtractor::new(
        Arc::new(client),
        ImageStore::new(config.capture_dir()),
        config.vision_model.clone(),
    )
    .with_timeout(config.extraction_timeout());

    let prompt = prompt.unwrap_or_else(|| config.default_prompt.clone());
    let rt = tokio::runtime::Runtime::new()?;
    let list = rt.block_on(extractor.extract(&ImageRef::from_path(png), &prompt))?;

    if list.is_empty() {
        println!("No ingredients recognised.");
    }
    for name in &list {
        println!("{}", name);
    }
    Ok(())
}

/// Query recipes for the given ingredient names
pub fn recipes(config: &Config, ingredients: &[String]) -> CliResult {
    let service = RecipeQueryService::new(recipe_client(config)?)
        .with_options(config.query_options())
        .with_timeout(config.recipe_query_timeout());

    let list = IngredientList::from_names(ingredients);
    let rt = tokio::runtime::Runtime::new()?;
    let recipes = rt.block_on(service.find_by_ingredients(&list))?;

    println!("Recipes:");
    print_recipes(&recipes);
    Ok(())
}

/// Print all steps of a recipe
pub fn steps(config: &Config, recipe_id: i64) -> CliResult {
    let service =
        RecipeStepService::new(recipe_client(config)?).with_timeout(config.step_fetch_timeout());

    let rt = tokio::runtime::Runtime::new()?;
    let steps = rt.block_on(service.get_steps(recipe_id))?;

    for step in &steps {
        println!("Step {}: {}", step.index, step.description);
    }
    Ok(())
}

/// Prints pipeline results as they arrive
struct ConsoleObserver;

impl PipelineObserver for ConsoleObserver {
    fn on_ingredients_ready(&self, ingredients: &IngredientList) {
        if ingredients.is_empty() {
            println!("No ingredients recognised. Try another photo.");
        } else {
            let names: Vec<&str> = ingredients.iter().map(String::as_str).collect();
            println!("Ingredients: {}", names.join(", "));
        }
    }

    fn on_recipes_ready(&self, recipes: &[RecipeResult]) {
        println!("Recipes:");
        print_recipes(recipes);
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        eprintln!("Error ({}): {}", kind, message);
    }
}

/// Capture, extract, query, then step through the chosen recipe on stdin
pub fn run(config: &Config, image: &Path, recipe: usize, prompt: Option<String>) -> CliResult {
    let backend: Arc<dyn CameraBackend> = Arc::new(FileCameraBackend::from_image(image)?);
    let services = PipelineServices::from_config(config, backend)?;
    let controller = PipelineController::new(services, Arc::new(ConsoleObserver));

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let image = controller.capture().await?;
        println!("Photo saved: {}", image.path.display());

        controller.extract(prompt.as_deref()).await?;
        let recipes = controller.query().await?;

        let chosen = recipes
            .get(recipe.saturating_sub(1))
            .ok_or_else(|| format!("No recipe at position {}", recipe))?;
        println!();
        println!("Cooking: {}", chosen.title);
        let steps = controller.select(chosen.id).await?;
        Ok::<usize, Box<dyn std::error::Error>>(steps.len())
    });

    let total = match result {
        Ok(total) => total,
        Err(e) => {
            controller.shutdown();
            return Err(e);
        }
    };

    if let Some(step) = controller.current_step() {
        print_step(&step, total);
    }
    println!();
    println!("[n]ext, [p]revious, [q]uit");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let moved = match line.trim() {
            "n" => controller.next(),
            "p" => controller.prev(),
            "q" => break,
            _ => {
                println!("[n]ext, [p]revious, [q]uit");
                continue;
            }
        };
        match moved {
            Ok(step) => print_step(&step, total),
            Err(e) => eprintln!("{}", e),
        }
    }

    controller.shutdown();
    Ok(())
}
