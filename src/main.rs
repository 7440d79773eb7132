// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "sazon")]
#[command(about = "Photograph your ingredients, get recipes and cook them step by step")]
#[command(version = sazon::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the cameras of the virtual backend
    Cameras {
        /// Image file served as the camera feed
        #[arg(short, long)]
        image: PathBuf,
    },

    /// Capture a photo and save it to the capture slot
    Capture {
        /// Image file served as the camera feed
        #[arg(short, long)]
        image: PathBuf,
    },

    /// Identify the ingredients in a PNG image
    Ingredients {
        /// PNG image to analyse
        png: PathBuf,

        /// Prompt sent with the image (default from config)
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Find recipes using the given ingredients
    Recipes {
        /// Ingredient names
        #[arg(required = true)]
        ingredients: Vec<String>,
    },

    /// Show the steps of a recipe
    Steps {
        /// Recipe id (from 'sazon recipes')
        recipe_id: i64,
    },

    /// Run the whole pipeline and walk through the recipe
    Run {
        /// Image file served as the camera feed
        #[arg(short, long)]
        image: PathBuf,

        /// Recipe to cook, 1-based position in the result list
        #[arg(short, long, default_value = "1")]
        recipe: usize,

        /// Prompt sent with the image (default from config)
        #[arg(short, long)]
        prompt: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=sazon=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = sazon::Config::load()?;

    match cli.command {
        Commands::Cameras { image } => cli::list_cameras(&image),
        Commands::Capture { image } => cli::capture(&config, &image),
        Commands::Ingredients { png, prompt } => cli::ingredients(&config, &png, prompt),
        Commands::Recipes { ingredients } => cli::recipes(&config, &ingredients),
        Commands::Steps { recipe_id } => cli::steps(&config, recipe_id),
        Commands::Run {
            image,
            recipe,
            prompt,
        } => cli::run(&config, &image, recipe, prompt),
    }
}
