// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `<config_dir>/sazon/config.json`. A missing file
//! yields defaults; `SAZON_*` environment variables are applied on top.
//! API keys are read from the environment only and never written out.

use crate::backends::camera::types::CameraEye;
use crate::constants::{recipes, storage, timing, vision};
use crate::errors::{AppError, AppResult};
use crate::recipes::QueryOptions;
use crate::storage::ImageStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable holding the vision endpoint key
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Environment variable holding the recipe endpoint key
pub const SPOONACULAR_API_KEY_VAR: &str = "SPOONACULAR_API_KEY";

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vision model id (e.g. "gemini-1.5-flash")
    pub vision_model: String,
    /// Vision endpoint base URL
    pub vision_base_url: String,
    /// Recipe endpoint base URL
    pub recipe_base_url: String,
    /// Number of recipe candidates requested
    pub recipe_limit: u32,
    /// Ranking mode sent with each recipe query
    pub recipe_ranking: u8,
    /// Ignore pantry staples when matching ingredients
    pub ignore_pantry: bool,
    /// Delay between the capture trigger and reading the frame
    pub settle_delay_ms: u64,
    /// Bound on camera open and stream start; `None` waits indefinitely
    pub stream_ready_timeout_secs: Option<u64>,
    pub extraction_timeout_secs: Option<u64>,
    pub recipe_query_timeout_secs: Option<u64>,
    pub step_fetch_timeout_secs: Option<u64>,
    /// Where the capture slot lives; defaults to the app data dir
    pub capture_dir: Option<PathBuf>,
    /// Prompt used when none is given for extraction
    pub default_prompt: String,
    /// Headset camera to prefer when both are available
    pub preferred_eye: CameraEye,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vision_model: vision::DEFAULT_MODEL.to_string(),
            vision_base_url: vision::DEFAULT_BASE_URL.to_string(),
            recipe_base_url: recipes::DEFAULT_BASE_URL.to_string(),
            recipe_limit: recipes::DEFAULT_RESULT_LIMIT,
            recipe_ranking: recipes::DEFAULT_RANKING,
            ignore_pantry: true,
            settle_delay_ms: timing::SETTLE_DELAY.as_millis() as u64,
            stream_ready_timeout_secs: Some(timing::STREAM_READY_TIMEOUT_SECS),
            extraction_timeout_secs: None,
            recipe_query_timeout_secs: None,
            step_fetch_timeout_secs: None,
            capture_dir: None,
            default_prompt: vision::DEFAULT_PROMPT.to_string(),
            preferred_eye: CameraEye::default(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(storage::APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, then apply the process environment
    pub fn load() -> AppResult<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load `path`; a missing file gives defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| AppError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Apply `SAZON_*` overrides read through `lookup`
    ///
    /// Timeout variables accept `none` (or `0`) to disable the bound.
    pub fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SAZON_VISION_MODEL") {
            self.vision_model = v;
        }
        if let Some(v) = lookup("SAZON_VISION_BASE_URL") {
            self.vision_base_url = v;
        }
        if let Some(v) = lookup("SAZON_RECIPE_BASE_URL") {
            self.recipe_base_url = v;
        }
        if let Some(v) = lookup("SAZON_RECIPE_LIMIT") {
            self.recipe_limit = parse_env("SAZON_RECIPE_LIMIT", &v)?;
        }
        if let Some(v) = lookup("SAZON_RECIPE_RANKING") {
            self.recipe_ranking = parse_env("SAZON_RECIPE_RANKING", &v)?;
        }
        if let Some(v) = lookup("SAZON_IGNORE_PANTRY") {
            self.ignore_pantry = parse_env("SAZON_IGNORE_PANTRY", &v)?;
        }
        if let Some(v) = lookup("SAZON_SETTLE_DELAY_MS") {
            self.settle_delay_ms = parse_env("SAZON_SETTLE_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("SAZON_STREAM_READY_TIMEOUT_SECS") {
            self.stream_ready_timeout_secs = parse_timeout("SAZON_STREAM_READY_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("SAZON_EXTRACTION_TIMEOUT_SECS") {
            self.extraction_timeout_secs = parse_timeout("SAZON_EXTRACTION_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("SAZON_RECIPE_QUERY_TIMEOUT_SECS") {
            self.recipe_query_timeout_secs = parse_timeout("SAZON_RECIPE_QUERY_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("SAZON_STEP_FETCH_TIMEOUT_SECS") {
            self.step_fetch_timeout_secs = parse_timeout("SAZON_STEP_FETCH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("SAZON_CAPTURE_DIR") {
            self.capture_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SAZON_PROMPT") {
            self.default_prompt = v;
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn stream_ready_timeout(&self) -> Option<Duration> {
        self.stream_ready_timeout_secs.map(Duration::from_secs)
    }

    pub fn extraction_timeout(&self) -> Option<Duration> {
        self.extraction_timeout_secs.map(Duration::from_secs)
    }

    pub fn recipe_query_timeout(&self) -> Option<Duration> {
        self.recipe_query_timeout_secs.map(Duration::from_secs)
    }

    pub fn step_fetch_timeout(&self) -> Option<Duration> {
        self.step_fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.capture_dir.clone().unwrap_or_else(ImageStore::default_dir)
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            limit: self.recipe_limit,
            ranking: self.recipe_ranking,
            ignore_pantry: self.ignore_pantry,
        }
    }
}

/// Read a required secret through `lookup`
pub fn api_key<F>(var: &str, lookup: F) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing required environment variable: {}", var)))
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> AppResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("Invalid value for {}: {:?}", var, value)))
}

fn parse_timeout(var: &str, value: &str) -> AppResult<Option<u64>> {
    match value.trim() {
        "none" | "0" => Ok(None),
        other => parse_env(var, other).map(Some),
    }
}
