// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Captured image persistence
pub mod storage {
    /// Directory name under the platform data dir
    pub const APP_DIR_NAME: &str = "sazon";

    /// File stem of the fixed slot overwritten by every capture; the
    /// extension comes from the encoding format
    pub const CAPTURE_FILE_STEM: &str = "captured_image";
}

/// Camera and pipeline timing
pub mod timing {
    use super::Duration;

    /// Grace period between the capture trigger and reading the frame
    pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

    /// Bound on the device-open and stream-open waits
    pub const STREAM_READY_TIMEOUT_SECS: u64 = 5;

    /// Default request timeout for the HTTP clients
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
}

/// Vision-language endpoint defaults
pub mod vision {
    pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

    pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

    /// Declared mime type of the inline image part
    pub const PNG_MIME_TYPE: &str = "image/png";

    /// Prompt used when the caller does not provide one
    pub const DEFAULT_PROMPT: &str = "Identify every food ingredient visible in this photo.";

    /// Appended to every prompt so the reply is machine readable
    pub const JSON_ARRAY_INSTRUCTION: &str = "Return ONLY a valid JSON array of strings with the detected ingredients. \
Do not include any explanation or formatting. Example: [\"tomato\", \"carrot\", \"onion\"]";
}

/// Recipe endpoint defaults
pub mod recipes {
    pub const DEFAULT_BASE_URL: &str = "https://api.spoonacular.com";

    pub const FIND_BY_INGREDIENTS_PATH: &str = "/recipes/findByIngredients";

    /// Number of candidates requested per query
    pub const DEFAULT_RESULT_LIMIT: u32 = 3;

    /// 1 = maximise used ingredients, 2 = minimise missing ingredients
    pub const DEFAULT_RANKING: u8 = 1;

    /// Path of the structured instructions for a recipe id
    pub fn analyzed_instructions_path(recipe_id: i64) -> String {
        format!("/recipes/{}/analyzedInstructions", recipe_id)
    }
}

/// Supported file formats for the virtual camera source
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Resolution labels for camera listings
pub fn get_resolution_label(width: u32) -> Option<&'static str> {
    match width {
        w if w >= 3840 => Some("4K"),
        w if w >= 2560 => Some("2K"),
        w if w >= 1920 => Some("HD"),
        w if w >= 1280 => Some("720p"),
        w if w >= 640 => Some("SD"),
        _ => None,
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// User agent sent to the remote endpoints
    pub fn user_agent() -> String {
        format!("sazon/{}", version())
    }
}
