// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture-to-recipe pipeline
//!
//! Every component reports failures through its own enum. Each of those
//! maps onto a flat [`ErrorKind`] which is what the presentation layer
//! receives through `on_error`.

use crate::app::state::{Operation, Stage};
use std::fmt;
use std::path::PathBuf;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Flat failure taxonomy surfaced to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedDevice,
    PermissionDenied,
    NoCameraAvailable,
    SessionOpenFailed,
    EncodeFailed,
    WriteFailed,
    NotFound,
    EndpointUnavailable,
    EmptyReply,
    MalformedModelReply,
    NoIngredients,
    RemoteError { status_code: u16 },
    DecodeError,
    NoStepsAvailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnsupportedDevice => write!(f, "UnsupportedDevice"),
            ErrorKind::PermissionDenied => write!(f, "PermissionDenied"),
            ErrorKind::NoCameraAvailable => write!(f, "NoCameraAvailable"),
            ErrorKind::SessionOpenFailed => write!(f, "SessionOpenFailed"),
            ErrorKind::EncodeFailed => write!(f, "EncodeFailed"),
            ErrorKind::WriteFailed => write!(f, "WriteFailed"),
            ErrorKind::NotFound => write!(f, "NotFound"),
            ErrorKind::EndpointUnavailable => write!(f, "EndpointUnavailable"),
            ErrorKind::EmptyReply => write!(f, "EmptyReply"),
            ErrorKind::MalformedModelReply => write!(f, "MalformedModelReply"),
            ErrorKind::NoIngredients => write!(f, "NoIngredients"),
            ErrorKind::RemoteError { status_code } => write!(f, "RemoteError({})", status_code),
            ErrorKind::DecodeError => write!(f, "DecodeError"),
            ErrorKind::NoStepsAvailable => write!(f, "NoStepsAvailable"),
        }
    }
}

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera session errors
    Camera(CameraError),
    /// Image persistence errors
    Storage(StorageError),
    /// Ingredient extraction errors
    Extraction(ExtractionError),
    /// Recipe endpoint errors
    Recipe(RecipeError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Camera session errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Platform has no passthrough camera capability
    UnsupportedDevice,
    /// OS-level camera permission not granted yet
    PermissionDenied,
    /// Zero usable cameras, or zero supported resolutions
    NoCameraAvailable,
    /// Device or stream did not reach a ready state
    SessionOpenFailed(String),
    /// Operation issued in a session state that cannot serve it
    InvalidState(String),
    /// Frame could not be read from the active stream
    FrameUnavailable(String),
}

/// Image persistence errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Pixel buffer produced no encoded output
    EncodeFailed(String),
    /// Storage I/O failed while writing
    WriteFailed(String),
    /// Reference no longer resolves to a file
    NotFound(PathBuf),
}

/// Ingredient extraction errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Captured image could not be loaded
    Image(StorageError),
    /// Remote call failed or timed out
    EndpointUnavailable(String),
    /// Response carried no content parts
    EmptyReply,
    /// Reply text was not a JSON array of strings
    MalformedModelReply { reason: String, raw: String },
}

/// Recipe endpoint errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeError {
    /// Query attempted with an empty ingredient list
    NoIngredients,
    /// Endpoint answered with a non-success HTTP status
    RemoteError { status_code: u16, message: String },
    /// Body was not the expected JSON shape
    DecodeError(String),
    /// Recipe has no structured instruction steps
    NoStepsAvailable { recipe_id: i64 },
    /// Transport failure or timeout
    EndpointUnavailable(String),
}

impl CameraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::UnsupportedDevice => ErrorKind::UnsupportedDevice,
            CameraError::PermissionDenied => ErrorKind::PermissionDenied,
            CameraError::NoCameraAvailable => ErrorKind::NoCameraAvailable,
            CameraError::SessionOpenFailed(_)
            | CameraError::InvalidState(_)
            | CameraError::FrameUnavailable(_) => ErrorKind::SessionOpenFailed,
        }
    }
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::EncodeFailed(_) => ErrorKind::EncodeFailed,
            StorageError::WriteFailed(_) => ErrorKind::WriteFailed,
            StorageError::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::Image(e) => e.kind(),
            ExtractionError::EndpointUnavailable(_) => ErrorKind::EndpointUnavailable,
            ExtractionError::EmptyReply => ErrorKind::EmptyReply,
            ExtractionError::MalformedModelReply { .. } => ErrorKind::MalformedModelReply,
        }
    }
}

impl RecipeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecipeError::NoIngredients => ErrorKind::NoIngredients,
            RecipeError::RemoteError { status_code, .. } => ErrorKind::RemoteError {
                status_code: *status_code,
            },
            RecipeError::DecodeError(_) => ErrorKind::DecodeError,
            RecipeError::NoStepsAvailable { .. } => ErrorKind::NoStepsAvailable,
            RecipeError::EndpointUnavailable(_) => ErrorKind::EndpointUnavailable,
        }
    }
}

impl AppError {
    /// Taxonomy entry for pipeline failures; `None` for config and misc errors
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Camera(e) => Some(e.kind()),
            AppError::Storage(e) => Some(e.kind()),
            AppError::Extraction(e) => Some(e.kind()),
            AppError::Recipe(e) => Some(e.kind()),
            AppError::Config(_) | AppError::Other(_) => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::Extraction(e) => write!(f, "Extraction error: {}", e),
            AppError::Recipe(e) => write!(f, "Recipe error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::UnsupportedDevice => write!(f, "Passthrough camera not supported"),
            CameraError::PermissionDenied => write!(f, "Camera permission not granted"),
            CameraError::NoCameraAvailable => write!(f, "No usable camera found"),
            CameraError::SessionOpenFailed(msg) => write!(f, "Session open failed: {}", msg),
            CameraError::InvalidState(msg) => write!(f, "Invalid session state: {}", msg),
            CameraError::FrameUnavailable(msg) => write!(f, "Frame unavailable: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::EncodeFailed(msg) => write!(f, "Encoding failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::NotFound(path) => write!(f, "Image not found: {}", path.display()),
        }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::Image(e) => write!(f, "Could not load image: {}", e),
            ExtractionError::EndpointUnavailable(msg) => {
                write!(f, "Vision endpoint unavailable: {}", msg)
            }
            ExtractionError::EmptyReply => write!(f, "Vision endpoint returned no content"),
            ExtractionError::MalformedModelReply { reason, .. } => {
                write!(f, "Model reply is not a JSON array of strings: {}", reason)
            }
        }
    }
}

impl fmt::Display for RecipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeError::NoIngredients => write!(f, "No ingredients to search with"),
            RecipeError::RemoteError {
                status_code,
                message,
            } => write!(f, "Recipe endpoint returned {}: {}", status_code, message),
            RecipeError::DecodeError(msg) => write!(f, "Could not decode recipe response: {}", msg),
            RecipeError::NoStepsAvailable { recipe_id } => {
                write!(f, "Recipe {} has no structured instructions", recipe_id)
            }
            RecipeError::EndpointUnavailable(msg) => {
                write!(f, "Recipe endpoint unavailable: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for StorageError {}
impl std::error::Error for ExtractionError {}
impl std::error::Error for RecipeError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<ExtractionError> for AppError {
    fn from(err: ExtractionError) -> Self {
        AppError::Extraction(err)
    }
}

impl From<RecipeError> for AppError {
    fn from(err: RecipeError) -> Self {
        AppError::Recipe(err)
    }
}

impl From<StorageError> for ExtractionError {
    fn from(err: StorageError) -> Self {
        ExtractionError::Image(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

/// A stage failure as delivered to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&AppError> for Failure {
    fn from(err: &AppError) -> Self {
        // Config and misc errors never reach a stage; treat them as endpoint trouble
        let kind = err.kind().unwrap_or(ErrorKind::EndpointUnavailable);
        Failure::new(kind, err.to_string())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of a controller operation that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Operation not allowed from the current stage; state untouched
    InvalidTransition { operation: Operation, stage: Stage },
    /// Result arrived after a restart and was discarded
    Stale { operation: Operation },
    /// Stage failed; controller is now in `Error`
    Failed(Failure),
}

impl PipelineError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineError::Failed(failure) => Some(failure.kind),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidTransition { operation, stage } => {
                write!(f, "Cannot {} while {}", operation, stage)
            }
            PipelineError::Stale { operation } => {
                write!(f, "Discarded stale {} result after restart", operation)
            }
            PipelineError::Failed(failure) => write!(f, "{}", failure),
        }
    }
}

impl std::error::Error for PipelineError {}
