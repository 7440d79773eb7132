// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Frame dimensions offered by a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count, widened so 65k x 65k sensors cannot overflow
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which headset camera a device sits behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraEye {
    #[default]
    Left,
    Right,
}

impl std::fmt::Display for CameraEye {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraEye::Left => write!(f, "left"),
            CameraEye::Right => write!(f, "right"),
        }
    }
}

/// A camera as enumerated by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Backend-specific identifier
    pub id: String,
    pub name: String,
    pub eye: CameraEye,
    /// Supported resolutions in the order the platform reports them
    pub supported_resolutions: Vec<Resolution>,
}

/// Backend token for an opened device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

/// Backend token for an active continuous capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA => 4,
            Self::RGB24 => 3,
            Self::Gray8 => 1,
        }
    }
}

/// A single frame snapshot taken from a capture stream
///
/// Pixel data sits behind an `Arc<[u8]>` so clones share the buffer and
/// nothing can mutate it after creation.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Content id, stable for the lifetime of this snapshot
    pub id: Uuid,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row stride in bytes
    pub stride: u32,
    pub data: Arc<[u8]>,
    pub captured_at: DateTime<Utc>,
}

impl CapturedImage {
    /// Build a tightly packed snapshot stamped with the current time
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            width,
            height,
            format,
            stride: width * format.bytes_per_pixel(),
            data: data.into(),
            captured_at: Utc::now(),
        }
    }

    /// Expected buffer length for the declared geometry
    pub fn expected_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Device could not be opened
    InitializationFailed(String),
    /// Device or stream token is unknown or already released
    DeviceNotFound(String),
    /// Requested resolution is not offered by the device
    FormatNotSupported(String),
    /// No frame has been produced yet
    NoFrame,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::NoFrame => write!(f, "No frame available yet"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_area_does_not_overflow() {
        let res = Resolution::new(u32::MAX, 2);
        assert_eq!(res.area(), u32::MAX as u64 * 2);
    }

    #[test]
    fn test_captured_image_stride() {
        let image = CapturedImage::new(4, 2, PixelFormat::RGBA, vec![0u8; 32]);
        assert_eq!(image.stride, 16);
        assert_eq!(image.expected_len(), 32);
    }
}
