// SPDX-License-Identifier: GPL-3.0-only

//! Still image loading for the virtual camera
//!
//! Decodes an image file into an RGBA frame and produces the scaled
//! variants the virtual camera advertises as its supported resolutions.

use crate::backends::camera::types::{
    BackendError, BackendResult, CapturedImage, PixelFormat, Resolution,
};
use crate::constants::file_formats;
use image::RgbaImage;
use image::imageops::FilterType;
use std::path::Path;
use tracing::{debug, info};

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<RgbaImage> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !file_formats::is_image_extension(&extension) {
        return Err(BackendError::Other(format!(
            "Unsupported file format: {}",
            extension
        )));
    }

    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::IoError(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    info!(
        width = rgba.width(),
        height = rgba.height(),
        "Image loaded successfully"
    );
    Ok(rgba)
}

/// Resolutions offered for a source image: quarter, half, then native
///
/// Native is listed last so the best-resolution search has real work to do.
/// Variants that would collapse below one pixel are skipped.
pub fn advertised_resolutions(native: Resolution) -> Vec<Resolution> {
    let mut resolutions = Vec::with_capacity(3);
    for divisor in [4, 2] {
        let (w, h) = (native.width / divisor, native.height / divisor);
        if w > 0 && h > 0 {
            resolutions.push(Resolution::new(w, h));
        }
    }
    resolutions.push(native);
    resolutions
}

/// Scale the source image to a stream resolution
pub fn render_frame(source: &RgbaImage, resolution: Resolution) -> CapturedImage {
    let frame = if source.width() == resolution.width && source.height() == resolution.height {
        source.clone()
    } else {
        debug!(resolution = %resolution, "Scaling source image for stream");
        image::imageops::resize(
            source,
            resolution.width,
            resolution.height,
            FilterType::Triangle,
        )
    };

    CapturedImage::new(
        frame.width(),
        frame.height(),
        PixelFormat::RGBA,
        frame.into_raw(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertised_resolutions_end_with_native() {
        let list = advertised_resolutions(Resolution::new(1280, 960));
        assert_eq!(
            list,
            vec![
                Resolution::new(320, 240),
                Resolution::new(640, 480),
                Resolution::new(1280, 960),
            ]
        );
    }

    #[test]
    fn test_tiny_source_only_offers_native() {
        let list = advertised_resolutions(Resolution::new(1, 1));
        assert_eq!(list, vec![Resolution::new(1, 1)]);
    }

    #[test]
    fn test_render_frame_scales() {
        let source = RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]));
        let frame = render_frame(&source, Resolution::new(4, 2));
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(frame.data.len(), 4 * 2 * 4);
        assert_eq!(&frame.data[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let err = load_image_as_frame(Path::new("menu.txt")).unwrap_err();
        assert!(matches!(err, BackendError::Other(_)));
    }
}
