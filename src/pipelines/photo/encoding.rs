// SPDX-License-Identifier: GPL-3.0-only

//! Lossless still-image encoding
//!
//! Captured frames are stored as PNG so the vision model sees exactly the
//! pixels the camera produced. Encoding runs on the blocking pool.

use crate::backends::camera::types::{CapturedImage, PixelFormat};
use crate::errors::StorageError;
use image::{ExtendedColorType, ImageEncoder};
use tracing::{debug, info};

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingFormat {
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Png => "png",
        }
    }

    /// Mime type declared when the bytes are sent inline
    pub fn mime_type(&self) -> &'static str {
        match self {
            EncodingFormat::Png => crate::constants::vision::PNG_MIME_TYPE,
        }
    }
}

/// Encoded image data ready for saving
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodingFormat,
    pub width: u32,
    pub height: u32,
}

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    format: EncodingFormat,
}

impl PhotoEncoder {
    pub fn new() -> Self {
        Self {
            format: EncodingFormat::Png,
        }
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    /// Encode a captured frame asynchronously
    ///
    /// # Errors
    /// * `EncodeFailed` - buffer shorter than its geometry, encoder error,
    ///   or zero-length output
    pub async fn encode(&self, image: CapturedImage) -> Result<EncodedImage, StorageError> {
        info!(
            width = image.width,
            height = image.height,
            format = ?self.format,
            "Starting encoding"
        );

        let format = self.format;
        tokio::task::spawn_blocking(move || {
            let data = encode_png(&image)?;
            if data.is_empty() {
                return Err(StorageError::EncodeFailed(
                    "encoder produced no output".to_string(),
                ));
            }

            debug!(size = data.len(), "Encoding complete");

            Ok(EncodedImage {
                data,
                format,
                width: image.width,
                height: image.height,
            })
        })
        .await
        .map_err(|e| StorageError::EncodeFailed(format!("Encoding task error: {}", e)))?
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode image as PNG, dropping any row padding
fn encode_png(image: &CapturedImage) -> Result<Vec<u8>, StorageError> {
    if image.width == 0 || image.height == 0 {
        return Err(StorageError::EncodeFailed(format!(
            "empty frame {}x{}",
            image.width, image.height
        )));
    }

    let bpp = image.format.bytes_per_pixel() as usize;
    let row_len = image.width as usize * bpp;
    let stride = image.stride as usize;
    if stride < row_len || image.data.len() < image.expected_len() {
        return Err(StorageError::EncodeFailed(format!(
            "buffer of {} bytes does not hold a {}x{} {:?} frame",
            image.data.len(),
            image.width,
            image.height,
            image.format
        )));
    }

    let packed: Vec<u8> = if stride == row_len {
        image.data[..row_len * image.height as usize].to_vec()
    } else {
        image
            .data
            .chunks(stride)
            .take(image.height as usize)
            .flat_map(|row| &row[..row_len])
            .copied()
            .collect()
    };

    let color_type = match image.format {
        PixelFormat::RGBA => ExtendedColorType::Rgba8,
        PixelFormat::RGB24 => ExtendedColorType::Rgb8,
        PixelFormat::Gray8 => ExtendedColorType::L8,
    };

    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(&packed, image.width, image.height, color_type)
        .map_err(|e| StorageError::EncodeFailed(format!("PNG encoding failed: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_extension() {
        assert_eq!(EncodingFormat::Png.extension(), "png");
        assert_eq!(EncodingFormat::Png.mime_type(), "image/png");
    }

    #[tokio::test]
    async fn test_encode_produces_png_signature() {
        let image = CapturedImage::new(3, 2, PixelFormat::RGB24, vec![128u8; 18]);
        let encoded = PhotoEncoder::new().encode(image).await.unwrap();
        assert_eq!(&encoded.data[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!((encoded.width, encoded.height), (3, 2));
    }

    #[tokio::test]
    async fn test_short_buffer_fails() {
        let image = CapturedImage::new(4, 4, PixelFormat::RGBA, vec![0u8; 10]);
        let err = PhotoEncoder::new().encode(image).await.unwrap_err();
        assert!(matches!(err, StorageError::EncodeFailed(_)));
    }

    #[tokio::test]
    async fn test_zero_sized_frame_fails() {
        let image = CapturedImage::new(0, 0, PixelFormat::RGBA, Vec::<u8>::new());
        let err = PhotoEncoder::new().encode(image).await.unwrap_err();
        assert!(matches!(err, StorageError::EncodeFailed(_)));
    }

    #[test]
    fn test_padded_rows_are_packed() {
        let mut image = CapturedImage::new(1, 2, PixelFormat::Gray8, vec![7u8, 0, 9, 0]);
        image.stride = 2;
        let png = encode_png(&image).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.into_raw(), vec![7, 9]);
    }
}
