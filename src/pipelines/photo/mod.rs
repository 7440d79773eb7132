// SPDX-License-Identifier: MPL-2.0

//! Still capture pipeline
//!
//! ```text
//! CaptureStream → settle delay → snapshot → PNG encode → capture slot
//! ```
//!
//! The stream stays open after a capture so the user can take another
//! shot without reopening the device.

pub mod encoding;

pub use encoding::{EncodedImage, EncodingFormat, PhotoEncoder};

use crate::backends::camera::types::CapturedImage;
use crate::backends::camera::{CaptureSession, CaptureStream};
use crate::errors::AppResult;
use crate::storage::{ImageRef, ImageStore};
use std::time::Duration;
use tracing::{debug, info};

/// Snapshot-and-persist step of the pipeline
#[derive(Debug, Clone)]
pub struct PhotoPipeline {
    store: ImageStore,
    settle_delay: Duration,
}

impl PhotoPipeline {
    pub fn new(store: ImageStore, settle_delay: Duration) -> Self {
        Self {
            store,
            settle_delay,
        }
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Take one frame from `stream` and save it to the capture slot
    ///
    /// # Arguments
    /// * `session` - Session that owns `stream`
    /// * `stream` - Active capture stream
    ///
    /// # Returns
    /// * `Ok(ImageRef)` - Reference to the persisted capture
    /// * `Err(AppError)` - Frame, encode or write failure
    pub async fn capture(
        &self,
        session: &CaptureSession,
        stream: &CaptureStream,
    ) -> AppResult<ImageRef> {
        let frame = self.grab_frame(session, stream).await?;
        self.persist(&frame).await
    }

    /// Wait for the settle delay, then snapshot the current frame
    ///
    /// The delay gives a freshly started stream time to produce a frame.
    pub async fn grab_frame(
        &self,
        session: &CaptureSession,
        stream: &CaptureStream,
    ) -> AppResult<CapturedImage> {
        if !self.settle_delay.is_zero() {
            debug!(delay_ms = self.settle_delay.as_millis() as u64, "Waiting for stream to settle");
            tokio::time::sleep(self.settle_delay).await;
        }

        let frame = session.current_frame(stream)?;
        debug!(
            width = frame.width,
            height = frame.height,
            format = ?frame.format,
            "Frame captured from stream"
        );
        Ok(frame)
    }

    /// Save a grabbed frame to the capture slot
    pub async fn persist(&self, frame: &CapturedImage) -> AppResult<ImageRef> {
        let reference = self.store.save(frame).await?;
        info!(path = %reference.path.display(), "Photo captured");
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::FileCameraBackend;
    use crate::errors::{AppError, CameraError};
    use image::RgbaImage;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_capture_persists_stream_frame() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FileCameraBackend::from_rgba(RgbaImage::from_pixel(
            16,
            8,
            image::Rgba([200, 100, 50, 255]),
        )));
        let mut session = CaptureSession::new(backend, None);
        let stream = session.open_and_stream().await.unwrap();

        let pipeline = PhotoPipeline::new(ImageStore::new(dir.path()), Duration::ZERO);
        let reference = pipeline.capture(&session, &stream).await.unwrap();

        assert_eq!((reference.width, reference.height), (16, 8));
        let pixels = pipeline.store().load_pixels(&reference).await.unwrap();
        assert_eq!(&pixels.data[..4], &[200, 100, 50, 255]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_waits_for_settle_delay() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FileCameraBackend::from_rgba(RgbaImage::new(4, 4)));
        let mut session = CaptureSession::new(backend, None);
        let stream = session.open_and_stream().await.unwrap();

        let pipeline = PhotoPipeline::new(ImageStore::new(dir.path()), Duration::from_millis(200));
        let started = tokio::time::Instant::now();
        pipeline.capture(&session, &stream).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_capture_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FileCameraBackend::from_rgba(RgbaImage::new(4, 4)));
        let mut session = CaptureSession::new(backend, None);
        let stream = session.open_and_stream().await.unwrap();
        session.close();

        let pipeline = PhotoPipeline::new(ImageStore::new(dir.path()), Duration::ZERO);
        let err = pipeline.capture(&session, &stream).await.unwrap_err();
        assert!(matches!(err, AppError::Camera(CameraError::InvalidState(_))));
    }
}
