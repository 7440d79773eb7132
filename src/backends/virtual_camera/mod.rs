// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend serving a still image
//!
//! Stands in for the headset passthrough camera when no hardware is
//! around: the CLI and the integration tests drive the full pipeline
//! against it.
//!
//! ```text
//!  image file ──decode──▶ RGBA source
//!                              │
//!           open_stream(res) ──┴──▶ scaled frame per stream
//! ```

mod file_source;

pub use file_source::{advertised_resolutions, load_image_as_frame, render_frame};

use crate::backends::camera::CameraBackend;
use crate::backends::camera::types::*;
use async_trait::async_trait;
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Camera backend backed by a decoded still image
pub struct FileCameraBackend {
    source: RgbaImage,
    supported: bool,
    permission_granted: AtomicBool,
    next_token: AtomicU64,
    devices: Mutex<HashSet<DeviceId>>,
    /// Frame rendered for each open stream
    streams: Mutex<HashMap<StreamId, CapturedImage>>,
}

impl FileCameraBackend {
    /// Decode `path` and serve it as both headset cameras
    pub fn from_image(path: &Path) -> BackendResult<Self> {
        Ok(Self::from_rgba(load_image_as_frame(path)?))
    }

    pub fn from_rgba(source: RgbaImage) -> Self {
        Self {
            source,
            supported: true,
            permission_granted: AtomicBool::new(true),
            next_token: AtomicU64::new(1),
            devices: Mutex::new(HashSet::new()),
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Start without the camera permission; `request_permission` grants it
    pub fn without_permission(self) -> Self {
        self.permission_granted.store(false, Ordering::SeqCst);
        self
    }

    /// Report the platform as lacking a passthrough camera
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn native_resolution(&self) -> Resolution {
        Resolution::new(self.source.width(), self.source.height())
    }

    /// Number of devices currently open
    pub fn open_devices(&self) -> usize {
        self.devices.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Number of streams currently open
    pub fn open_streams(&self) -> usize {
        self.streams.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn next_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraBackend for FileCameraBackend {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn has_permission(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    fn request_permission(&self) {
        // No OS prompt to wait for; the grant is visible on the next poll
        info!("Granting virtual camera permission");
        self.permission_granted.store(true, Ordering::SeqCst);
    }

    fn list_cameras(&self) -> Vec<CameraInfo> {
        let resolutions = advertised_resolutions(self.native_resolution());
        [CameraEye::Left, CameraEye::Right]
            .into_iter()
            .map(|eye| CameraInfo {
                id: format!("virtual-{}", eye),
                name: format!("Virtual camera ({})", eye),
                eye,
                supported_resolutions: resolutions.clone(),
            })
            .collect()
    }

    async fn open_device(&self, camera: &CameraInfo) -> BackendResult<DeviceId> {
        let device = DeviceId(self.next_token());
        self.devices
            .lock()
            .map_err(|_| BackendError::Other("device table poisoned".into()))?
            .insert(device);
        debug!(camera = %camera.id, device = ?device, "Virtual device opened");
        Ok(device)
    }

    async fn open_stream(
        &self,
        device: DeviceId,
        resolution: Resolution,
    ) -> BackendResult<StreamId> {
        let known = self
            .devices
            .lock()
            .map_err(|_| BackendError::Other("device table poisoned".into()))?
            .contains(&device);
        if !known {
            return Err(BackendError::DeviceNotFound(format!("{:?}", device)));
        }
        if !advertised_resolutions(self.native_resolution()).contains(&resolution) {
            return Err(BackendError::FormatNotSupported(resolution.to_string()));
        }

        // Resize off the async executor
        let source = self.source.clone();
        let frame = tokio::task::spawn_blocking(move || render_frame(&source, resolution))
            .await
            .map_err(|e| BackendError::Other(format!("Render task error: {}", e)))?;

        let stream = StreamId(self.next_token());
        self.streams
            .lock()
            .map_err(|_| BackendError::Other("stream table poisoned".into()))?
            .insert(stream, frame);
        debug!(stream = ?stream, resolution = %resolution, "Virtual stream opened");
        Ok(stream)
    }

    fn latest_frame(&self, stream: StreamId) -> BackendResult<CapturedImage> {
        let streams = self
            .streams
            .lock()
            .map_err(|_| BackendError::Other("stream table poisoned".into()))?;
        let frame = streams
            .get(&stream)
            .ok_or_else(|| BackendError::DeviceNotFound(format!("{:?}", stream)))?;

        // Every read is a fresh snapshot of the same still image
        Ok(CapturedImage::new(
            frame.width,
            frame.height,
            frame.format,
            frame.data.clone(),
        ))
    }

    fn release_stream(&self, stream: StreamId) {
        match self.streams.lock() {
            Ok(mut streams) => {
                if streams.remove(&stream).is_none() {
                    debug!(stream = ?stream, "Release of unknown stream ignored");
                }
            }
            Err(_) => warn!("Stream table poisoned during release"),
        }
    }

    fn release_device(&self, device: DeviceId) {
        match self.devices.lock() {
            Ok(mut devices) => {
                if !devices.remove(&device) {
                    debug!(device = ?device, "Release of unknown device ignored");
                }
            }
            Err(_) => warn!("Device table poisoned during release"),
        }
    }

    fn name(&self) -> &str {
        "virtual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{CaptureSession, SessionState};
    use std::sync::Arc;

    fn backend() -> FileCameraBackend {
        FileCameraBackend::from_rgba(RgbaImage::from_pixel(64, 48, image::Rgba([1, 2, 3, 255])))
    }

    #[tokio::test]
    async fn test_session_streams_native_resolution() {
        let backend = Arc::new(backend());
        let mut session = CaptureSession::new(backend.clone(), None);

        let stream = session.open_and_stream().await.unwrap();
        assert_eq!(stream.resolution, Resolution::new(64, 48));
        assert_eq!(backend.open_devices(), 1);
        assert_eq!(backend.open_streams(), 1);

        let first = session.current_frame(&stream).unwrap();
        let second = session.current_frame(&stream).unwrap();
        assert_eq!(first.data.len(), 64 * 48 * 4);
        assert_ne!(first.id, second.id);

        session.close();
        assert_eq!(backend.open_devices(), 0);
        assert_eq!(backend.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_permission_flow_requires_new_session() {
        let backend = Arc::new(backend().without_permission());

        let mut first = CaptureSession::new(backend.clone(), None);
        assert!(first.open().await.is_err());
        assert_eq!(first.state(), SessionState::Failed);

        // The grant is visible now; a fresh session succeeds
        let mut second = CaptureSession::new(backend.clone(), None);
        assert!(second.open().await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_unadvertised_resolution() {
        let backend = backend();
        let device = backend.open_device(&backend.list_cameras()[0]).await.unwrap();
        let err = backend
            .open_stream(device, Resolution::new(1920, 1080))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::FormatNotSupported(_)));
    }
}
