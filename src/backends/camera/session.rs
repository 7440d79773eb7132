// SPDX-License-Identifier: GPL-3.0-only

//! Camera session lifecycle
//!
//! A [`CaptureSession`] owns one camera handle and at most one continuous
//! capture stream on it:
//!
//! ```text
//! Unopened → Opening → Opened → Streaming → Closed
//!               │                   │
//!               └──────→ Failed ←───┘
//! ```
//!
//! `Failed` and `Closed` are terminal. A new session must be created to
//! try again.

use super::CameraBackend;
use super::types::*;
use crate::errors::CameraError;
use crate::utils::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`CaptureSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Opening,
    Opened,
    Streaming,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// An opened camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraHandle {
    pub device: DeviceId,
    pub camera: CameraInfo,
}

/// The active continuous capture stream of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStream {
    pub id: StreamId,
    pub device: DeviceId,
    pub resolution: Resolution,
}

/// Pick the resolution with the largest pixel area
///
/// Ties go to the first maximal entry. Returns `None` for an empty list.
pub fn select_best_resolution(resolutions: &[Resolution]) -> Option<Resolution> {
    let mut best: Option<Resolution> = None;
    for res in resolutions {
        match best {
            Some(current) if res.area() <= current.area() => {}
            _ => best = Some(*res),
        }
    }
    best
}

/// Owns the lifecycle of one camera handle and its capture stream
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    state: SessionState,
    handle: Option<CameraHandle>,
    stream: Option<CaptureStream>,
    preferred_eye: CameraEye,
    ready_timeout: Option<Duration>,
}

impl CaptureSession {
    /// Create an unopened session
    ///
    /// # Arguments
    /// * `backend` - Camera capability implementation
    /// * `ready_timeout` - Bound on the device and stream ready waits
    pub fn new(backend: Arc<dyn CameraBackend>, ready_timeout: Option<Duration>) -> Self {
        Self {
            backend,
            state: SessionState::Unopened,
            handle: None,
            stream: None,
            preferred_eye: CameraEye::default(),
            ready_timeout,
        }
    }

    /// Prefer the camera behind the given eye when several are listed
    pub fn with_preferred_eye(mut self, eye: CameraEye) -> Self {
        self.preferred_eye = eye;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handle(&self) -> Option<&CameraHandle> {
        self.handle.as_ref()
    }

    pub fn stream(&self) -> Option<&CaptureStream> {
        self.stream.as_ref()
    }

    /// Open the camera device
    ///
    /// # Errors
    /// * `UnsupportedDevice` - platform lacks a passthrough camera
    /// * `PermissionDenied` - permission missing; a request has been issued
    ///   and the caller must retry with a new session once it is granted
    /// * `NoCameraAvailable` - no camera with at least one resolution
    /// * `SessionOpenFailed` - device did not reach the ready state
    pub async fn open(&mut self) -> Result<CameraHandle, CameraError> {
        if self.state != SessionState::Unopened {
            return Err(CameraError::InvalidState(format!(
                "open called in state {:?}",
                self.state
            )));
        }
        self.state = SessionState::Opening;

        if !self.backend.is_supported() {
            return Err(self.fail(CameraError::UnsupportedDevice));
        }

        if !self.backend.has_permission() {
            info!("Camera permission missing, requesting it");
            self.backend.request_permission();
            return Err(self.fail(CameraError::PermissionDenied));
        }

        let Some(camera) = self.pick_camera() else {
            return Err(self.fail(CameraError::NoCameraAvailable));
        };

        info!(
            backend = self.backend.name(),
            camera = %camera.name,
            eye = %camera.eye,
            "Opening camera"
        );

        let opened = with_timeout(self.ready_timeout, self.backend.open_device(&camera)).await;
        let device = match opened {
            Ok(Ok(device)) => device,
            Ok(Err(e)) => {
                return Err(self.fail(CameraError::SessionOpenFailed(e.to_string())));
            }
            Err(_) => {
                return Err(self.fail(CameraError::SessionOpenFailed(format!(
                    "camera did not open within {:?}",
                    self.ready_timeout.unwrap_or_default()
                ))));
            }
        };

        let handle = CameraHandle { device, camera };
        self.handle = Some(handle.clone());
        self.state = SessionState::Opened;
        debug!(device = ?device, "Camera opened");
        Ok(handle)
    }

    /// Highest-area resolution of the handle's camera, first one on ties
    pub fn select_best_resolution(&self, handle: &CameraHandle) -> Option<Resolution> {
        select_best_resolution(&handle.camera.supported_resolutions)
    }

    /// Start the continuous capture stream
    ///
    /// On failure the session becomes `Failed` but keeps its handle: the
    /// caller still has to [`close`](Self::close) it.
    pub async fn start_stream(
        &mut self,
        handle: &CameraHandle,
        resolution: Resolution,
    ) -> Result<CaptureStream, CameraError> {
        if self.state != SessionState::Opened || self.stream.is_some() {
            return Err(CameraError::InvalidState(format!(
                "start_stream called in state {:?}",
                self.state
            )));
        }
        if self.handle.as_ref().map(|h| h.device) != Some(handle.device) {
            return Err(CameraError::InvalidState(
                "handle does not belong to this session".to_string(),
            ));
        }

        info!(resolution = %resolution, "Starting capture stream");

        let opened = with_timeout(
            self.ready_timeout,
            self.backend.open_stream(handle.device, resolution),
        )
        .await;

        let id = match opened {
            Ok(Ok(id)) => id,
            Ok(Err(e)) => {
                return Err(self.fail(CameraError::SessionOpenFailed(e.to_string())));
            }
            Err(_) => {
                return Err(self.fail(CameraError::SessionOpenFailed(format!(
                    "capture stream not ready within {:?}",
                    self.ready_timeout.unwrap_or_default()
                ))));
            }
        };

        let stream = CaptureStream {
            id,
            device: handle.device,
            resolution,
        };
        self.stream = Some(stream);
        self.state = SessionState::Streaming;
        Ok(stream)
    }

    /// Open the device, pick the best resolution and start streaming
    pub async fn open_and_stream(&mut self) -> Result<CaptureStream, CameraError> {
        let handle = self.open().await?;
        let resolution = self
            .select_best_resolution(&handle)
            .ok_or(CameraError::NoCameraAvailable)?;
        self.start_stream(&handle, resolution).await
    }

    /// Most recent frame of `stream`
    ///
    /// Frames read right after a trigger may be mid-transition; callers
    /// wait the settle delay first.
    pub fn current_frame(&self, stream: &CaptureStream) -> Result<CapturedImage, CameraError> {
        if self.state != SessionState::Streaming || self.stream.map(|s| s.id) != Some(stream.id) {
            return Err(CameraError::InvalidState(format!(
                "no active stream {:?} (session {:?})",
                stream.id, self.state
            )));
        }

        let frame = self
            .backend
            .latest_frame(stream.id)
            .map_err(|e| CameraError::FrameUnavailable(e.to_string()))?;

        debug!(
            width = frame.width,
            height = frame.height,
            format = ?frame.format,
            "Frame read from stream"
        );
        Ok(frame)
    }

    /// Release the stream and the device
    ///
    /// Idempotent: each resource is released at most once, later calls are
    /// no-ops. A failed session stays `Failed`.
    pub fn close(&mut self) {
        let stream = self.stream.take();
        let handle = self.handle.take();

        if let Some(stream) = stream {
            debug!(stream = ?stream.id, "Releasing capture stream");
            self.backend.release_stream(stream.id);
        }
        if let Some(handle) = handle {
            debug!(device = ?handle.device, "Releasing camera device");
            self.backend.release_device(handle.device);
        }

        if self.state != SessionState::Failed && self.state != SessionState::Closed {
            info!("Camera session closed");
            self.state = SessionState::Closed;
        }
    }

    fn pick_camera(&self) -> Option<CameraInfo> {
        let usable: Vec<CameraInfo> = self
            .backend
            .list_cameras()
            .into_iter()
            .filter(|c| !c.supported_resolutions.is_empty())
            .collect();

        let preferred = usable.iter().position(|c| c.eye == self.preferred_eye);
        let index = preferred.unwrap_or(0);
        usable.into_iter().nth(index)
    }

    fn fail(&mut self, err: CameraError) -> CameraError {
        warn!(error = %err, state = ?self.state, "Camera session failed");
        self.state = SessionState::Failed;
        err
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("handle", &self.handle.as_ref().map(|h| h.device))
            .field("stream", &self.stream.map(|s| s.id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        unsupported: bool,
        denied: bool,
        no_cameras: bool,
        stream_fails: bool,
        stream_hangs: bool,
        permission_requested: AtomicBool,
        stream_releases: AtomicUsize,
        device_releases: AtomicUsize,
        opened_resolution: Mutex<Option<Resolution>>,
    }

    #[async_trait]
    impl CameraBackend for FakeBackend {
        fn is_supported(&self) -> bool {
            !self.unsupported
        }

        fn has_permission(&self) -> bool {
            !self.denied
        }

        fn request_permission(&self) {
            self.permission_requested.store(true, Ordering::SeqCst);
        }

        fn list_cameras(&self) -> Vec<CameraInfo> {
            if self.no_cameras {
                return vec![CameraInfo {
                    id: "0".into(),
                    name: "empty".into(),
                    eye: CameraEye::Left,
                    supported_resolutions: vec![],
                }];
            }
            vec![
                CameraInfo {
                    id: "1".into(),
                    name: "right".into(),
                    eye: CameraEye::Right,
                    supported_resolutions: vec![Resolution::new(320, 240)],
                },
                CameraInfo {
                    id: "0".into(),
                    name: "left".into(),
                    eye: CameraEye::Left,
                    supported_resolutions: vec![
                        Resolution::new(640, 480),
                        Resolution::new(1280, 960),
                    ],
                },
            ]
        }

        async fn open_device(&self, _camera: &CameraInfo) -> BackendResult<DeviceId> {
            Ok(DeviceId(1))
        }

        async fn open_stream(
            &self,
            _device: DeviceId,
            resolution: Resolution,
        ) -> BackendResult<StreamId> {
            if self.stream_hangs {
                futures::future::pending::<()>().await;
            }
            if self.stream_fails {
                return Err(BackendError::InitializationFailed("no buffers".into()));
            }
            *self.opened_resolution.lock().unwrap() = Some(resolution);
            Ok(StreamId(7))
        }

        fn latest_frame(&self, _stream: StreamId) -> BackendResult<CapturedImage> {
            Ok(CapturedImage::new(2, 2, PixelFormat::RGBA, vec![255u8; 16]))
        }

        fn release_stream(&self, _stream: StreamId) {
            self.stream_releases.fetch_add(1, Ordering::SeqCst);
        }

        fn release_device(&self, _device: DeviceId) {
            self.device_releases.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn session_with(backend: FakeBackend) -> (Arc<FakeBackend>, CaptureSession) {
        let backend = Arc::new(backend);
        let session = CaptureSession::new(backend.clone(), Some(Duration::from_secs(1)));
        (backend, session)
    }

    #[test]
    fn test_select_best_resolution_first_max_wins() {
        let resolutions = [
            Resolution::new(640, 480),
            Resolution::new(1280, 720),
            Resolution::new(1280, 720),
        ];
        assert_eq!(
            select_best_resolution(&resolutions),
            Some(Resolution::new(1280, 720))
        );

        // Equal area, different shape: the earlier entry is kept
        let same_area = [Resolution::new(800, 600), Resolution::new(600, 800)];
        assert_eq!(
            select_best_resolution(&same_area),
            Some(Resolution::new(800, 600))
        );
        assert_eq!(select_best_resolution(&[]), None);
    }

    #[tokio::test]
    async fn test_open_and_stream_uses_preferred_eye_and_best_resolution() {
        let (backend, mut session) = session_with(FakeBackend::default());

        let stream = session.open_and_stream().await.unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(stream.resolution, Resolution::new(1280, 960));
        assert_eq!(session.handle().unwrap().camera.name, "left");
        assert_eq!(
            *backend.opened_resolution.lock().unwrap(),
            Some(Resolution::new(1280, 960))
        );

        let frame = session.current_frame(&stream).unwrap();
        assert_eq!(frame.width, 2);
    }

    #[tokio::test]
    async fn test_unsupported_device() {
        let (_, mut session) = session_with(FakeBackend {
            unsupported: true,
            ..Default::default()
        });
        assert_eq!(session.open().await, Err(CameraError::UnsupportedDevice));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_permission_denied_requests_permission() {
        let (backend, mut session) = session_with(FakeBackend {
            denied: true,
            ..Default::default()
        });
        assert_eq!(session.open().await, Err(CameraError::PermissionDenied));
        assert!(backend.permission_requested.load(Ordering::SeqCst));

        // Terminal: the same session cannot be reopened
        assert!(matches!(
            session.open().await,
            Err(CameraError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_no_camera_with_resolutions() {
        let (_, mut session) = session_with(FakeBackend {
            no_cameras: true,
            ..Default::default()
        });
        assert_eq!(session.open().await, Err(CameraError::NoCameraAvailable));
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_handle_for_caller() {
        let (backend, mut session) = session_with(FakeBackend {
            stream_fails: true,
            ..Default::default()
        });
        let handle = session.open().await.unwrap();
        let res = session.select_best_resolution(&handle).unwrap();
        let err = session.start_stream(&handle, res).await.unwrap_err();
        assert!(matches!(err, CameraError::SessionOpenFailed(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.handle().is_some());
        assert_eq!(backend.device_releases.load(Ordering::SeqCst), 0);

        session.close();
        assert_eq!(backend.device_releases.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_ready_wait_is_bounded() {
        let (_, mut session) = session_with(FakeBackend {
            stream_hangs: true,
            ..Default::default()
        });
        let err = session.open_and_stream().await.unwrap_err();
        assert!(matches!(err, CameraError::SessionOpenFailed(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (backend, mut session) = session_with(FakeBackend::default());
        session.open_and_stream().await.unwrap();

        session.close();
        session.close();
        drop(session);

        assert_eq!(backend.stream_releases.load(Ordering::SeqCst), 1);
        assert_eq!(backend.device_releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_frame_after_close_is_rejected() {
        let (_, mut session) = session_with(FakeBackend::default());
        let stream = session.open_and_stream().await.unwrap();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            session.current_frame(&stream),
            Err(CameraError::InvalidState(_))
        ));
    }
}
