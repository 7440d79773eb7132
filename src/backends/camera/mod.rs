// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! The passthrough camera is an external collaborator. This module pins
//! down the narrow capability contract the pipeline needs from it and
//! wraps that contract in a [`CaptureSession`] that owns the lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ PipelineController  │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← Lifecycle, timeouts, release-once
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴──────┐
//!       ▼           ▼
//!   Headset     Virtual (still image)
//! ```

pub mod session;
pub mod types;

pub use session::{
    CameraHandle, CaptureSession, CaptureStream, SessionState, select_best_resolution,
};
pub use types::*;

use async_trait::async_trait;

/// Camera capability contract
///
/// Implementations wrap the platform camera service. Device and stream
/// opening are the only suspension points; everything else answers
/// synchronously.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    // ===== Capability =====

    /// Whether the platform exposes a passthrough camera at all
    fn is_supported(&self) -> bool;

    /// Whether the OS-level camera permission has been granted
    fn has_permission(&self) -> bool;

    /// Ask the OS for the camera permission
    ///
    /// Fire-and-forget: the outcome is observed through a later
    /// [`has_permission`](Self::has_permission) poll.
    fn request_permission(&self);

    /// Enumerate cameras with their supported resolutions
    fn list_cameras(&self) -> Vec<CameraInfo>;

    // ===== Lifecycle =====

    /// Open a device and wait until it is ready
    async fn open_device(&self, camera: &CameraInfo) -> BackendResult<DeviceId>;

    /// Start a continuous capture stream and wait until it is ready
    async fn open_stream(&self, device: DeviceId, resolution: Resolution)
    -> BackendResult<StreamId>;

    /// Snapshot of the most recent frame produced by `stream`
    fn latest_frame(&self, stream: StreamId) -> BackendResult<CapturedImage>;

    /// Release a stream. Unknown tokens are ignored.
    fn release_stream(&self, stream: StreamId);

    /// Release a device. Unknown tokens are ignored.
    fn release_device(&self, device: DeviceId);

    // ===== Metadata =====

    /// Short backend name for logs
    fn name(&self) -> &str;
}
