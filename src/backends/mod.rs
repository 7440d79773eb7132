// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! # Modules
//!
//! - [`camera`]: Capability contract, shared types and the capture session
//! - [`virtual_camera`]: Still-image backend used without headset hardware

pub mod camera;
pub mod virtual_camera;
