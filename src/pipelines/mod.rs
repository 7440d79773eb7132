// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines
//!
//! Heavy work (frame encoding, disk I/O) runs off the async executor so the
//! controller stays responsive while a capture is in flight.
//!
//! # Modules
//!
//! - [`photo`]: Snapshot a stream frame and persist it as PNG

pub mod photo;
