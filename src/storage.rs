// SPDX-License-Identifier: MPL-2.0

//! Storage for the captured still image
//!
//! One outstanding capture at a time: every save overwrites the same
//! well-known file in an app-scoped directory, and the returned
//! [`ImageRef`] is what the later stages pass around instead of pixels.

use crate::backends::camera::types::{CapturedImage, PixelFormat};
use crate::constants::storage::{APP_DIR_NAME, CAPTURE_FILE_STEM};
use crate::errors::StorageError;
use crate::pipelines::photo::{EncodingFormat, PhotoEncoder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Stable reference to a persisted capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: PathBuf,
    /// Content id of the snapshot that was written
    pub image_id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
}

impl ImageRef {
    /// Reference an existing image file, e.g. one supplied on the command line
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image_id: Uuid::new_v4(),
            captured_at: Utc::now(),
            width: 0,
            height: 0,
        }
    }
}

/// Persists captured frames to the fixed capture slot
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    encoder: PhotoEncoder,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            encoder: PhotoEncoder::new(),
        }
    }

    /// App-scoped data directory: `<data_local_dir>/sazon`
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("data").join(APP_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the well-known capture slot
    pub fn slot_path(&self) -> PathBuf {
        self.dir.join(self.slot_file_name())
    }

    /// Format captures are stored in
    pub fn format(&self) -> EncodingFormat {
        self.encoder.format()
    }

    fn slot_file_name(&self) -> String {
        format!("{}.{}", CAPTURE_FILE_STEM, self.format().extension())
    }

    /// Encode `image` losslessly and overwrite the capture slot
    ///
    /// The file is written next to the slot and renamed over it, so a
    /// reader never observes a half-written capture.
    ///
    /// # Errors
    /// * `EncodeFailed` - the frame could not be encoded
    /// * `WriteFailed` - directory creation, write or rename failed
    pub async fn save(&self, image: &CapturedImage) -> Result<ImageRef, StorageError> {
        let encoded = self.encoder.encode(image.clone()).await?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.slot_path();
        let partial = self.dir.join(format!(".{}.partial", self.slot_file_name()));

        let written = match tokio::fs::write(&partial, &encoded.data).await {
            Ok(()) => tokio::fs::rename(&partial, &path)
                .await
                .map_err(|e| StorageError::WriteFailed(format!("{}: {}", path.display(), e))),
            Err(e) => Err(StorageError::WriteFailed(format!(
                "{}: {}",
                partial.display(),
                e
            ))),
        };
        if let Err(err) = written {
            // Never leave a half-written capture behind
            if let Err(e) = tokio::fs::remove_file(&partial).await {
                debug!(path = %partial.display(), error = %e, "No partial capture to remove");
            }
            return Err(err);
        }

        info!(
            path = %path.display(),
            size = encoded.data.len(),
            "Capture saved"
        );

        Ok(ImageRef {
            path,
            image_id: image.id,
            captured_at: image.captured_at,
            width: encoded.width,
            height: encoded.height,
        })
    }

    /// Read the encoded bytes behind `reference`
    ///
    /// # Errors
    /// * `NotFound` - the reference no longer resolves to a readable file
    pub async fn load(&self, reference: &ImageRef) -> Result<Vec<u8>, StorageError> {
        let bytes = tokio::fs::read(&reference.path).await.map_err(|e| {
            debug!(path = %reference.path.display(), error = %e, "Capture not readable");
            StorageError::NotFound(reference.path.clone())
        })?;
        debug!(path = %reference.path.display(), size = bytes.len(), "Capture loaded");
        Ok(bytes)
    }

    /// Load and decode the capture back into RGBA pixels
    pub async fn load_pixels(&self, reference: &ImageRef) -> Result<CapturedImage, StorageError> {
        let bytes = self.load(reference).await?;
        let path = reference.path.clone();

        let rgba = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(|img| img.to_rgba8())
                .map_err(|e| {
                    debug!(path = %path.display(), error = %e, "Capture not decodable");
                    StorageError::NotFound(path)
                })
        })
        .await
        .map_err(|_| StorageError::NotFound(reference.path.clone()))??;

        let mut image = CapturedImage::new(
            rgba.width(),
            rgba.height(),
            PixelFormat::RGBA,
            rgba.into_raw(),
        );
        image.id = reference.image_id;
        image.captured_at = reference.captured_at;
        Ok(image)
    }
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard() -> CapturedImage {
        let mut data = Vec::with_capacity(4 * 4 * 4);
        for i in 0..16u8 {
            let v = if i % 2 == 0 { 255 } else { 0 };
            data.extend_from_slice(&[v, i * 10, 255 - v, 255]);
        }
        CapturedImage::new(4, 4, PixelFormat::RGBA, data)
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let image = checkerboard();

        let reference = store.save(&image).await.unwrap();
        assert_eq!(reference.path, dir.path().join("captured_image.png"));
        assert_eq!(reference.image_id, image.id);

        let bytes = store.load(&reference).await.unwrap();
        let on_disk = std::fs::read(&reference.path).unwrap();
        assert_eq!(bytes, on_disk);

        let decoded = store.load_pixels(&reference).await.unwrap();
        assert_eq!(decoded.data.as_ref(), image.data.as_ref());
        assert_eq!((decoded.width, decoded.height), (4, 4));
    }

    #[tokio::test]
    async fn test_save_overwrites_fixed_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());

        let first = store.save(&checkerboard()).await.unwrap();
        let second_image = CapturedImage::new(2, 1, PixelFormat::RGB24, vec![1u8; 6]);
        let second = store.save(&second_image).await.unwrap();

        assert_eq!(first.path, second.path);
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);

        let decoded = store.load_pixels(&second).await.unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 1));
    }

    #[tokio::test]
    async fn test_load_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let reference = ImageRef::from_path(dir.path().join("gone.png"));

        let err = store.load(&reference).await.unwrap_err();
        assert_eq!(err, StorageError::NotFound(reference.path.clone()));
    }

    #[tokio::test]
    async fn test_encode_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("captures"));
        let broken = CapturedImage::new(8, 8, PixelFormat::RGBA, vec![0u8; 3]);

        let err = store.save(&broken).await.unwrap_err();
        assert!(matches!(err, StorageError::EncodeFailed(_)));
        assert!(!store.slot_path().exists());
    }

    #[tokio::test]
    async fn test_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        // A regular file where the directory should be
        let store = ImageStore::new(blocker.join("nested"));

        let err = store.save(&checkerboard()).await.unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed(_)));
    }

    #[tokio::test]
    async fn test_failed_rename_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        // A non-empty directory in the slot makes the rename fail
        std::fs::create_dir_all(store.slot_path().join("occupied")).unwrap();

        let err = store.save(&checkerboard()).await.unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed(_)));

        let mut names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["captured_image.png".to_string()]);
        assert!(store.slot_path().is_dir());
    }
}
