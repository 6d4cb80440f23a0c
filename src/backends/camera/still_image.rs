// SPDX-License-Identifier: GPL-3.0-only

//! Still image backend
//!
//! Replays one image file as a camera stream. Used for decoding codes from
//! files and for running the scanner without hardware.

use super::permission::{AlwaysGranted, PermissionProvider};
use super::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, CameraFrame, CaptureConfig,
    PixelFormat,
};
use super::{CameraBackend, FrameStream};
use crate::constants::STILL_IMAGE_FRAME_INTERVAL;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    let image = image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => BackendError::from_io(&path.display().to_string(), &io),
        other => BackendError::FormatNotSupported(format!("{}: {}", path.display(), other)),
    })?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(CameraFrame::packed(
        width,
        height,
        PixelFormat::Rgba,
        rgba.into_raw(),
    ))
}

/// Backend whose only device is an image file
#[derive(Debug, Clone)]
pub struct StillImageBackend {
    path: PathBuf,
    frame_interval: Duration,
}

impl StillImageBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame_interval: STILL_IMAGE_FRAME_INTERVAL,
        }
    }

    fn device(&self) -> CameraDevice {
        CameraDevice {
            name: self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "image".to_string()),
            path: self.path.display().to_string(),
            driver: Some("still-image".to_string()),
            camera_location: None,
        }
    }
}

impl CameraBackend for StillImageBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::StillImage
    }

    fn is_available(&self) -> bool {
        self.path.is_file()
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        if self.is_available() {
            vec![self.device()]
        } else {
            Vec::new()
        }
    }

    fn permission_provider(&self, _config: &CaptureConfig) -> Arc<dyn PermissionProvider> {
        Arc::new(AlwaysGranted)
    }

    fn open(&self, _config: &CaptureConfig) -> BackendResult<Box<dyn FrameStream>> {
        let frame = load_image_as_frame(&self.path)?;
        info!(
            path = %self.path.display(),
            width = frame.width,
            height = frame.height,
            "Opened still image source"
        );

        Ok(Box::new(StillImageStream {
            device: self.device(),
            frame,
            interval: self.frame_interval,
            sequence: 0,
        }))
    }
}

struct StillImageStream {
    device: CameraDevice,
    frame: CameraFrame,
    interval: Duration,
    sequence: u64,
}

impl FrameStream for StillImageStream {
    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        std::thread::sleep(self.interval);
        self.sequence += 1;

        // Shares the pixel buffer, only the timing changes
        let mut frame = self.frame.clone();
        frame.captured_at = Instant::now();
        frame.sequence = self.sequence;
        Ok(frame)
    }

    fn device(&self) -> &CameraDevice {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn loads_image_file_as_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.png");
        GrayImage::from_fn(8, 4, |x, _| Luma([(x * 30) as u8]))
            .save(&path)
            .unwrap();

        let frame = load_image_as_frame(&path).unwrap();
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(frame.format, PixelFormat::Rgba);
        assert_eq!(frame.stride, 32);
        assert_eq!(&frame.data[4..8], &[30, 30, 30, 255]);
    }

    #[test]
    fn missing_file_is_device_not_found() {
        let backend = StillImageBackend::new("/nonexistent/code.png");
        assert!(!backend.is_available());
        assert!(backend.enumerate_cameras().is_empty());

        let err = match backend.open(&CaptureConfig::default()) {
            Ok(_) => panic!("missing file must not open"),
            Err(e) => e,
        };
        assert!(matches!(err, BackendError::DeviceNotFound(_)));
    }

    #[test]
    fn stream_repeats_the_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("white.png");
        GrayImage::from_pixel(4, 4, Luma([255])).save(&path).unwrap();

        let backend = StillImageBackend::new(&path);
        let mut stream = backend.open(&CaptureConfig::default()).unwrap();
        let first = stream.next_frame().unwrap();
        let second = stream.next_frame().unwrap();

        assert_eq!(second.sequence, first.sequence + 1);
        assert!(second.captured_at >= first.captured_at);
        assert!(Arc::ptr_eq(&first.data, &second.data));
        assert_eq!(stream.device().driver.as_deref(), Some("still-image"));
    }
}
