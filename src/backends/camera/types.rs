// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices
    #[default]
    V4l2,
    /// A single image file replayed as a video stream
    StillImage,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::StillImage => write!(f, "still-image"),
        }
    }
}

/// Which way the camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Towards the user (selfie camera)
    User,
    /// Away from the user (rear camera), the usual choice for scanning
    #[default]
    Environment,
}

impl FacingMode {
    /// Whether a device reporting `location` ("front", "back", "external")
    /// satisfies this preference
    pub fn matches_location(&self, location: Option<&str>) -> bool {
        match (self, location) {
            (FacingMode::User, Some("front")) => true,
            (FacingMode::Environment, Some("back")) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
        }
    }
}

impl std::str::FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "front" => Ok(FacingMode::User),
            "environment" | "rear" | "back" => Ok(FacingMode::Environment),
            other => Err(format!("unknown facing mode '{}'", other)),
        }
    }
}

/// Request parameters for [`CameraSession::start`](super::CameraSession::start)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Facing preference; not binding when no device reports a location
    pub facing: FacingMode,
    /// Ideal frame width, the backend picks the closest supported size
    pub ideal_width: u32,
    /// Ideal frame height
    pub ideal_height: u32,
    /// Ideal framerate
    pub framerate: Option<u32>,
    /// Explicit device (path or backend specific id), overrides `facing`
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: crate::constants::DEFAULT_WIDTH,
            ideal_height: crate::constants::DEFAULT_HEIGHT,
            framerate: Some(crate::constants::DEFAULT_FRAMERATE),
            device: None,
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String,                    // Device node or source identifier
    pub driver: Option<String>,          // Kernel driver name (uvcvideo, ...)
    pub camera_location: Option<String>, // "front", "back" or "external"
}

/// Pick the device that best satisfies a capture request
///
/// An explicit device always wins; otherwise the first device matching the
/// facing preference, then the first device at all.
pub fn select_device<'a>(
    devices: &'a [CameraDevice],
    config: &CaptureConfig,
) -> Option<&'a CameraDevice> {
    if let Some(wanted) = config.device.as_deref() {
        return devices.iter().find(|d| d.path == wanted);
    }

    devices
        .iter()
        .find(|d| config.facing.matches_location(d.camera_location.as_deref()))
        .or_else(|| devices.first())
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    Rgba,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    Rgb24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    /// Common raw format from webcam sensors
    Yuyv,
    /// Motion JPEG, one complete JPEG image per frame
    Mjpeg,
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed formats
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Rgba => Some(4),
            Self::Rgb24 => Some(3),
            Self::Gray8 => Some(1),
            Self::Yuyv => Some(2),
            Self::Mjpeg => None,
        }
    }

    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpeg),
            b"GREY" => Some(Self::Gray8),
            b"RGB3" => Some(Self::Rgb24),
            b"AB24" => Some(Self::Rgba),
            _ => None,
        }
    }

    /// V4L2 FourCC code for this format
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Rgba => *b"AB24",
            Self::Rgb24 => *b"RGB3",
            Self::Gray8 => *b"GREY",
            Self::Yuyv => *b"YUYV",
            Self::Mjpeg => *b"MJPG",
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Raw frame bytes, shared between subscribers
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding, 0 for compressed formats)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
    /// Monotonic frame counter within one stream
    pub sequence: u64,
}

impl CameraFrame {
    /// Build a tightly packed frame (stride derived from the format)
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        let stride = format
            .bytes_per_pixel()
            .map(|bpp| width * bpp as u32)
            .unwrap_or(0);
        Self {
            width,
            height,
            data: Arc::from(data),
            format,
            stride,
            captured_at: Instant::now(),
            sequence: 0,
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Access to the device was refused
    PermissionDenied(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Device is held by another process
    DeviceBusy(String),
    /// No usable format could be negotiated
    FormatNotSupported(String),
    /// Device went away while streaming
    Disconnected(String),
    /// General I/O error
    Io(String),
    /// Other errors
    Other(String),
}

impl BackendError {
    /// Classify an OS error raised while opening or streaming a device
    pub fn from_io(context: &str, err: &std::io::Error) -> Self {
        let message = format!("{}: {}", context, err);
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => BackendError::PermissionDenied(message),
            Some(libc::EBUSY) => BackendError::DeviceBusy(message),
            Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => {
                BackendError::DeviceNotFound(message)
            }
            _ => match err.kind() {
                std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(message),
                std::io::ErrorKind::NotFound => BackendError::DeviceNotFound(message),
                _ => BackendError::Io(message),
            },
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::DeviceBusy(msg) => write!(f, "Device busy: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Disconnected(msg) => write!(f, "Device disconnected: {}", msg),
            BackendError::Io(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(msg: String) -> Self {
        BackendError::Other(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(path: &str, location: Option<&str>) -> CameraDevice {
        CameraDevice {
            name: path.to_string(),
            path: path.to_string(),
            driver: None,
            camera_location: location.map(str::to_string),
        }
    }

    #[test]
    fn select_device_prefers_facing_then_first() {
        let devices = vec![
            device("/dev/video0", Some("front")),
            device("/dev/video2", Some("back")),
        ];

        let rear = select_device(&devices, &CaptureConfig::default()).unwrap();
        assert_eq!(rear.path, "/dev/video2");

        let front = select_device(
            &devices,
            &CaptureConfig {
                facing: FacingMode::User,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(front.path, "/dev/video0");

        let unknown = vec![device("/dev/video4", Some("external"))];
        let fallback = select_device(&unknown, &CaptureConfig::default()).unwrap();
        assert_eq!(fallback.path, "/dev/video4");
    }

    #[test]
    fn explicit_device_must_exist() {
        let devices = vec![device("/dev/video0", None)];
        let config = CaptureConfig {
            device: Some("/dev/video9".into()),
            ..Default::default()
        };
        assert!(select_device(&devices, &config).is_none());
    }

    #[test]
    fn io_errors_are_classified() {
        let denied = std::io::Error::from_raw_os_error(libc::EACCES);
        assert!(matches!(
            BackendError::from_io("open", &denied),
            BackendError::PermissionDenied(_)
        ));

        let busy = std::io::Error::from_raw_os_error(libc::EBUSY);
        assert!(matches!(
            BackendError::from_io("stream", &busy),
            BackendError::DeviceBusy(_)
        ));

        let gone = std::io::Error::from_raw_os_error(libc::ENODEV);
        assert!(matches!(
            BackendError::from_io("read", &gone),
            BackendError::DeviceNotFound(_)
        ));
    }

    #[test]
    fn fourcc_round_trips_for_known_formats() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), Some(PixelFormat::Mjpeg));
        assert_eq!(PixelFormat::from_fourcc(b"H264"), None);
        assert_eq!(&PixelFormat::Yuyv.fourcc(), b"YUYV");
    }
}
