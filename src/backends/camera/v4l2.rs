// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux2 capture backend
//!
//! Devices are found through `/dev/video*` nodes with the capture
//! capability. Opening negotiates MJPEG first (needed for 720p at full rate
//! over USB 2) and falls back to YUYV, then streams through memory-mapped
//! buffers. The whole [`V4l2Stream`] lives on the capture thread.

use super::permission::{DeviceNodePermission, PermissionProvider};
use super::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, CameraFrame, CaptureConfig,
    PixelFormat, select_device,
};
use super::{CameraBackend, FrameStream};
use crate::constants::{V4L2_BUFFER_COUNT, V4L2_MAX_CONSECUTIVE_ERRORS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;

/// Formats tried in order of preference
const PREFERRED_FORMATS: [PixelFormat; 2] = [PixelFormat::Mjpeg, PixelFormat::Yuyv];

/// V4L2 camera backend
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for V4l2Backend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        std::path::Path::new("/sys/class/video4linux").exists()
    }

    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        let mut devices: Vec<CameraDevice> = v4l::context::enum_devices()
            .into_iter()
            .filter_map(|node| {
                let path = node.path().to_string_lossy().to_string();
                probe_device(&path, node.name())
            })
            .collect();
        devices.sort_by(|a, b| a.path.cmp(&b.path));

        info!(count = devices.len(), "Enumerated V4L2 cameras");
        devices
    }

    fn permission_provider(&self, config: &CaptureConfig) -> Arc<dyn PermissionProvider> {
        let path = config
            .device
            .clone()
            .or_else(|| {
                select_device(&self.enumerate_cameras(), config).map(|d| d.path.clone())
            })
            .unwrap_or_else(|| "/dev/video0".to_string());
        Arc::new(DeviceNodePermission::new(path))
    }

    fn open(&self, config: &CaptureConfig) -> BackendResult<Box<dyn FrameStream>> {
        let devices = self.enumerate_cameras();
        let device = match select_device(&devices, config) {
            Some(device) => device.clone(),
            // An explicit path that did not enumerate is still worth a try,
            // the open error says why it is unusable
            None => match config.device.as_deref() {
                Some(path) => CameraDevice {
                    name: path.to_string(),
                    path: path.to_string(),
                    driver: None,
                    camera_location: None,
                },
                None => {
                    return Err(BackendError::DeviceNotFound(
                        "no V4L2 capture device present".into(),
                    ));
                }
            },
        };

        V4l2Stream::open(device, config).map(|stream| Box::new(stream) as Box<dyn FrameStream>)
    }
}

/// Read capabilities of a node, keeping capture devices only
///
/// Nodes that cannot be opened for lack of permission are still listed so a
/// later start reports permission-denied instead of no-device.
fn probe_device(path: &str, node_name: Option<String>) -> Option<CameraDevice> {
    let dev = match Device::with_path(path) {
        Ok(dev) => dev,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            debug!(path, "No access to video node, listing it anyway");
            let name = node_name.unwrap_or_else(|| path.to_string());
            return Some(CameraDevice {
                camera_location: location_from_name(&name),
                name,
                path: path.to_string(),
                driver: None,
            });
        }
        Err(e) => {
            debug!(path, error = %e, "Skipping unopenable video node");
            return None;
        }
    };

    let caps = dev.query_caps().ok()?;
    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        debug!(path, card = %caps.card, "Skipping node without capture capability");
        return None;
    }
    // Metadata nodes of UVC cameras advertise capture but have no formats
    if dev.enum_formats().map(|f| f.is_empty()).unwrap_or(true) {
        return None;
    }

    Some(CameraDevice {
        camera_location: location_from_name(&caps.card),
        name: caps.card,
        path: path.to_string(),
        driver: Some(caps.driver),
    })
}

/// Guess where a camera sits from its card name
fn location_from_name(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    if lower.contains("front") || lower.contains("user") {
        Some("front".to_string())
    } else if lower.contains("rear") || lower.contains("back") || lower.contains("world") {
        Some("back".to_string())
    } else {
        None
    }
}

/// An open, streaming V4L2 device
pub struct V4l2Stream {
    // Declared before `_dev` so buffers are released before the node closes
    stream: MmapStream<'static>,
    _dev: Device,
    device: CameraDevice,
    format: PixelFormat,
    width: u32,
    height: u32,
    stride: u32,
    consecutive_errors: u32,
}

impl V4l2Stream {
    fn open(device: CameraDevice, config: &CaptureConfig) -> BackendResult<Self> {
        info!(path = %device.path, name = %device.name, "Opening V4L2 device");

        let dev = Device::with_path(&device.path)
            .map_err(|e| BackendError::from_io(&device.path, &e))?;

        let supported: Vec<[u8; 4]> = dev
            .enum_formats()
            .map_err(|e| BackendError::from_io("enumerate formats", &e))?
            .into_iter()
            .map(|desc| desc.fourcc.repr)
            .collect();
        let wanted = PREFERRED_FORMATS
            .iter()
            .find(|f| supported.contains(&f.fourcc()))
            .copied()
            .or_else(|| supported.iter().find_map(PixelFormat::from_fourcc))
            .ok_or_else(|| {
                BackendError::FormatNotSupported(format!(
                    "{} offers none of MJPG, YUYV, GREY, RGB3",
                    device.path
                ))
            })?;

        let mut format = dev
            .format()
            .map_err(|e| BackendError::from_io("query format", &e))?;
        format.width = config.ideal_width;
        format.height = config.ideal_height;
        format.fourcc = v4l::FourCC::new(&wanted.fourcc());

        let actual = dev
            .set_format(&format)
            .map_err(|e| BackendError::from_io("set format", &e))?;
        let pixel_format = PixelFormat::from_fourcc(&actual.fourcc.repr).ok_or_else(|| {
            BackendError::FormatNotSupported(format!("driver chose {}", actual.fourcc))
        })?;
        info!(
            width = actual.width,
            height = actual.height,
            fourcc = %actual.fourcc,
            "Negotiated V4L2 format"
        );

        if let Some(fps) = config.framerate
            && let Err(e) = dev.set_params(&Parameters::with_fps(fps))
        {
            warn!(fps, error = %e, "Could not set framerate, using device default");
        }

        let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, V4L2_BUFFER_COUNT)
            .map_err(|e| BackendError::from_io("start streaming", &e))?;

        Ok(Self {
            stream,
            _dev: dev,
            device,
            format: pixel_format,
            width: actual.width,
            height: actual.height,
            stride: if pixel_format == PixelFormat::Mjpeg {
                0
            } else {
                actual.stride
            },
            consecutive_errors: 0,
        })
    }
}

impl FrameStream for V4l2Stream {
    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        loop {
            match self.stream.next() {
                Ok((buf, meta)) => {
                    self.consecutive_errors = 0;
                    let used = match meta.bytesused as usize {
                        0 => buf.len(),
                        n => n.min(buf.len()),
                    };

                    return Ok(CameraFrame {
                        width: self.width,
                        height: self.height,
                        data: Arc::from(&buf[..used]),
                        format: self.format,
                        stride: self.stride,
                        captured_at: Instant::now(),
                        sequence: meta.sequence as u64,
                    });
                }
                Err(e) if e.raw_os_error() == Some(libc::ENODEV) => {
                    return Err(BackendError::Disconnected(format!(
                        "{}: {}",
                        self.device.path, e
                    )));
                }
                Err(e) => {
                    self.consecutive_errors += 1;
                    warn!(
                        error = %e,
                        attempt = self.consecutive_errors,
                        "Failed to dequeue V4L2 buffer"
                    );
                    if self.consecutive_errors >= V4L2_MAX_CONSECUTIVE_ERRORS {
                        return Err(BackendError::from_io(&self.device.path, &e));
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }

    fn device(&self) -> &CameraDevice {
        &self.device
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        info!(path = %self.device.path, "Releasing V4L2 device");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_heuristic() {
        assert_eq!(location_from_name("Front Camera").as_deref(), Some("front"));
        assert_eq!(location_from_name("imx363 rear").as_deref(), Some("back"));
        assert_eq!(location_from_name("HD Pro Webcam C920"), None);
    }

    #[test]
    fn explicit_missing_device_fails_to_open() {
        let config = CaptureConfig {
            device: Some("/dev/definitely-not-a-camera-node".into()),
            ..Default::default()
        };
        let err = match V4l2Backend::new().open(&config) {
            Ok(_) => panic!("opening a missing node must fail"),
            Err(e) => e,
        };
        assert!(matches!(err, BackendError::DeviceNotFound(_)));
    }
}
