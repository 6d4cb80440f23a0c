// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Scanner / consumer │  ← sees only the FrameSource trait
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    CameraSession    │  ← Lifecycle, permission, frame fan-out
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴───────┐
//!       ▼            ▼
//!   ┌──────┐   ┌───────────┐
//!   │ V4L2 │   │Still image│
//!   └──────┘   └───────────┘
//! ```

pub mod frame_loop;
pub mod permission;
pub mod session;
pub mod still_image;
pub mod types;
pub mod v4l2;

pub use permission::{PermissionProvider, PermissionState, PermissionSubscription};
pub use session::{
    CameraSession, FrameSubscription, FrameSubscriptionId, SessionState, SessionStatus,
};
pub use types::*;

use std::sync::Arc;
use tokio::sync::watch;

/// Camera backend trait
///
/// A backend knows how to find devices and how to open one of them. It holds
/// no per-stream state: everything belonging to an open device lives in the
/// returned [`FrameStream`].
pub trait CameraBackend: Send + Sync {
    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is usable on the current system
    fn is_available(&self) -> bool;

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Permission source for the device `config` would open
    fn permission_provider(&self, config: &CaptureConfig) -> Arc<dyn PermissionProvider>;

    /// Acquire a device and start streaming
    ///
    /// Called on the capture thread; the stream never leaves it.
    ///
    /// # Returns
    /// * `Ok(stream)` - device acquired, frames can be pulled
    /// * `Err(BackendError)` - acquisition failed, nothing is held
    fn open(&self, config: &CaptureConfig) -> BackendResult<Box<dyn FrameStream>>;
}

/// An open capture stream (the exclusive device handle)
///
/// Dropping the stream releases the device and all of its buffers.
pub trait FrameStream {
    /// Block until the next frame is available
    ///
    /// An error ends the stream.
    fn next_frame(&mut self) -> BackendResult<CameraFrame>;

    /// Device this stream was opened on
    fn device(&self) -> &CameraDevice;
}

/// Frame callback registered with a [`FrameSource`]
pub type FrameCallback = Box<dyn Fn(&Arc<CameraFrame>) + Send + Sync>;

/// Anything that can hand out frames to subscribers
///
/// This is the only view the recognition side has of a camera.
pub trait FrameSource {
    /// Register a frame callback; it runs on the capture thread and must not
    /// block. The callback is removed when the returned subscription drops.
    fn subscribe_frames(&self, callback: FrameCallback) -> FrameSubscription;

    /// Observe lifecycle changes of the source
    fn status_changes(&self) -> watch::Receiver<SessionStatus>;
}

/// Create a backend instance for the given type
pub fn get_backend_for_type(
    backend_type: CameraBackendType,
    still_image: Option<std::path::PathBuf>,
) -> BackendResult<Arc<dyn CameraBackend>> {
    match backend_type {
        CameraBackendType::V4l2 => Ok(Arc::new(v4l2::V4l2Backend::new())),
        CameraBackendType::StillImage => {
            let path = still_image.ok_or_else(|| {
                BackendError::DeviceNotFound("still-image backend needs an image path".into())
            })?;
            Ok(Arc::new(still_image::StillImageBackend::new(path)))
        }
    }
}
