// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Directory under the user config dir holding `CONFIG_FILE`
pub const CONFIG_DIR: &str = "code-scanner";

/// Configuration file name
pub const CONFIG_FILE: &str = "config.json";

/// Ideal capture width requested from the camera
pub const DEFAULT_WIDTH: u32 = 1280;

/// Ideal capture height requested from the camera
pub const DEFAULT_HEIGHT: u32 = 720;

/// Ideal capture framerate
pub const DEFAULT_FRAMERATE: u32 = 30;

/// Upper bound on decode attempts per second
///
/// Decoding a 720p frame takes tens of milliseconds; at the raw 30 fps the
/// decoder would saturate a core while the code in view does not change.
pub const DEFAULT_MAX_DECODE_RATE: u32 = 10;

/// How often the platform camera permission is re-read
pub const PERMISSION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Frames are downscaled to this size (longest side) before QR detection
pub const QR_MAX_DIMENSION: u32 = 640;

/// Frame interval of the still-image source
pub const STILL_IMAGE_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Number of V4L2 buffers to memory-map
pub const V4L2_BUFFER_COUNT: u32 = 4;

/// Transient dequeue errors tolerated before a V4L2 stream is declared dead
pub const V4L2_MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Linear barcode scanning
pub mod barcode {
    /// Number of horizontal scanlines sampled per frame
    pub const SCANLINES: usize = 24;

    /// Scanlines that must agree on a payload before it is reported
    pub const MIN_AGREEING_SCANLINES: usize = 2;

    /// Minimum difference between darkest and brightest sample on a scanline
    pub const MIN_CONTRAST: u8 = 32;

    /// Maximum summed deviation (in modules) between a digit's runs and its
    /// reference pattern
    pub const MAX_DIGIT_DISTANCE: f32 = 1.5;

    /// Light space required on both sides of the symbol, in modules
    pub const MIN_QUIET_ZONE_MODULES: f32 = 5.0;
}
