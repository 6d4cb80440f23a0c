// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `$XDG_CONFIG_HOME/code-scanner/config.json`. Every field
//! has a default, so a partial (or missing) file is fine. Command-line flags
//! override what is loaded here.

use crate::backends::camera::{CameraBackendType, CaptureConfig, FacingMode};
use crate::constants::{
    CONFIG_DIR, CONFIG_FILE, DEFAULT_FRAMERATE, DEFAULT_HEIGHT, DEFAULT_MAX_DECODE_RATE,
    DEFAULT_WIDTH, PERMISSION_POLL_INTERVAL, QR_MAX_DIMENSION,
};
use crate::errors::{AppError, AppResult};
use crate::frame_processor::tasks::{BarcodeDecoder, QrDecoder};
use crate::frame_processor::{CodeRecognitionPipeline, ScanMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use
    pub backend: CameraBackendType,
    /// Explicit device node, overrides `facing`
    pub device_path: Option<String>,
    /// Preferred camera direction
    pub facing: FacingMode,
    /// Ideal capture width
    pub width: u32,
    /// Ideal capture height
    pub height: u32,
    /// Ideal capture framerate
    pub framerate: Option<u32>,
    /// Scan mode at startup
    pub mode: ScanMode,
    /// Maximum decode attempts per second
    pub max_decode_rate: u32,
    /// Permission re-check interval in milliseconds
    pub permission_poll_ms: u64,
    /// Longest side frames are downscaled to for QR detection
    pub qr_max_dimension: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            device_path: None,
            facing: FacingMode::default(), // Rear camera
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            framerate: Some(DEFAULT_FRAMERATE),
            mode: ScanMode::default(),
            max_decode_rate: DEFAULT_MAX_DECODE_RATE,
            permission_poll_ms: PERMISSION_POLL_INTERVAL.as_millis() as u64,
            qr_max_dimension: QR_MAX_DIMENSION,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> AppResult<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!("{}: {}", path.display(), e)));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Config(format!("{}: {}", parent.display(), e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Capture request derived from this config
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            facing: self.facing,
            ideal_width: self.width,
            ideal_height: self.height,
            framerate: self.framerate,
            device: self.device_path.clone(),
        }
    }

    /// Recognition pipeline using this config's decoder settings
    pub fn recognition_pipeline(&self, mode: ScanMode) -> CodeRecognitionPipeline {
        CodeRecognitionPipeline::with_decoders(
            mode,
            Arc::new(QrDecoder::with_max_dimension(self.qr_max_dimension)),
            Arc::new(BarcodeDecoder::new()),
        )
    }

    pub fn permission_poll_interval(&self) -> Duration {
        Duration::from_millis(self.permission_poll_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_config_carries_overrides() {
        let config = Config {
            device_path: Some("/dev/video2".into()),
            facing: FacingMode::User,
            width: 640,
            height: 480,
            ..Default::default()
        };

        let capture = config.capture_config();
        assert_eq!(capture.device.as_deref(), Some("/dev/video2"));
        assert_eq!(capture.facing, FacingMode::User);
        assert_eq!((capture.ideal_width, capture.ideal_height), (640, 480));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = Config {
            permission_poll_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.permission_poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn recognition_pipeline_uses_qr_max_dimension() {
        let frame = crate::test_support::qr_frame("ABC123");

        let mut pipeline = Config::default().recognition_pipeline(ScanMode::Qr);
        assert_eq!(pipeline.mode(), ScanMode::Qr);
        assert!(pipeline.process_frame(&frame).is_some());

        // Shrunk to 40x30 the modules are below one pixel
        let tiny = Config {
            qr_max_dimension: 40,
            ..Default::default()
        };
        assert!(tiny.recognition_pipeline(ScanMode::Qr).process_frame(&frame).is_none());
    }
}
