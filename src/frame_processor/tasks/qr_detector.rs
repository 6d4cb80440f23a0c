// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! Uses the rqrr crate. Frames are downscaled before grid detection; QR codes
//! held up to a camera are large enough to survive that.

use super::CodeDecoder;
use crate::constants::QR_MAX_DIMENSION;
use crate::frame_processor::luma::downscale;
use crate::frame_processor::types::{Detection, ScanMode, Symbology};
use image::GrayImage;
use tracing::{debug, trace};

/// QR code detector
pub struct QrDecoder {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: QR_MAX_DIMENSION,
        }
    }

    /// Create a QR detector with custom max dimension (0 disables downscaling)
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

impl CodeDecoder for QrDecoder {
    fn mode(&self) -> ScanMode {
        ScanMode::Qr
    }

    fn decode(&self, image: &GrayImage) -> Option<Detection> {
        let start = std::time::Instant::now();
        let image = downscale(image.clone(), self.max_dimension);
        let (width, height) = image.dimensions();

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| image.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();
        trace!(
            grids = grids.len(),
            detection_ms = start.elapsed().as_millis(),
            "QR grid detection complete"
        );

        for grid in grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    debug!(
                        version = meta.version.0,
                        total_ms = start.elapsed().as_millis(),
                        "Detected QR code"
                    );
                    return Some(Detection {
                        symbology: Symbology::Qr,
                        payload: content,
                    });
                }
                Err(e) => debug!(error = ?e, "Failed to decode QR grid"),
            }
        }

        None
    }
}
