// SPDX-License-Identifier: GPL-3.0-only

//! Decoding strategies
//!
//! Each [`ScanMode`] has one [`CodeDecoder`]. Decoders are stateless and
//! shared, so a decode can run on a blocking worker while the pipeline keeps
//! its own state.

pub mod barcode_detector;
pub mod qr_detector;

pub use barcode_detector::BarcodeDecoder;
pub use qr_detector::QrDecoder;

use crate::frame_processor::types::{Detection, ScanMode};
use image::GrayImage;
use std::sync::Arc;

/// A symbology-specific decoder
pub trait CodeDecoder: Send + Sync {
    /// Mode this decoder serves
    fn mode(&self) -> ScanMode;

    /// Find a code in a grayscale frame
    ///
    /// Returns `None` when the frame holds no valid symbol of this family.
    fn decode(&self, image: &GrayImage) -> Option<Detection>;
}

/// Default decoder for a mode
pub fn decoder_for(mode: ScanMode) -> Arc<dyn CodeDecoder> {
    match mode {
        ScanMode::Qr => Arc::new(QrDecoder::new()),
        ScanMode::Barcode => Arc::new(BarcodeDecoder::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_for_matches_mode() {
        for mode in [ScanMode::Qr, ScanMode::Barcode] {
            assert_eq!(decoder_for(mode).mode(), mode);
        }
    }
}
