// SPDX-License-Identifier: GPL-3.0-only

//! Code recognition pipeline
//!
//! Owns the active [`ScanMode`], the decoder selected by it and the last
//! emitted payload. Decoding itself is split out as [`detect`] so it can run
//! on a blocking worker while the pipeline state stays with the caller;
//! [`CodeRecognitionPipeline::accept`] applies duplicate suppression to the
//! result afterwards.

use super::luma::to_luma;
use super::tasks::{CodeDecoder, decoder_for};
use super::types::{DecodedCode, ScanMode};
use crate::backends::camera::types::CameraFrame;
use std::sync::Arc;
use tracing::{debug, info};

/// Mode-selected decoding with consecutive-duplicate suppression
pub struct CodeRecognitionPipeline {
    mode: ScanMode,
    qr: Arc<dyn CodeDecoder>,
    barcode: Arc<dyn CodeDecoder>,
    last_payload: Option<String>,
}

impl Default for CodeRecognitionPipeline {
    fn default() -> Self {
        Self::new(ScanMode::default())
    }
}

impl CodeRecognitionPipeline {
    pub fn new(mode: ScanMode) -> Self {
        Self::with_decoders(mode, decoder_for(ScanMode::Qr), decoder_for(ScanMode::Barcode))
    }

    /// Pipeline with custom decoding strategies
    pub fn with_decoders(
        mode: ScanMode,
        qr: Arc<dyn CodeDecoder>,
        barcode: Arc<dyn CodeDecoder>,
    ) -> Self {
        Self {
            mode,
            qr,
            barcode,
            last_payload: None,
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Switch the decoding strategy
    ///
    /// Always clears the duplicate filter, so a code already reported under
    /// the previous mode is reported again.
    pub fn set_mode(&mut self, mode: ScanMode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "Switching scan mode");
        }
        self.mode = mode;
        self.last_payload = None;
    }

    /// Forget the last emitted payload (e.g. after the camera restarted)
    pub fn reset(&mut self) {
        self.last_payload = None;
    }

    pub fn last_payload(&self) -> Option<&str> {
        self.last_payload.as_deref()
    }

    /// Decoder for the current mode
    pub fn decoder(&self) -> Arc<dyn CodeDecoder> {
        match self.mode {
            ScanMode::Qr => Arc::clone(&self.qr),
            ScanMode::Barcode => Arc::clone(&self.barcode),
        }
    }

    /// Decode a frame with the current mode's decoder
    ///
    /// Returns `None` when no code is found or when the code equals the last
    /// one emitted.
    pub fn process_frame(&mut self, frame: &CameraFrame) -> Option<DecodedCode> {
        let code = detect(self.decoder().as_ref(), frame)?;
        self.accept(code)
    }

    /// Apply duplicate suppression to a decode result
    ///
    /// Results from a decoder of another mode (a decode that was in flight
    /// across a mode switch) are dropped.
    pub fn accept(&mut self, code: DecodedCode) -> Option<DecodedCode> {
        if code.symbology.mode() != self.mode {
            debug!(symbology = %code.symbology, mode = %self.mode, "Dropping result of previous mode");
            return None;
        }
        if self.last_payload.as_deref() == Some(code.payload.as_str()) {
            return None;
        }

        self.last_payload = Some(code.payload.clone());
        Some(code)
    }
}

impl std::fmt::Debug for CodeRecognitionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeRecognitionPipeline")
            .field("mode", &self.mode)
            .field("last_payload", &self.last_payload)
            .finish()
    }
}

/// Run `decoder` on a frame
///
/// Malformed frames count as "no code found"; the reason is only logged.
pub fn detect(decoder: &dyn CodeDecoder, frame: &CameraFrame) -> Option<DecodedCode> {
    let luma = match to_luma(frame) {
        Ok(luma) => luma,
        Err(e) => {
            debug!(error = %e, sequence = frame.sequence, "Skipping undecodable frame");
            return None;
        }
    };

    decoder.decode(&luma).map(DecodedCode::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;
    use crate::frame_processor::types::Symbology;
    use crate::test_support::{blank_frame, ean_frame, qr_frame};

    #[test]
    fn test_qr_frame_decodes_only_in_qr_mode() {
        let frame = qr_frame("ABC123");

        let mut pipeline = CodeRecognitionPipeline::new(ScanMode::Qr);
        let code = pipeline.process_frame(&frame).expect("QR should decode");
        assert_eq!(code.payload, "ABC123");
        assert_eq!(code.symbology, Symbology::Qr);

        let mut pipeline = CodeRecognitionPipeline::new(ScanMode::Barcode);
        assert!(pipeline.process_frame(&frame).is_none());
    }

    #[test]
    fn test_consecutive_duplicate_is_suppressed() {
        let frame = qr_frame("ABC123");
        let mut pipeline = CodeRecognitionPipeline::new(ScanMode::Qr);

        assert!(pipeline.process_frame(&frame).is_some());
        assert!(pipeline.process_frame(&frame).is_none());
        assert_eq!(pipeline.last_payload(), Some("ABC123"));
    }

    #[test]
    fn test_empty_frame_does_not_clear_duplicate_filter() {
        let mut pipeline = CodeRecognitionPipeline::new(ScanMode::Qr);

        assert!(pipeline.process_frame(&qr_frame("ABC123")).is_some());
        assert!(pipeline.process_frame(&blank_frame(320, 240)).is_none());
        assert!(pipeline.process_frame(&qr_frame("ABC123")).is_none());
        assert!(pipeline.process_frame(&qr_frame("XYZ")).is_some());
    }

    #[test]
    fn test_mode_round_trip_re_emits() {
        let frame = qr_frame("P");
        let mut pipeline = CodeRecognitionPipeline::new(ScanMode::Qr);

        assert!(pipeline.process_frame(&frame).is_some());
        pipeline.set_mode(ScanMode::Barcode);
        pipeline.set_mode(ScanMode::Qr);

        let again = pipeline.process_frame(&frame).expect("P must be re-emitted");
        assert_eq!(again.payload, "P");
    }

    #[test]
    fn test_barcode_mode_decodes_ean() {
        let mut pipeline = CodeRecognitionPipeline::new(ScanMode::Barcode);
        let code = pipeline
            .process_frame(&ean_frame("5901234123457"))
            .expect("EAN-13 should decode");
        assert_eq!(code.symbology, Symbology::Ean13);
        assert_eq!(code.payload, "5901234123457");
    }

    #[test]
    fn test_stale_mode_result_is_dropped() {
        let mut pipeline = CodeRecognitionPipeline::new(ScanMode::Barcode);
        let late = DecodedCode::new("ABC123", Symbology::Qr);
        assert!(pipeline.accept(late).is_none());
        assert!(pipeline.last_payload().is_none());
    }

    #[test]
    fn test_corrupt_frame_is_no_code() {
        let frame = CameraFrame::packed(4, 4, PixelFormat::Rgba, vec![0; 7]);
        let mut pipeline = CodeRecognitionPipeline::new(ScanMode::Qr);
        assert!(pipeline.process_frame(&frame).is_none());
    }
}
