// SPDX-License-Identifier: MPL-2.0

//! Code Scanner - QR code and barcode scanning from a camera
//!
//! This library provides camera session management and a code recognition
//! pipeline that turns camera frames into decoded payloads.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera backend abstraction and the capture session
//! - [`frame_processor`]: Sampling, decoders and duplicate suppression
//! - [`submit`]: Hand-off of decoded codes to a consumer
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let mut session = CameraSession::new(get_backend_for_type(CameraBackendType::V4l2, None)?);
//! let scanner = Scanner::attach(&session, CodeRecognitionPipeline::new(ScanMode::Qr), 10, |code| {
//!     println!("{}", code.payload);
//! });
//! session.start(&CaptureConfig::default())?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod submit;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use backends::camera::{CameraSession, CaptureConfig, SessionState};
pub use config::Config;
pub use errors::{AppError, AppResult, SessionError};
pub use frame_processor::{CodeRecognitionPipeline, DecodedCode, ScanMode, Scanner, Symbology};
pub use submit::{JsonLinesSubmitter, Submitter};
