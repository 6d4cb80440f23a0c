// SPDX-License-Identifier: MPL-2.0

//! Frame processor module for code recognition
//!
//! This module samples camera frames at a bounded rate, decodes them with
//! the strategy selected by the current [`ScanMode`] and reports every new
//! code exactly once while it stays in view.

pub mod luma;
pub mod pipeline;
pub mod sampler;
pub mod scanner;
pub mod tasks;
pub mod types;

pub use pipeline::{CodeRecognitionPipeline, detect};
pub use sampler::FrameSampler;
pub use scanner::Scanner;
pub use tasks::{BarcodeDecoder, CodeDecoder, QrDecoder, decoder_for};
pub use types::{DecodedCode, Detection, ScanMode, Symbology};
