// SPDX-License-Identifier: GPL-3.0-only

//! Hand-off of decoded codes to the downstream collaborator
//!
//! The scanner knows nothing about where codes go. The CLI plugs in a
//! [`JsonLinesSubmitter`] on stdout; other front ends implement
//! [`Submitter`] for their own endpoint.

use crate::errors::SubmitError;
use crate::frame_processor::types::DecodedCode;
use std::io::Write;
use tracing::debug;

/// Receiver of decoded codes
pub trait Submitter: Send {
    fn submit(&mut self, code: &DecodedCode) -> Result<(), SubmitError>;
}

/// Writes one JSON object per code, newline separated
pub struct JsonLinesSubmitter<W: Write + Send> {
    writer: W,
}

impl JsonLinesSubmitter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSubmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Submitter for JsonLinesSubmitter<W> {
    fn submit(&mut self, code: &DecodedCode) -> Result<(), SubmitError> {
        serde_json::to_writer(&mut self.writer, code)?;
        self.writer.write_all(b"\n")?;
        // Consumers read line by line, don't leave codes in a buffer
        self.writer.flush()?;
        debug!(payload = %code.payload, "Submitted code");
        Ok(())
    }
}
