// SPDX-License-Identifier: MPL-2.0

//! Core types for frame processing results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which family of codes the pipeline looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Two-dimensional QR codes
    #[default]
    Qr,
    /// One-dimensional (linear) retail barcodes
    Barcode,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::Qr => write!(f, "qr"),
            ScanMode::Barcode => write!(f, "barcode"),
        }
    }
}

impl std::str::FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "qr" => Ok(ScanMode::Qr),
            "barcode" | "linear" => Ok(ScanMode::Barcode),
            other => Err(format!("unknown scan mode '{}'", other)),
        }
    }
}

/// Encoding scheme of a decoded code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Qr,
    Ean13,
    /// EAN-13 with a leading zero, reported with its 12 digits
    UpcA,
    Ean8,
}

impl Symbology {
    /// Scan mode whose decoder produces this symbology
    pub fn mode(&self) -> ScanMode {
        match self {
            Symbology::Qr => ScanMode::Qr,
            Symbology::Ean13 | Symbology::UpcA | Symbology::Ean8 => ScanMode::Barcode,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Symbology::Qr => "QR",
            Symbology::Ean13 => "EAN-13",
            Symbology::UpcA => "UPC-A",
            Symbology::Ean8 => "EAN-8",
        }
    }
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Raw decoder output, before timestamping and duplicate filtering
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Detection {
    pub symbology: Symbology,
    pub payload: String,
}

/// A code read from a frame and handed to the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedCode {
    /// Decoded text
    pub payload: String,
    /// Which decoder produced it
    pub symbology: Symbology,
    /// When the decode completed
    pub timestamp: DateTime<Utc>,
}

impl DecodedCode {
    pub fn new(payload: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            payload: payload.into(),
            symbology,
            timestamp: Utc::now(),
        }
    }
}

impl From<Detection> for DecodedCode {
    fn from(detection: Detection) -> Self {
        DecodedCode::new(detection.payload, detection.symbology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mode_parse() {
        assert_eq!("qr".parse::<ScanMode>(), Ok(ScanMode::Qr));
        assert_eq!("Barcode".parse::<ScanMode>(), Ok(ScanMode::Barcode));
        assert!("pdf417".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_symbology_modes() {
        assert_eq!(Symbology::Qr.mode(), ScanMode::Qr);
        for linear in [Symbology::Ean13, Symbology::UpcA, Symbology::Ean8] {
            assert_eq!(linear.mode(), ScanMode::Barcode);
        }
    }

    #[test]
    fn test_decoded_code_serializes_wire_names() {
        let code = DecodedCode::new("4006381333931", Symbology::Ean13);
        let json = serde_json::to_value(&code).unwrap();
        assert_eq!(json["payload"], "4006381333931");
        assert_eq!(json["symbology"], "ean13");
        assert!(json["timestamp"].is_string());
    }
}
