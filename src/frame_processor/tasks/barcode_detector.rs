// SPDX-License-Identifier: GPL-3.0-only

//! Linear barcode detection task
//!
//! Decodes EAN-13 (and UPC-A as its leading-zero subset) and EAN-8 from
//! horizontal scanlines. Each scanline is binarized at the midpoint of its
//! own contrast range and reduced to bar/space run lengths; a symbol is a
//! run window with guard patterns at the right places, a quiet zone on both
//! sides, digits that each match a reference pattern, and a valid check
//! digit. Rows are also read right-to-left so upside-down codes decode.

use super::CodeDecoder;
use crate::constants::barcode::{
    MAX_DIGIT_DISTANCE, MIN_AGREEING_SCANLINES, MIN_CONTRAST, MIN_QUIET_ZONE_MODULES, SCANLINES,
};
use crate::frame_processor::types::{Detection, ScanMode, Symbology};
use image::GrayImage;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Run widths of the L (odd parity) digit patterns, space first
const L_WIDTHS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Left-half parity sequence selecting each EAN-13 leading digit
const PARITY: [[Parity; 6]; 10] = {
    use Parity::{G, L};
    [
        [L, L, L, L, L, L],
        [L, L, G, L, G, G],
        [L, L, G, G, L, G],
        [L, L, G, G, G, L],
        [L, G, L, L, G, G],
        [L, G, G, L, L, G],
        [L, G, G, G, L, L],
        [L, G, L, G, L, G],
        [L, G, L, G, G, L],
        [L, G, G, L, G, L],
    ]
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    L,
    G,
}

/// Shape of a symbol in runs and modules
#[derive(Debug, Clone, Copy)]
struct Layout {
    symbology: Symbology,
    /// Digits encoded in each half
    half_digits: usize,
}

const EAN13: Layout = Layout {
    symbology: Symbology::Ean13,
    half_digits: 6,
};

const EAN8: Layout = Layout {
    symbology: Symbology::Ean8,
    half_digits: 4,
};

impl Layout {
    /// Start guard, halves, middle guard and end guard
    fn runs(&self) -> usize {
        3 + self.half_digits * 4 + 5 + self.half_digits * 4 + 3
    }

    fn modules(&self) -> usize {
        3 + self.half_digits * 7 + 5 + self.half_digits * 7 + 3
    }
}

#[derive(Debug, Clone, Copy)]
struct Run {
    dark: bool,
    len: usize,
}

/// EAN/UPC barcode detector
#[derive(Debug, Clone)]
pub struct BarcodeDecoder {
    scanlines: usize,
    min_agreeing: usize,
}

impl Default for BarcodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BarcodeDecoder {
    pub fn new() -> Self {
        Self {
            scanlines: SCANLINES,
            min_agreeing: MIN_AGREEING_SCANLINES,
        }
    }

    /// Rows sampled from a frame of the given height
    fn scan_rows(&self, height: u32) -> Vec<u32> {
        let lines = self.scanlines.max(1) as u32;
        let mut rows: Vec<u32> = (1..=lines).map(|k| height * k / (lines + 1)).collect();
        rows.dedup();
        rows
    }
}

impl CodeDecoder for BarcodeDecoder {
    fn mode(&self) -> ScanMode {
        ScanMode::Barcode
    }

    fn decode(&self, image: &GrayImage) -> Option<Detection> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let start = std::time::Instant::now();
        let rows = self.scan_rows(height);
        let required = self.min_agreeing.clamp(1, rows.len());
        let mut votes: HashMap<Detection, usize> = HashMap::new();

        for y in rows {
            let row = &image.as_raw()[(y * width) as usize..((y + 1) * width) as usize];
            let Some(detection) = decode_row(row) else {
                continue;
            };
            trace!(y, payload = %detection.payload, "Scanline decoded");

            let count = votes.entry(detection.clone()).or_insert(0);
            *count += 1;
            if *count >= required {
                debug!(
                    symbology = %detection.symbology,
                    payload = %detection.payload,
                    scanlines = *count,
                    total_ms = start.elapsed().as_millis(),
                    "Detected barcode"
                );
                return Some(detection);
            }
        }

        None
    }
}

/// Decode a single row of luminance samples in both reading directions
fn decode_row(row: &[u8]) -> Option<Detection> {
    let (min, max) = row
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max.saturating_sub(min) < MIN_CONTRAST {
        return None;
    }
    let threshold = ((min as u16 + max as u16) / 2) as u8;

    let forward = run_lengths(row.iter().copied(), threshold);
    if let Some(detection) = find_symbol(&forward) {
        return Some(detection);
    }

    let reversed = run_lengths(row.iter().rev().copied(), threshold);
    find_symbol(&reversed)
}

fn run_lengths(samples: impl Iterator<Item = u8>, threshold: u8) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for sample in samples {
        let dark = sample < threshold;
        match runs.last_mut() {
            Some(run) if run.dark == dark => run.len += 1,
            _ => runs.push(Run { dark, len: 1 }),
        }
    }
    runs
}

fn find_symbol(runs: &[Run]) -> Option<Detection> {
    // A symbol starts with a bar preceded by its quiet zone, never at index 0
    (1..runs.len())
        .filter(|&i| runs[i].dark)
        .find_map(|i| decode_at(runs, i, EAN13).or_else(|| decode_at(runs, i, EAN8)))
}

fn decode_at(runs: &[Run], start: usize, layout: Layout) -> Option<Detection> {
    let end = start + layout.runs();
    // Need the trailing quiet zone run as well
    if end >= runs.len() {
        return None;
    }

    let symbol = &runs[start..end];
    let total: usize = symbol.iter().map(|r| r.len).sum();
    let module = total as f32 / layout.modules() as f32;

    let quiet = MIN_QUIET_ZONE_MODULES * module;
    if (runs[start - 1].len as f32) < quiet || (runs[end].len as f32) < quiet {
        return None;
    }

    let middle = 3 + layout.half_digits * 4;
    let guards = (0..3)
        .chain(middle..middle + 5)
        .chain(symbol.len() - 3..symbol.len());
    for index in guards {
        let width = symbol[index].len as f32 / module;
        if !(0.5..=1.6).contains(&width) {
            return None;
        }
    }

    let mut digits = Vec::with_capacity(layout.half_digits * 2 + 1);
    let mut parities = Vec::with_capacity(layout.half_digits);

    for k in 0..layout.half_digits {
        let offset = 3 + k * 4;
        let (digit, parity) = match_left(&symbol[offset..offset + 4], module)?;
        digits.push(digit);
        parities.push(parity);
    }
    for k in 0..layout.half_digits {
        let offset = middle + 5 + k * 4;
        digits.push(match_right(&symbol[offset..offset + 4], module)?);
    }

    match layout.symbology {
        Symbology::Ean13 => {
            let leading = PARITY.iter().position(|p| p[..] == parities[..])?;
            digits.insert(0, leading as u8);
        }
        _ => {
            if parities.iter().any(|p| *p != Parity::L) {
                return None;
            }
        }
    }

    if !checksum_valid(&digits) {
        trace!(?digits, "Barcode checksum mismatch");
        return None;
    }

    let text: String = digits.iter().map(|d| char::from(b'0' + d)).collect();
    Some(match layout.symbology {
        Symbology::Ean13 if text.starts_with('0') => Detection {
            symbology: Symbology::UpcA,
            payload: text[1..].to_string(),
        },
        symbology => Detection {
            symbology,
            payload: text,
        },
    })
}

/// Summed deviation between a digit's runs and a reference pattern
fn pattern_distance(runs: &[Run], pattern: impl Iterator<Item = u8>) -> f32 {
    let total: usize = runs.iter().map(|r| r.len).sum();
    let unit = total as f32 / 7.0;
    runs.iter()
        .zip(pattern)
        .map(|(run, expected)| (run.len as f32 / unit - expected as f32).abs())
        .sum()
}

/// Digits are seven modules wide; reject windows far off that
fn digit_width_plausible(runs: &[Run], module: f32) -> bool {
    let width = runs.iter().map(|r| r.len).sum::<usize>() as f32 / module;
    (5.0..=9.0).contains(&width)
}

fn match_left(runs: &[Run], module: f32) -> Option<(u8, Parity)> {
    if !digit_width_plausible(runs, module) {
        return None;
    }

    let mut best: Option<(u8, Parity, f32)> = None;
    for (digit, widths) in L_WIDTHS.iter().enumerate() {
        for (parity, distance) in [
            (Parity::L, pattern_distance(runs, widths.iter().copied())),
            // G patterns are the R patterns mirrored
            (Parity::G, pattern_distance(runs, widths.iter().rev().copied())),
        ] {
            if best.is_none_or(|(_, _, d)| distance < d) {
                best = Some((digit as u8, parity, distance));
            }
        }
    }

    best.filter(|(_, _, d)| *d <= MAX_DIGIT_DISTANCE)
        .map(|(digit, parity, _)| (digit, parity))
}

fn match_right(runs: &[Run], module: f32) -> Option<u8> {
    if !digit_width_plausible(runs, module) {
        return None;
    }

    // R patterns share the L run widths, bar first
    L_WIDTHS
        .iter()
        .enumerate()
        .map(|(digit, widths)| (digit as u8, pattern_distance(runs, widths.iter().copied())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .filter(|(_, d)| *d <= MAX_DIGIT_DISTANCE)
        .map(|(digit, _)| digit)
}

/// Modulo-10 check with weight 3 on every second digit counted from the
/// check digit leftwards
fn checksum_valid(digits: &[u8]) -> bool {
    let Some((&check, body)) = digits.split_last() else {
        return false;
    };
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d as u32 * 3 } else { d as u32 })
        .sum();
    (10 - sum % 10) % 10 == check as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_processor::luma::to_luma;
    use crate::test_support::{blank_frame, ean_frame, qr_frame};
    use image::imageops;

    fn decode(digits: &str) -> Option<Detection> {
        let luma = to_luma(&ean_frame(digits)).unwrap();
        BarcodeDecoder::new().decode(&luma)
    }

    #[test]
    fn test_checksum() {
        assert!(checksum_valid(&[5, 9, 0, 1, 2, 3, 4, 1, 2, 3, 4, 5, 7]));
        assert!(checksum_valid(&[9, 6, 3, 8, 5, 0, 7, 4]));
        assert!(!checksum_valid(&[5, 9, 0, 1, 2, 3, 4, 1, 2, 3, 4, 5, 8]));
        assert!(!checksum_valid(&[]));
    }

    #[test]
    fn test_decodes_ean13() {
        for digits in ["5901234123457", "4006381333931"] {
            let detection = decode(digits).expect("EAN-13 should decode");
            assert_eq!(detection.symbology, Symbology::Ean13);
            assert_eq!(detection.payload, digits);
        }
    }

    #[test]
    fn test_leading_zero_is_upc_a() {
        let detection = decode("0036000291452").expect("UPC-A should decode");
        assert_eq!(detection.symbology, Symbology::UpcA);
        assert_eq!(detection.payload, "036000291452");
    }

    #[test]
    fn test_decodes_ean8() {
        let detection = decode("96385074").expect("EAN-8 should decode");
        assert_eq!(detection.symbology, Symbology::Ean8);
        assert_eq!(detection.payload, "96385074");
    }

    #[test]
    fn test_decodes_upside_down() {
        let luma = to_luma(&ean_frame("4006381333931")).unwrap();
        let rotated = imageops::rotate180(&luma);

        let detection = BarcodeDecoder::new().decode(&rotated);
        assert_eq!(detection.map(|d| d.payload).as_deref(), Some("4006381333931"));
    }

    #[test]
    fn test_bad_check_digit_is_rejected() {
        assert!(decode("5901234123458").is_none());
    }

    #[test]
    fn test_no_barcode_in_blank_or_qr_frames() {
        let blank = to_luma(&blank_frame(320, 240)).unwrap();
        assert!(BarcodeDecoder::new().decode(&blank).is_none());

        let qr = to_luma(&qr_frame("ABC123")).unwrap();
        assert!(BarcodeDecoder::new().decode(&qr).is_none());
    }
}
