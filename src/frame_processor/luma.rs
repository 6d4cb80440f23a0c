// SPDX-License-Identifier: GPL-3.0-only

//! Grayscale conversion of camera frames
//!
//! Both decoders work on 8-bit luminance only, so every frame is reduced to
//! an [`image::GrayImage`] once, dropping stride padding on the way.

use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::errors::DecodeError;
use image::imageops::FilterType;
use image::{GrayImage, ImageFormat};
use tracing::trace;

/// Convert a frame of any supported pixel format to grayscale
pub fn to_luma(frame: &CameraFrame) -> Result<GrayImage, DecodeError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(DecodeError::InvalidGeometry(format!(
            "{}x{}",
            frame.width, frame.height
        )));
    }

    let Some(bpp) = frame.format.bytes_per_pixel() else {
        return decode_compressed(frame);
    };

    let width = frame.width as usize;
    let height = frame.height as usize;
    let row_bytes = width * bpp;
    let stride = if frame.stride == 0 {
        row_bytes
    } else {
        frame.stride as usize
    };

    if stride < row_bytes {
        return Err(DecodeError::InvalidGeometry(format!(
            "stride {} shorter than row of {} bytes",
            stride, row_bytes
        )));
    }

    let required = stride * (height - 1) + row_bytes;
    if frame.data.len() < required {
        return Err(DecodeError::Truncated {
            expected: required,
            actual: frame.data.len(),
        });
    }

    let mut luma = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = &frame.data[y * stride..y * stride + row_bytes];
        match frame.format {
            PixelFormat::Gray8 => luma.extend_from_slice(row),
            PixelFormat::Rgba => luma.extend(row.chunks_exact(4).map(|p| rgb_luma(p[0], p[1], p[2]))),
            PixelFormat::Rgb24 => luma.extend(row.chunks_exact(3).map(|p| rgb_luma(p[0], p[1], p[2]))),
            // Y0 U Y1 V: every even byte is a luma sample
            PixelFormat::Yuyv => luma.extend(row.iter().step_by(2).copied()),
            PixelFormat::Mjpeg => unreachable!("compressed formats have no bytes per pixel"),
        }
    }

    GrayImage::from_raw(frame.width, frame.height, luma).ok_or_else(|| {
        DecodeError::InvalidGeometry(format!("{}x{}", frame.width, frame.height))
    })
}

/// Shrink `image` so its longest side is at most `max_dimension`
///
/// Returns the image untouched when it is already small enough.
pub fn downscale(image: GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return image;
    }

    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);
    trace!(width, height, new_width, new_height, "Downscaling frame for detection");

    image::imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

fn decode_compressed(frame: &CameraFrame) -> Result<GrayImage, DecodeError> {
    let decoded = image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
        .map_err(|e| DecodeError::Corrupt(e.to_string()))?;
    Ok(decoded.to_luma8())
}

/// BT.601 luma in fixed point
fn rgb_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}
