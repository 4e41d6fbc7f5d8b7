//! RAW sensor decoding.
//!
//! Sensor data is read with `rawloader` and developed into an 8-bit RGB
//! raster with a deliberately simple pipeline: black/white level
//! normalisation, as-shot white balance, a 2x2 block demosaic and a display
//! gamma. The result is meant for browsing, not for editing.
//!
//! The orientation code is taken from the file's EXIF block. Codes 5 to 8
//! describe a sideways camera: the reported dimensions are swapped, the
//! image is marked portrait and the raster is rotated to match.

use std::io::{Cursor, Read};

use image::{DynamicImage, RgbImage};
use rawloader::RawImageData;

use super::standard::{apply_orientation, extract_orientation_code};
use super::{validate_dimensions, DecodeError, Decoded, DecodedImage, ExifOrientation, Orientation};

const DISPLAY_GAMMA: f32 = 1.0 / 2.2;

/// Decode a RAW file from a byte stream.
///
/// # Errors
///
/// Returns `DecodeError::Io` if the stream cannot be read and
/// `DecodeError::Raw` if `rawloader` cannot parse the sensor data.
pub fn decode_raw(mut reader: impl Read) -> Result<Decoded, DecodeError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_raw_bytes(&bytes)
}

/// Decode a RAW file already held in memory.
pub fn decode_raw_bytes(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let raw = rawloader::decode(&mut Cursor::new(bytes))
        .map_err(|e| DecodeError::Raw(format!("{:?}", e)))?;

    let code = sanitize_orientation_code(extract_orientation_code(bytes));
    let samples = normalized_samples(&raw);
    let wb = white_balance(&raw.wb_coeffs);
    let cfa = &raw.cfa;
    build_raw(raw.width, raw.height, raw.cpp, &samples, wb, code, |row, col| {
        cfa.color_at(row, col)
    })
}

/// Turn normalised sensor samples into the canonical image for `orientation_code`.
///
/// The raster is rotated so its size always equals the reported dimensions.
fn build_raw<F>(
    width: usize,
    height: usize,
    cpp: usize,
    samples: &[f32],
    wb: [f32; 3],
    orientation_code: u32,
    color_at: F,
) -> Result<Decoded, DecodeError>
where
    F: Fn(usize, usize) -> usize,
{
    let sensor_width = u32::try_from(width).map_err(|_| DecodeError::TooLarge {
        width: u32::MAX,
        height: 0,
    })?;
    let sensor_height = u32::try_from(height).map_err(|_| DecodeError::TooLarge {
        width: 0,
        height: u32::MAX,
    })?;
    validate_dimensions(sensor_width, sensor_height)?;

    let expected = width * height * cpp.max(1);
    if samples.len() < expected {
        return Err(DecodeError::CorruptedFile(format!(
            "sensor data holds {} samples, expected {}",
            samples.len(),
            expected
        )));
    }

    let (dimensions, orientation) = raw_layout(sensor_width, sensor_height, orientation_code);
    let pixels = develop(width, height, cpp, samples, wb, color_at);
    let raster = RgbImage::from_raw(sensor_width, sensor_height, pixels)
        .ok_or_else(|| DecodeError::CorruptedFile("RGB buffer size mismatch".to_string()))?;
    let rotated = apply_orientation(
        DynamicImage::ImageRgb8(raster),
        ExifOrientation::from(orientation_code),
    );
    let image = DecodedImage::from_rgb_image(rotated.into_rgb8());

    if image.dimensions() != dimensions {
        return Err(DecodeError::CorruptedFile(format!(
            "rotated raster is {:?}, expected {:?}",
            image.dimensions(),
            dimensions
        )));
    }

    Ok(Decoded {
        image,
        dimensions,
        orientation,
    })
}

/// Reported dimensions and orientation for a sensor of `width` x `height`.
///
/// Orientation codes 5 to 8 swap the reported dimensions and mark the image
/// portrait; anything else keeps the sensor size and marks it landscape.
pub fn raw_layout(width: u32, height: u32, orientation_code: u32) -> ((u32, u32), Orientation) {
    if ExifOrientation::from(orientation_code).swaps_dimensions() {
        ((height, width), Orientation::Portrait)
    } else {
        ((width, height), Orientation::Landscape)
    }
}

/// Missing or out-of-range codes are read as 1 (normal).
fn sanitize_orientation_code(code: Option<u32>) -> u32 {
    match code {
        Some(c @ 1..=8) => c,
        _ => 1,
    }
}

fn normalized_samples(raw: &rawloader::RawImage) -> Vec<f32> {
    match &raw.data {
        RawImageData::Integer(values) => {
            let black = raw.blacklevels[0] as f32;
            let range = (raw.whitelevels[0] as f32 - black).max(1.0);
            values
                .iter()
                .map(|&v| ((v as f32 - black) / range).clamp(0.0, 1.0))
                .collect()
        }
        RawImageData::Float(values) => values.iter().map(|&v| v.clamp(0.0, 1.0)).collect(),
    }
}

/// As-shot white balance normalised to green; NaN or zero coefficients become 1.0.
fn white_balance(coeffs: &[f32; 4]) -> [f32; 3] {
    let sane = |v: f32| if v.is_finite() && v > 0.0 { v } else { 1.0 };
    let green = sane(coeffs[1]);
    [sane(coeffs[0]) / green, 1.0, sane(coeffs[2]) / green]
}

/// Develop normalised sensor samples into interleaved 8-bit RGB.
///
/// `cpp` is the number of components per pixel. Three-component data is
/// already RGB; single-component data is a colour filter array where
/// `color_at(row, col)` returns 0 (red), 1 or 3 (green) or 2 (blue).
fn develop<F>(width: usize, height: usize, cpp: usize, samples: &[f32], wb: [f32; 3], color_at: F) -> Vec<u8>
where
    F: Fn(usize, usize) -> usize,
{
    let mut rgb = vec![0u8; width * height * 3];

    if cpp >= 3 {
        for (i, px) in rgb.chunks_exact_mut(3).enumerate() {
            for c in 0..3 {
                px[c] = to_display(samples[i * cpp + c] * wb[c]);
            }
        }
        return rgb;
    }

    // One colour per 2x2 block; every pixel of the block gets the block average.
    for by in (0..height).step_by(2) {
        for bx in (0..width).step_by(2) {
            let mut sum = [0.0f32; 3];
            let mut count = [0u32; 3];
            for y in by..(by + 2).min(height) {
                for x in bx..(bx + 2).min(width) {
                    let c = match color_at(y, x) {
                        0 => 0,
                        2 => 2,
                        _ => 1,
                    };
                    sum[c] += samples[y * width + x];
                    count[c] += 1;
                }
            }
            let block: [u8; 3] = std::array::from_fn(|c| {
                let mean = if count[c] > 0 {
                    sum[c] / count[c] as f32
                } else {
                    // Edge block missing this colour: borrow green
                    sum[1] / count[1].max(1) as f32
                };
                to_display(mean * wb[c])
            });
            for y in by..(by + 2).min(height) {
                for x in bx..(bx + 2).min(width) {
                    let offset = (y * width + x) * 3;
                    rgb[offset..offset + 3].copy_from_slice(&block);
                }
            }
        }
    }

    rgb
}

#[inline]
fn to_display(linear: f32) -> u8 {
    (linear.clamp(0.0, 1.0).powf(DISPLAY_GAMMA) * 255.0).round() as u8
}
