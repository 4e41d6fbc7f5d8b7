//! Downscaling for thumbnails.
//!
//! All functions return new `DecodedImage` instances without modifying the input.

use image::imageops::FilterType;

use super::{DecodeError, DecodedImage};

/// Shrink an image so both edges fit in a `max_edge` square, preserving aspect ratio.
///
/// Images that already fit are returned unchanged; nothing is ever upscaled.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if `max_edge` is zero and
/// `DecodeError::CorruptedFile` if the pixel buffer does not match the size.
pub fn resize_to_fit(image: &DecodedImage, max_edge: u32) -> Result<DecodedImage, DecodeError> {
    if max_edge == 0 {
        return Err(DecodeError::InvalidFormat);
    }

    if image.width <= max_edge && image.height <= max_edge {
        return Ok(image.clone());
    }

    let (width, height) = fit_dimensions(image.width, image.height, max_edge);

    let rgb_image = image
        .to_rgb_image()
        .ok_or_else(|| DecodeError::CorruptedFile("Failed to create RgbImage".to_string()))?;
    let resized = image::imageops::resize(&rgb_image, width, height, FilterType::Triangle);

    Ok(DecodedImage::from_rgb_image(resized))
}

/// Generate a thumbnail bounded by a `size` x `size` box.
pub fn generate_thumbnail(image: &DecodedImage, size: u32) -> Result<DecodedImage, DecodeError> {
    resize_to_fit(image, size)
}

/// Dimensions that fit within `max_edge` while preserving aspect ratio.
pub(crate) fn fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }

    let ratio = width as f64 / height as f64;

    if width >= height {
        let new_height = (max_edge as f64 / ratio).round() as u32;
        (max_edge, new_height.clamp(1, max_edge))
    } else {
        let new_width = (max_edge as f64 * ratio).round() as u32;
        (new_width.clamp(1, max_edge), max_edge)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: fitted dimensions never exceed the box and one edge touches it.
        #[test]
        fn prop_fit_dimensions_within_box(
            width in 1u32..=20_000,
            height in 1u32..=20_000,
            max_edge in 1u32..=1024,
        ) {
            let (w, h) = fit_dimensions(width, height, max_edge);
            prop_assert!(w >= 1 && h >= 1);
            prop_assert!(w <= max_edge && h <= max_edge);
            prop_assert!(w == max_edge || h == max_edge);
        }

        /// Property: fitting keeps the landscape/portrait relation.
        #[test]
        fn prop_fit_dimensions_keeps_orientation(
            width in 1u32..=20_000,
            height in 1u32..=20_000,
        ) {
            let (w, h) = fit_dimensions(width, height, 256);
            if width >= height {
                prop_assert!(w >= h);
            } else {
                prop_assert!(w <= h);
            }
        }
    }
}
