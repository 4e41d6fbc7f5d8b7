//! Format decoders.
//!
//! Two strategies turn a byte stream into the canonical [`DecodedImage`]:
//! - **Standard**: JPEG and PNG through the `image` crate
//! - **Raw**: camera RAW files through `rawloader`
//!
//! The strategy is chosen once from the lower-cased file extension, never by
//! sniffing content. Both report dimensions and an [`Orientation`] alongside
//! the image and leave no partial state behind on failure.

mod raw;
mod resize;
mod standard;
mod types;

use std::io::Read;

pub use raw::{decode_raw, decode_raw_bytes, raw_layout};
pub use resize::{generate_thumbnail, resize_to_fit};
pub use standard::{decode_standard, decode_standard_bytes, extract_orientation};
pub use types::{
    validate_dimensions, DecodeError, Decoded, DecodedImage, ExifOrientation, Orientation,
    MAX_IMAGE_DIMENSION, MAX_PIXEL_COUNT,
};

/// Extensions handled by the standard raster decoder.
pub const STANDARD_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];

/// Extensions handled by the RAW sensor decoder.
pub const RAW_EXTENSIONS: &[&str] = &[".cr2", ".nef", ".arw", ".dng", ".raf", ".orf", ".rw2", ".pef"];

/// Decode strategy for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    Standard,
    Raw,
}

impl Decoder {
    /// Pick the decoder for an extension such as `".CR2"` or `"jpg"`.
    pub fn for_extension(extension: &str) -> Option<Self> {
        let ext = normalize_extension(extension);
        if RAW_EXTENSIONS.contains(&ext.as_str()) {
            Some(Decoder::Raw)
        } else if STANDARD_EXTENSIONS.contains(&ext.as_str()) {
            Some(Decoder::Standard)
        } else {
            None
        }
    }

    /// Decode a byte stream with this strategy.
    pub fn decode(self, reader: impl Read) -> Result<Decoded, DecodeError> {
        match self {
            Decoder::Standard => decode_standard(reader),
            Decoder::Raw => decode_raw(reader),
        }
    }
}

/// True when some decoder handles `extension`.
pub fn is_supported_extension(extension: &str) -> bool {
    Decoder::for_extension(extension).is_some()
}

/// Lower-case and prefix with a dot: `"CR2"` becomes `".cr2"`.
pub fn normalize_extension(extension: &str) -> String {
    let lower = extension.to_lowercase();
    if lower.is_empty() || lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}
