//! Core types for image decoding.

use thiserror::Error;

/// Largest accepted edge length in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 65535;

/// Largest accepted pixel count (100 megapixels).
pub const MAX_PIXEL_COUNT: u64 = 100_000_000;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// No decoder is registered for the file extension.
    #[error("No decoder for extension: {0}")]
    UnsupportedExtension(String),

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// The RAW decoder rejected the file (unknown camera, bad sensor data).
    #[error("RAW decode failed: {0}")]
    Raw(String),

    /// The image exceeds the decode size limits.
    #[error("Image too large: {width}x{height}")]
    TooLarge { width: u32, height: u32 },

    /// I/O error while reading the byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Display orientation of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Orientation of a raster of the given size. Square images count as portrait.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ExifOrientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl ExifOrientation {
    /// Returns true if this orientation swaps width and height dimensions.
    ///
    /// Every code from 5 upwards is a quarter turn (with or without a flip),
    /// so the stored raster lies on its side.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        (self as u8) >= 5
    }
}

impl From<u32> for ExifOrientation {
    fn from(value: u32) -> Self {
        match value {
            1 => ExifOrientation::Normal,
            2 => ExifOrientation::FlipHorizontal,
            3 => ExifOrientation::Rotate180,
            4 => ExifOrientation::FlipVertical,
            5 => ExifOrientation::Transpose,
            6 => ExifOrientation::Rotate90CW,
            7 => ExifOrientation::Transverse,
            8 => ExifOrientation::Rotate270CW,
            _ => ExifOrientation::Normal,
        }
    }
}

/// A decoded image with RGB pixel data.
///
/// This is the canonical, decoder-agnostic representation shared by the
/// display encoder and the thumbnail store.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// RGB pixel data in row-major order (3 bytes per pixel).
    /// Length should be width * height * 3.
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Create a new DecodedImage with the given dimensions and pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (width as usize) * (height as usize) * 3,
            "Pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a DecodedImage from an image::RgbImage.
    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let pixels = img.into_raw();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Convert to an image::RgbImage for further processing.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// (width, height) of the raster.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Output of a format decoder.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub image: DecodedImage,
    /// Reported (width, height). Always equal to the canonical image size.
    pub dimensions: (u32, u32),
    pub orientation: Orientation,
}

/// Reject sizes beyond [`MAX_IMAGE_DIMENSION`] / [`MAX_PIXEL_COUNT`] before allocating.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::CorruptedFile(format!(
            "zero-sized image: {}x{}",
            width, height
        )));
    }
    let pixel_count = (width as u64) * (height as u64);
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION || pixel_count > MAX_PIXEL_COUNT
    {
        return Err(DecodeError::TooLarge { width, height });
    }
    Ok(())
}
