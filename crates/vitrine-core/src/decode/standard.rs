//! Raster decoding (JPEG, PNG) with EXIF orientation handling.

use std::io::{Cursor, Read};

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{validate_dimensions, DecodeError, Decoded, DecodedImage, ExifOrientation, Orientation};

/// Decode a raster image from a byte stream.
///
/// The stream is read to the end, the EXIF orientation (if any) is applied,
/// and the orientation is derived from the resulting raster: landscape when
/// strictly wider than tall, portrait otherwise.
///
/// # Errors
///
/// Returns `DecodeError::Io` if the stream cannot be read and
/// `DecodeError::CorruptedFile` if the bytes are not a decodable image.
pub fn decode_standard(mut reader: impl Read) -> Result<Decoded, DecodeError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_standard_bytes(&bytes)
}

/// Decode a raster image already held in memory.
pub fn decode_standard_bytes(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let (width, height) = guessed_reader(bytes)?
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    validate_dimensions(width, height)?;

    let orientation = extract_orientation(bytes);

    let img = guessed_reader(bytes)?
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let image = DecodedImage::from_rgb_image(apply_orientation(img, orientation).into_rgb8());
    let dimensions = image.dimensions();

    Ok(Decoded {
        orientation: Orientation::from_dimensions(dimensions.0, dimensions.1),
        dimensions,
        image,
    })
}

fn guessed_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
}

/// Extract EXIF orientation from file bytes.
///
/// Works for any container `kamadak-exif` understands (JPEG, PNG, TIFF-based
/// RAW). Returns `ExifOrientation::Normal` if no EXIF data is found.
pub fn extract_orientation(bytes: &[u8]) -> ExifOrientation {
    extract_orientation_code(bytes)
        .map(ExifOrientation::from)
        .unwrap_or_default()
}

/// Raw EXIF orientation code, if the file carries one.
pub fn extract_orientation_code(bytes: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(bytes);
    let exif = Reader::new().read_from_container(&mut cursor).ok()?;
    exif.get_field(Tag::Orientation, In::PRIMARY)?
        .value
        .get_uint(0)
}

/// Apply EXIF orientation transformation to an image.
pub(crate) fn apply_orientation(img: DynamicImage, orientation: ExifOrientation) -> DynamicImage {
    match orientation {
        ExifOrientation::Normal => img,
        ExifOrientation::FlipHorizontal => img.fliph(),
        ExifOrientation::Rotate180 => img.rotate180(),
        ExifOrientation::FlipVertical => img.flipv(),
        ExifOrientation::Transpose => img.rotate90().fliph(),
        ExifOrientation::Rotate90CW => img.rotate90(),
        ExifOrientation::Transverse => img.rotate270().fliph(),
        ExifOrientation::Rotate270CW => img.rotate270(),
    }
}
