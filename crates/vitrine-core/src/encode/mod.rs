//! Display encoding.
//!
//! The canonical image is re-encoded as JPEG for the browser and for the
//! thumbnail files, and exposed as base64 / `data:` URLs for inline HTML.

mod jpeg;

pub use jpeg::{encode_image, encode_jpeg, to_base64, to_data_url, EncodeError};
