//! Crate-level error type.

use thiserror::Error;

use crate::backend::BackendError;
use crate::decode::DecodeError;
use crate::encode::EncodeError;
use crate::thumbnail::ThumbnailError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),

    /// No image at `id` in a listing of `len` images.
    #[error("Image {id} not found ({len} images in listing)")]
    ImageNotFound { id: usize, len: usize },

    /// The service owning an entity was dropped.
    #[error("Image service has been shut down")]
    ServiceStopped,

    #[error("Failed to start worker pool: {0}")]
    PoolStart(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
