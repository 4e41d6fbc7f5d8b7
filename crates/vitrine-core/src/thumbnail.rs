//! Thumbnail store.
//!
//! Thumbnails are small JPEG renditions written once, the first time an
//! image is decoded, and reused from then on. Local images keep theirs as a
//! hidden sibling file; remote images get a flat file in the cache directory,
//! namespaced by backend and directory so nothing collides and nothing is
//! ever written to remote storage.
//!
//! Existing thumbnails are never regenerated, even when the source image
//! changes afterwards.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::BackendInfo;
use crate::decode::{generate_thumbnail, DecodeError, DecodedImage};
use crate::encode::{encode_image, EncodeError};

/// Suffix shared by every thumbnail file name.
pub const THUMBNAIL_SUFFIX: &str = "_thumb.jpg";

const PLACEHOLDER_SHADE: u8 = 0xC8;

/// Thumbnail generation or persistence failure. Never fatal to a decode.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("Failed to write thumbnail {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to downscale thumbnail: {0}")]
    Resize(#[from] DecodeError),

    #[error("Failed to encode thumbnail: {0}")]
    Encode(#[from] EncodeError),
}

/// Deterministic thumbnail location for image `stem` in directory `dir`.
///
/// - local: `<dir>/.<stem>_thumb.jpg`
/// - remote: `<cache_dir>/<backend>_<dir>_<stem>_thumb.jpg`, with every `/`
///   of `dir` and `stem` replaced by `_`
pub fn thumbnail_path(backend: &BackendInfo, cache_dir: &Path, dir: &str, stem: &str) -> PathBuf {
    if backend.remote {
        cache_dir.join(format!(
            "{}_{}_{}{}",
            backend.name,
            dir.replace('/', "_"),
            stem.replace('/', "_"),
            THUMBNAIL_SUFFIX
        ))
    } else {
        Path::new(dir).join(format!(".{}{}", stem, THUMBNAIL_SUFFIX))
    }
}

/// Read a thumbnail file, if one exists.
pub fn read_thumbnail(path: &Path) -> Option<Arc<[u8]>> {
    if !path.is_file() {
        return None;
    }
    match fs::read(path) {
        Ok(bytes) => Some(Arc::from(bytes)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable thumbnail");
            None
        }
    }
}

/// Downscale `image` into a `size` box, encode it and write it to `path`.
///
/// Parent directories are created as needed. The JPEG goes to a temporary
/// file in the same directory and is renamed into place, so `path` either
/// holds a complete thumbnail or does not exist. Returns the written bytes.
pub fn save_thumbnail(
    path: &Path,
    image: &DecodedImage,
    size: u32,
    quality: u8,
) -> Result<Arc<[u8]>, ThumbnailError> {
    let thumb = generate_thumbnail(image, size)?;
    let jpeg = encode_image(&thumb, quality)?;

    let write_err = |source: io::Error| ThumbnailError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(write_err)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&jpeg).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!(path = %path.display(), width = thumb.width, height = thumb.height, "thumbnail saved");
    Ok(Arc::from(jpeg))
}

/// Image served in place of a missing thumbnail.
///
/// Reads `configured` when given and readable, otherwise renders a neutral
/// grey `size` x `size` JPEG.
pub fn load_placeholder(configured: Option<&Path>, size: u32, quality: u8) -> Arc<[u8]> {
    if let Some(path) = configured {
        match fs::read(path) {
            Ok(bytes) => return Arc::from(bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "placeholder unreadable, using generated one")
            }
        }
    }

    let size = size.max(1);
    let grey = DecodedImage::new(
        size,
        size,
        vec![PLACEHOLDER_SHADE; (size as usize) * (size as usize) * 3],
    );
    match encode_image(&grey, quality) {
        Ok(jpeg) => Arc::from(jpeg),
        Err(e) => {
            warn!(error = %e, "failed to render placeholder");
            Arc::from(Vec::new())
        }
    }
}
