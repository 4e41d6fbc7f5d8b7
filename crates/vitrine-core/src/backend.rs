//! Storage backend capability.
//!
//! A backend lists a logical directory and hands out byte streams for the
//! entries in it. The core never talks to a filesystem or an object store
//! directly; everything goes through [`StorageBackend`] and [`ByteAccessor`].

use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a backend. Propagated unchanged, never retried.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Local I/O failure on `path`.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The requested path or entry does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A remote request failed (authentication, HTTP status, transport).
    #[error("{backend} request failed: {message}")]
    Request { backend: String, message: String },
}

impl BackendError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        BackendError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Identity of a backend, used to namespace thumbnails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    /// Remote backends keep thumbnails in the local cache directory
    /// instead of next to the source file.
    pub remote: bool,
}

impl BackendInfo {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: false,
        }
    }

    pub fn remote(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote: true,
        }
    }
}

/// Opens a fresh byte stream over one entry's raw content.
pub trait ByteAccessor: Send + Sync {
    fn open(&self) -> Result<Box<dyn Read + Send>, BackendError>;
}

impl<F> ByteAccessor for F
where
    F: Fn() -> Result<Box<dyn Read + Send>, BackendError> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn Read + Send>, BackendError> {
        self()
    }
}

/// A sub-directory shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Display name.
    pub label: String,
    /// Full backend path, used to navigate into the folder.
    pub value: String,
    /// `YYYY-MM-DD`, when the backend knows it.
    pub last_modified: Option<String>,
}

/// A storage backend as seen by the gallery.
///
/// `list_content` ordering is significant: images are numbered in the order
/// they appear, and those numbers drive cache eviction and prefetch.
pub trait StorageBackend: Send + Sync {
    /// One raw listing entry (a file name, an object description, ...).
    type Entry;

    fn info(&self) -> &BackendInfo;

    /// List raw entries under `path`.
    fn list_content(&self, path: &str) -> Result<Vec<Self::Entry>, BackendError>;

    /// True for visible folders directly under `path`.
    fn is_folder(&self, entry: &Self::Entry, path: &str) -> bool;

    /// True for visible, displayable images directly under `path`.
    fn is_image(&self, entry: &Self::Entry, path: &str) -> bool;

    /// File name of `entry`, relative to `path`.
    fn entry_name(&self, entry: &Self::Entry, path: &str) -> String;

    fn folder(&self, entry: &Self::Entry, path: &str) -> Folder;

    /// Folder paths offered for search/autocomplete from `path`.
    fn folder_tree(&self, path: &str, content: &[Self::Entry]) -> Result<Vec<String>, BackendError>;

    fn byte_accessor(&self, entry: &Self::Entry, path: &str) -> Arc<dyn ByteAccessor>;
}

/// Name of a flat object key relative to `path`, if it sits directly under it.
///
/// Object stores have no directories, only keys like `2019/trip/img.jpg`.
/// Returns `None` for keys outside `path`, keys nested deeper, the directory
/// marker itself and hidden (dot-prefixed) names.
pub fn direct_child<'a>(key: &'a str, path: &str) -> Option<&'a str> {
    let relative = if path.is_empty() {
        key
    } else {
        key.strip_prefix(path)?.strip_prefix('/')?
    };
    if relative.is_empty() || relative.contains('/') || relative.starts_with('.') {
        return None;
    }
    Some(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_direct_child() {
        assert_eq!(direct_child("trip/a.jpg", "trip"), Some("a.jpg"));
        assert_eq!(direct_child("a.jpg", ""), Some("a.jpg"));
        assert_eq!(direct_child("trip/day1/a.jpg", "trip"), None);
        assert_eq!(direct_child("trip/.a.jpg", "trip"), None);
        assert_eq!(direct_child("trip", "trip"), None);
        assert_eq!(direct_child("tripod/a.jpg", "trip"), None);
        assert_eq!(direct_child("other/a.jpg", "trip"), None);
    }

    #[test]
    fn test_closure_is_byte_accessor() {
        let accessor: Arc<dyn ByteAccessor> = Arc::new(|| {
            Ok::<Box<dyn Read + Send>, BackendError>(Box::new(Cursor::new(vec![1u8, 2, 3])))
        });

        let mut buf = Vec::new();
        accessor.open().unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Request {
            backend: "hubic".to_string(),
            message: "401 Unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "hubic request failed: 401 Unauthorized");

        let err = BackendError::io(
            "/photos/a.jpg",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().starts_with("I/O error on /photos/a.jpg"));
    }

    #[test]
    fn test_backend_info_constructors() {
        assert!(!BackendInfo::local("local").remote);
        assert!(BackendInfo::remote("hubic").remote);
    }
}
