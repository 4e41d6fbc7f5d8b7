//! Vitrine Core - Image browsing engine
//!
//! This crate turns storage backend listings into browsable images: it
//! decodes JPEG, PNG and camera RAW files, re-encodes them as JPEG for
//! display, keeps a bounded set of them in memory around the image being
//! viewed, prefetches neighbours on a background pool and maintains on-disk
//! thumbnails.

pub mod backend;
pub mod cache;
pub mod config;
pub mod decode;
pub mod encode;
pub mod entity;
pub mod error;
pub mod gallery;
pub mod pool;
pub mod service;
pub mod thumbnail;

pub use backend::{direct_child, BackendError, BackendInfo, ByteAccessor, Folder, StorageBackend};
pub use cache::{select_victim, CacheRegistry, Resident};
pub use config::ServiceConfig;
pub use decode::{
    is_supported_extension, DecodeError, Decoder, DecodedImage, Orientation, RAW_EXTENSIONS,
    STANDARD_EXTENSIONS,
};
pub use encode::EncodeError;
pub use entity::ImageEntity;
pub use error::{Error, Result};
pub use gallery::{prefetch_window, Gallery, Listing, Shown};
pub use pool::{JobTicket, WorkerPool};
pub use service::ImageService;
pub use thumbnail::{thumbnail_path, ThumbnailError};
