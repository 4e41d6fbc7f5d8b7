//! Service configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default number of background decode workers.
pub const DEFAULT_WORKERS: usize = 2;

/// Default number of cache-resident images.
pub const DEFAULT_MAX_CACHE: usize = 25;

/// Default thumbnail bounding box edge in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

/// Default JPEG quality for display payloads and thumbnails.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Settings for an [`ImageService`](crate::ImageService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Background decode threads.
    pub workers: usize,
    /// Maximum number of cache-resident images.
    pub max_cache: usize,
    /// Thumbnails fit in a `thumbnail_size` square.
    pub thumbnail_size: u32,
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Where thumbnails of remote images are stored.
    pub cache_dir: PathBuf,
    /// Image served when no thumbnail exists yet. A grey square is generated when unset.
    pub placeholder: Option<PathBuf>,
    /// Images after the shown one to prefetch.
    pub prefetch_ahead: usize,
    /// Images before the shown one to prefetch.
    pub prefetch_behind: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_cache: DEFAULT_MAX_CACHE,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            cache_dir: default_cache_dir(),
            placeholder: None,
            // Shown image + window must fit in the cache
            prefetch_ahead: DEFAULT_MAX_CACHE - 2,
            prefetch_behind: 1,
        }
    }
}

impl ServiceConfig {
    /// Clamp every field into a usable range.
    ///
    /// The prefetch window is shrunk (ahead first) so that the shown image
    /// plus its window never exceed `max_cache`; otherwise prefetching would
    /// evict its own work.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.max_cache = self.max_cache.max(1);
        self.thumbnail_size = self.thumbnail_size.max(1);
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);

        let window = self.max_cache - 1;
        self.prefetch_behind = self.prefetch_behind.min(window);
        self.prefetch_ahead = self.prefetch_ahead.min(window - self.prefetch_behind);
        self
    }
}

/// `<user cache dir>/vitrine/thumbnails`, or `.cache/vitrine/thumbnails` when
/// the platform has no cache directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("vitrine")
        .join("thumbnails")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.max_cache, 25);
        assert_eq!(config.thumbnail_size, 256);
        assert_eq!(config.prefetch_ahead + config.prefetch_behind + 1, config.max_cache);
        assert!(config.cache_dir.ends_with("vitrine/thumbnails"));
        assert_eq!(config.clone().validated(), config);
    }

    #[test]
    fn test_validated_clamps() {
        let mut config = ServiceConfig::default();
        config.workers = 0;
        config.max_cache = 0;
        config.thumbnail_size = 0;
        config.jpeg_quality = 0;
        config.prefetch_ahead = 10;
        config.prefetch_behind = 10;

        let config = config.validated();
        assert_eq!(config.workers, 1);
        assert_eq!(config.max_cache, 1);
        assert_eq!(config.thumbnail_size, 1);
        assert_eq!(config.jpeg_quality, 1);
        assert_eq!(config.prefetch_ahead, 0);
        assert_eq!(config.prefetch_behind, 0);
    }

    #[test]
    fn test_validated_shrinks_ahead_first() {
        let mut config = ServiceConfig::default();
        config.max_cache = 5;
        config.prefetch_ahead = 10;
        config.prefetch_behind = 1;

        let config = config.validated();
        assert_eq!(config.prefetch_behind, 1);
        assert_eq!(config.prefetch_ahead, 3);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{ "workers": 4, "max_cache": 10, "placeholder": "/srv/thumb.jpg" }"#)
                .unwrap();

        assert_eq!(config.workers, 4);
        assert_eq!(config.max_cache, 10);
        assert_eq!(config.placeholder, Some(PathBuf::from("/srv/thumb.jpg")));
        assert_eq!(config.thumbnail_size, DEFAULT_THUMBNAIL_SIZE);
    }
}
