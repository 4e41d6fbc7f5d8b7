//! Image service.
//!
//! The shared state every image entity works against: configuration, the
//! background decode pool, the proximity cache and the thumbnail placeholder.
//! One service is built at startup and handed to every entity; there is no
//! global state.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{BackendInfo, ByteAccessor};
use crate::cache::CacheRegistry;
use crate::config::ServiceConfig;
use crate::entity::ImageEntity;
use crate::error::{Error, Result};
use crate::pool::WorkerPool;
use crate::thumbnail::load_placeholder;

pub struct ImageService {
    config: ServiceConfig,
    pool: WorkerPool,
    cache: CacheRegistry<ImageEntity>,
    placeholder: Arc<[u8]>,
}

impl ImageService {
    /// Start the worker pool and load the placeholder. `config` is validated first.
    pub fn new(config: ServiceConfig) -> Result<Arc<Self>> {
        let config = config.validated();
        let pool = WorkerPool::new(config.workers).map_err(Error::PoolStart)?;
        let placeholder = load_placeholder(
            config.placeholder.as_deref(),
            config.thumbnail_size,
            config.jpeg_quality,
        );

        info!(
            workers = config.workers,
            max_cache = config.max_cache,
            cache_dir = %config.cache_dir.display(),
            "image service started"
        );

        Ok(Arc::new(Self {
            cache: CacheRegistry::new(config.max_cache),
            config,
            pool,
            placeholder,
        }))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn cache(&self) -> &CacheRegistry<ImageEntity> {
        &self.cache
    }

    /// Bytes served for images without a thumbnail on disk.
    pub fn placeholder(&self) -> &Arc<[u8]> {
        &self.placeholder
    }

    /// Drop every queued, unstarted decode job. Returns how many were dropped.
    pub fn clear_pending_queue(&self) -> usize {
        self.pool.clear()
    }

    /// Abandon pending work and release every cached payload.
    ///
    /// The service stays usable; running jobs finish and may cache again.
    pub fn shutdown(&self) {
        let dropped = self.pool.clear();
        self.cache.clear();
        debug!(dropped, "image service shut down");
    }

    /// Build the entity for file `name` in directory `path`, listed at `id`.
    ///
    /// Only the thumbnail is read; the image itself is decoded on demand.
    pub fn create_image(
        self: &Arc<Self>,
        id: usize,
        path: impl Into<String>,
        name: impl Into<String>,
        accessor: Arc<dyn ByteAccessor>,
        backend: &BackendInfo,
    ) -> Arc<ImageEntity> {
        Arc::new(ImageEntity::new(self, id, path.into(), name.into(), accessor, backend))
    }

    /// Like [`create_image`](Self::create_image), decoding right away.
    pub fn create_processed_image(
        self: &Arc<Self>,
        id: usize,
        path: impl Into<String>,
        name: impl Into<String>,
        accessor: Arc<dyn ByteAccessor>,
        backend: &BackendInfo,
    ) -> Result<Arc<ImageEntity>> {
        let entity = self.create_image(id, path, name, accessor, backend);
        entity.decode_and_encode()?;
        Ok(entity)
    }
}
