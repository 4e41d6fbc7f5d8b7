//! Image entity.
//!
//! One browsable image in a listing. An entity knows where its bytes come
//! from and where its thumbnail lives; the decoded raster and the display
//! JPEG only exist while the entity is resident in the proximity cache.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use tracing::{debug, warn};

use crate::backend::{BackendInfo, ByteAccessor};
use crate::cache::Resident;
use crate::config::ServiceConfig;
use crate::decode::{normalize_extension, DecodeError, Decoder, DecodedImage, Orientation};
use crate::encode::{encode_image, to_base64, to_data_url};
use crate::error::{Error, Result};
use crate::pool::JobTicket;
use crate::service::ImageService;
use crate::thumbnail::{read_thumbnail, save_thumbnail, thumbnail_path};

/// Characters of the name kept by [`ImageEntity::short_name`].
const SHORT_NAME_LEN: usize = 15;

/// Decoded raster and its display encoding. Present together or not at all.
struct Payload {
    decoded: Arc<DecodedImage>,
    encoded: Arc<[u8]>,
}

#[derive(Default)]
struct EntityState {
    payload: Option<Payload>,
    dimensions: Option<(u32, u32)>,
    orientation: Option<Orientation>,
}

pub struct ImageEntity {
    id: usize,
    path: String,
    name: String,
    extension: String,
    short_name: String,
    decoder: Option<Decoder>,
    accessor: Arc<dyn ByteAccessor>,
    thumbnail_path: PathBuf,
    service: Weak<ImageService>,
    /// Held for the whole of `decode_and_encode`.
    work: Mutex<()>,
    state: Mutex<EntityState>,
    thumbnail: RwLock<Arc<[u8]>>,
}

impl ImageEntity {
    pub(crate) fn new(
        service: &Arc<ImageService>,
        id: usize,
        path: String,
        name: String,
        accessor: Arc<dyn ByteAccessor>,
        backend: &BackendInfo,
    ) -> Self {
        let (stem, extension) = split_extension(&name);
        let extension = normalize_extension(extension);
        let thumbnail_path = thumbnail_path(backend, &service.config().cache_dir, &path, stem);
        let thumbnail = read_thumbnail(&thumbnail_path)
            .unwrap_or_else(|| Arc::clone(service.placeholder()));

        Self {
            id,
            short_name: shorten(&name),
            decoder: Decoder::for_extension(&extension),
            extension,
            path,
            name,
            accessor,
            thumbnail_path,
            service: Arc::downgrade(service),
            work: Mutex::new(()),
            state: Mutex::new(EntityState::default()),
            thumbnail: RwLock::new(thumbnail),
        }
    }

    /// Decode, encode for display, write the thumbnail if missing and enter the cache.
    ///
    /// Does nothing when the entity is already cached. Concurrent calls on
    /// the same entity decode once: later callers wait and find it cached.
    pub fn decode_and_encode(self: &Arc<Self>) -> Result<()> {
        let service = self.service.upgrade().ok_or(Error::ServiceStopped)?;
        let _work = self.work.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_cached() {
            return Ok(());
        }

        service.cache().make_room(self.id);

        let decoder = self
            .decoder
            .ok_or_else(|| DecodeError::UnsupportedExtension(self.extension.clone()))?;
        let decoded = decoder.decode(self.accessor.open()?)?;
        let config = service.config();
        let encoded = encode_image(&decoded.image, config.jpeg_quality)?;

        self.ensure_thumbnail(&service, &decoded.image, config);

        let payload = Payload {
            decoded: Arc::new(decoded.image),
            encoded: Arc::from(encoded),
        };
        service.cache().admit(Arc::clone(self), |entity| {
            let mut state = entity.lock_state();
            state.payload = Some(payload);
            state.dimensions = Some(decoded.dimensions);
            state.orientation = Some(decoded.orientation);
        });

        debug!(
            id = self.id,
            name = %self.name,
            width = decoded.dimensions.0,
            height = decoded.dimensions.1,
            "image cached"
        );
        Ok(())
    }

    /// Queue [`decode_and_encode`](Self::decode_and_encode) on the worker pool.
    ///
    /// Failures are logged; the ticket may be dropped.
    pub fn decode_and_encode_async(self: &Arc<Self>) -> JobTicket<Result<()>> {
        let Some(service) = self.service.upgrade() else {
            return JobTicket::discarded();
        };
        let entity = Arc::clone(self);
        service.pool().submit(move || {
            let result = entity.decode_and_encode();
            if let Err(e) = &result {
                debug!(id = entity.id, name = %entity.name, error = %e, "background decode failed");
            }
            result
        })
    }

    /// Drop every queued job in the shared pool, not only this entity's.
    pub fn clear_pending_queue(&self) -> usize {
        self.service
            .upgrade()
            .map_or(0, |service| service.clear_pending_queue())
    }

    fn ensure_thumbnail(&self, service: &ImageService, image: &DecodedImage, config: &ServiceConfig) {
        if self.thumbnail_path.is_file() {
            // Written after this entity was created, by another listing or process
            if Arc::ptr_eq(&self.thumbnail(), service.placeholder()) {
                if let Some(bytes) = read_thumbnail(&self.thumbnail_path) {
                    *self.write_thumbnail() = bytes;
                }
            }
            return;
        }

        match save_thumbnail(&self.thumbnail_path, image, config.thumbnail_size, config.jpeg_quality) {
            Ok(bytes) => *self.write_thumbnail() = bytes,
            Err(e) => warn!(name = %self.name, error = %e, "thumbnail not saved"),
        }
    }

    /// Position in the listing the image came from.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Directory of the image, in backend terms.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File name as listed, extension included.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased with the leading dot, e.g. `.cr2`. Empty when the name has none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Name cut to 15 characters, `..` appended when cut.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Decoder picked from the extension; `None` for unsupported files,
    /// which fail to decode with `UnsupportedExtension`.
    pub fn decoder(&self) -> Option<Decoder> {
        self.decoder
    }

    /// Where the thumbnail lives: a hidden sibling file for local images,
    /// a flat file under the cache directory otherwise.
    pub fn thumbnail_path(&self) -> &Path {
        &self.thumbnail_path
    }

    /// True while the decoded and encoded payload is held.
    pub fn is_cached(&self) -> bool {
        self.lock_state().payload.is_some()
    }

    /// Populated by the first successful decode and kept after eviction.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.lock_state().dimensions
    }

    /// Display orientation, known once decoded. Kept after eviction.
    pub fn orientation(&self) -> Option<Orientation> {
        self.lock_state().orientation
    }

    /// Canonical RGB raster while cached.
    pub fn decoded(&self) -> Option<Arc<DecodedImage>> {
        self.lock_state()
            .payload
            .as_ref()
            .map(|p| Arc::clone(&p.decoded))
    }

    /// Display JPEG bytes.
    pub fn encoded(&self) -> Option<Arc<[u8]>> {
        self.lock_state()
            .payload
            .as_ref()
            .map(|p| Arc::clone(&p.encoded))
    }

    pub fn encoded_base64(&self) -> Option<String> {
        self.encoded().map(|jpeg| to_base64(&jpeg))
    }

    /// `data:image/jpeg;base64,...` form of [`encoded`](Self::encoded).
    pub fn encoded_data_url(&self) -> Option<String> {
        self.encoded().map(|jpeg| to_data_url(&jpeg))
    }

    /// Thumbnail JPEG bytes, or the placeholder when none exists yet.
    pub fn thumbnail(&self) -> Arc<[u8]> {
        Arc::clone(&self.thumbnail.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn thumbnail_base64(&self) -> String {
        to_base64(&self.thumbnail())
    }

    /// True when a thumbnail file exists on disk.
    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_path.is_file()
    }

    fn lock_state(&self) -> MutexGuard<'_, EntityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_thumbnail(&self) -> std::sync::RwLockWriteGuard<'_, Arc<[u8]>> {
        self.thumbnail.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Resident for ImageEntity {
    fn position(&self) -> usize {
        self.id
    }

    fn release(&self) {
        self.lock_state().payload = None;
    }
}

impl std::fmt::Debug for ImageEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageEntity")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("cached", &self.is_cached())
            .finish()
    }
}

/// Split `name` into stem and extension at the last dot.
///
/// Leading dots belong to the stem, so `.hidden` has no extension.
fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(i) => name.split_at(leading + i),
        None => (name, ""),
    }
}

fn shorten(name: &str) -> String {
    match name.char_indices().nth(SHORT_NAME_LEN) {
        Some((cut, _)) => format!("{}..", &name[..cut]),
        None => name.to_string(),
    }
}
