//! Gallery: listings and image display over one backend.
//!
//! A gallery keeps the listing of the directory last browsed. Asking for the
//! same path again returns that snapshot, so image ids stay stable while the
//! user pages through it; a different path replaces it.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::backend::{Folder, StorageBackend};
use crate::entity::ImageEntity;
use crate::error::{Error, Result};
use crate::service::ImageService;

/// Snapshot of one directory.
#[derive(Debug)]
pub struct Listing {
    pub path: String,
    pub folders: Vec<Folder>,
    /// Indexed by image id.
    pub images: Vec<Arc<ImageEntity>>,
    /// Folder paths for search and autocomplete.
    pub search_tree: Vec<String>,
}

impl Listing {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Arc<ImageEntity>> {
        self.images.get(id)
    }

    /// Id before `id`, wrapping around. `None` for an empty listing.
    pub fn previous_id(&self, id: usize) -> Option<usize> {
        let len = self.len();
        (len > 0).then(|| (id % len + len - 1) % len)
    }

    /// Id after `id`, wrapping around. `None` for an empty listing.
    pub fn next_id(&self, id: usize) -> Option<usize> {
        let len = self.len();
        (len > 0).then(|| (id + 1) % len)
    }

    /// Images laid out in rows of `columns` for a grid view.
    pub fn rows(&self, columns: usize) -> std::slice::Chunks<'_, Arc<ImageEntity>> {
        self.images.chunks(columns.max(1))
    }
}

/// An image ready for full display, with its neighbours' ids.
#[derive(Debug, Clone)]
pub struct Shown {
    pub image: Arc<ImageEntity>,
    pub previous_id: usize,
    pub next_id: usize,
    /// Images in the listing.
    pub count: usize,
}

pub struct Gallery<B: StorageBackend> {
    backend: B,
    service: Arc<ImageService>,
    current: Mutex<Option<Arc<Listing>>>,
}

impl<B: StorageBackend> Gallery<B> {
    pub fn new(backend: B, service: Arc<ImageService>) -> Self {
        Self {
            backend,
            service,
            current: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn service(&self) -> &Arc<ImageService> {
        &self.service
    }

    /// Listing of `path`, reusing the current snapshot when it is for the same path.
    ///
    /// The backend is listed without holding the snapshot lock. When two
    /// callers load the same path at once, the first snapshot stored wins and
    /// both get it, so image ids stay shared.
    pub fn folder_content(&self, path: &str) -> Result<Arc<Listing>> {
        if let Some(listing) = self.current_for(path) {
            return Ok(listing);
        }

        let loaded = Arc::new(self.load(path)?);
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(listing) = current.as_ref().filter(|l| l.path == path) {
            return Ok(Arc::clone(listing));
        }
        *current = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Re-list `path` even if it is the current one.
    pub fn refresh(&self, path: &str) -> Result<Arc<Listing>> {
        let listing = Arc::new(self.load(path)?);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&listing));
        Ok(listing)
    }

    /// Current snapshot, if it is for `path`.
    pub fn current_for(&self, path: &str) -> Option<Arc<Listing>> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.as_ref().filter(|l| l.path == path).cloned()
    }

    /// Prepare image `id` of `path` for display.
    ///
    /// Clears the shared decode queue, queues the prefetch window around
    /// `id`, then decodes the image itself on the calling thread.
    pub fn show(&self, path: &str, id: usize) -> Result<Shown> {
        let listing = self.folder_content(path)?;
        let count = listing.len();
        let image = listing
            .get(id)
            .cloned()
            .ok_or(Error::ImageNotFound { id, len: count })?;

        image.clear_pending_queue();
        let config = self.service.config();
        let window = prefetch_window(id, count, config.prefetch_ahead, config.prefetch_behind);
        debug!(id, prefetch = window.len(), "showing image");
        for neighbour in window {
            listing.images[neighbour].decode_and_encode_async();
        }

        image.decode_and_encode()?;

        Ok(Shown {
            image,
            previous_id: (id + count - 1) % count,
            next_id: (id + 1) % count,
            count,
        })
    }

    fn load(&self, path: &str) -> Result<Listing> {
        let info = self.backend.info();
        let content = self.backend.list_content(path)?;

        let folders: Vec<Folder> = content
            .iter()
            .filter(|entry| self.backend.is_folder(entry, path))
            .map(|entry| self.backend.folder(entry, path))
            .collect();

        let images: Vec<Arc<ImageEntity>> = content
            .iter()
            .filter(|entry| self.backend.is_image(entry, path))
            .enumerate()
            .map(|(id, entry)| {
                self.service.create_image(
                    id,
                    path,
                    self.backend.entry_name(entry, path),
                    self.backend.byte_accessor(entry, path),
                    info,
                )
            })
            .collect();

        let search_tree = self.backend.folder_tree(path, &content)?;

        info!(
            backend = %info.name,
            path,
            folders = folders.len(),
            images = images.len(),
            "listing loaded"
        );

        Ok(Listing {
            path: path.to_string(),
            folders,
            images,
            search_tree,
        })
    }
}

/// Ids to prefetch around `id` in a listing of `len` images.
///
/// The `ahead` images after `id` come first, nearest first, then the
/// `behind` images before it. Wraps around the ends; never contains `id`
/// or duplicates.
pub fn prefetch_window(id: usize, len: usize, ahead: usize, behind: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let id = id % len;
    let forward = (1..=ahead).map(|offset| (id + offset) % len);
    let backward = (1..=behind).map(|offset| (id + len - offset % len) % len);

    let mut window = Vec::new();
    for neighbour in forward.chain(backward) {
        if neighbour != id && !window.contains(&neighbour) {
            window.push(neighbour);
        }
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefetch_window_ahead_then_behind() {
        assert_eq!(prefetch_window(5, 100, 3, 1), vec![6, 7, 8, 4]);
    }

    #[test]
    fn test_prefetch_window_wraps() {
        assert_eq!(prefetch_window(9, 10, 2, 1), vec![0, 1, 8]);
        assert_eq!(prefetch_window(0, 10, 1, 2), vec![1, 9, 8]);
    }

    #[test]
    fn test_prefetch_window_small_listing() {
        // Ahead already covers everything; nothing repeats
        assert_eq!(prefetch_window(1, 3, 23, 1), vec![2, 0]);
        assert!(prefetch_window(0, 1, 23, 1).is_empty());
        assert!(prefetch_window(0, 0, 23, 1).is_empty());
    }
}
