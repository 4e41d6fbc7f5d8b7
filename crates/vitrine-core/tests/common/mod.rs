//! Shared fixtures: an in-memory backend and generated images.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use image::{DynamicImage, ImageFormat, RgbImage};
use vitrine_core::{
    direct_child, is_supported_extension, BackendError, BackendInfo, ByteAccessor, Folder,
    ServiceConfig, StorageBackend,
};

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 90]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

pub fn config(cache_dir: &Path, max_cache: usize) -> ServiceConfig {
    ServiceConfig {
        max_cache,
        prefetch_ahead: max_cache,
        cache_dir: cache_dir.to_path_buf(),
        thumbnail_size: 32,
        ..ServiceConfig::default()
    }
}

/// Accessor serving `bytes` and counting how often it was opened.
pub fn counting_accessor(bytes: Vec<u8>, opens: Arc<AtomicUsize>) -> Arc<dyn ByteAccessor> {
    let bytes = Arc::new(bytes);
    Arc::new(move || {
        opens.fetch_add(1, Ordering::SeqCst);
        Ok::<Box<dyn Read + Send>, BackendError>(Box::new(Cursor::new(bytes.as_ref().clone())))
    })
}

pub fn failing_accessor() -> Arc<dyn ByteAccessor> {
    Arc::new(|| {
        Err::<Box<dyn Read + Send>, BackendError>(BackendError::Request {
            backend: "memory".to_string(),
            message: "503 Service Unavailable".to_string(),
        })
    })
}

/// Poll `condition` until it holds or a few seconds pass.
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Object-store style backend over flat keys. Keys ending in `/` are folders.
pub struct MemoryBackend {
    info: BackendInfo,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    pub opens: Arc<AtomicUsize>,
    hold: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            info: BackendInfo::remote("memory"),
            objects: Mutex::new(BTreeMap::new()),
            opens: Arc::new(AtomicUsize::new(0)),
            hold: Mutex::new(None),
        }
    }

    /// Make the next listing signal the returned receiver, then wait until
    /// the returned sender fires.
    pub fn hold_next_listing(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        *self.hold.lock().unwrap() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl StorageBackend for MemoryBackend {
    type Entry = String;

    fn info(&self) -> &BackendInfo {
        &self.info
    }

    fn list_content(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let hold = self.hold.lock().unwrap().take();
        if let Some((entered, release)) = hold {
            entered.send(()).ok();
            release.recv().ok();
        }
        let objects = self.objects.lock().unwrap();
        let keys: Vec<String> = objects
            .keys()
            .filter(|key| path.is_empty() || key.starts_with(&format!("{}/", path)))
            .cloned()
            .collect();
        if keys.is_empty() && !path.is_empty() {
            return Err(BackendError::NotFound(path.to_string()));
        }
        Ok(keys)
    }

    fn is_folder(&self, entry: &String, path: &str) -> bool {
        entry.ends_with('/') && direct_child(entry.trim_end_matches('/'), path).is_some()
    }

    fn is_image(&self, entry: &String, path: &str) -> bool {
        !entry.ends_with('/')
            && direct_child(entry, path)
                .and_then(|name| name.rsplit_once('.'))
                .is_some_and(|(_, ext)| is_supported_extension(ext))
    }

    fn entry_name(&self, entry: &String, path: &str) -> String {
        direct_child(entry, path).unwrap_or(entry).to_string()
    }

    fn folder(&self, entry: &String, path: &str) -> Folder {
        let value = entry.trim_end_matches('/');
        Folder {
            label: direct_child(value, path).unwrap_or(value).to_string(),
            value: value.to_string(),
            last_modified: None,
        }
    }

    fn folder_tree(&self, _path: &str, content: &[String]) -> Result<Vec<String>, BackendError> {
        Ok(content
            .iter()
            .filter(|key| key.ends_with('/'))
            .map(|key| key.trim_end_matches('/').to_string())
            .collect())
    }

    fn byte_accessor(&self, entry: &String, _path: &str) -> Arc<dyn ByteAccessor> {
        match self.objects.lock().unwrap().get(entry) {
            Some(bytes) => counting_accessor(bytes.clone(), Arc::clone(&self.opens)),
            None => failing_accessor(),
        }
    }
}
