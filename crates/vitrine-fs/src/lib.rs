//! Vitrine FS - Local filesystem backend
//!
//! Serves a directory tree on the local machine. Listing entries are plain
//! file names; images keep their thumbnails as hidden files next to them.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::debug;
use vitrine_core::{
    is_supported_extension, BackendError, BackendInfo, ByteAccessor, Folder, StorageBackend,
};
use walkdir::WalkDir;

/// Backend name, also used to namespace thumbnails.
pub const BACKEND_NAME: &str = "local";

/// Folder levels walked for the search tree.
pub const TREE_MAX_DEPTH: usize = 4;

/// Storage backend over the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    info: BackendInfo,
    tree_depth: usize,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBackend {
    pub fn new() -> Self {
        Self {
            info: BackendInfo::local(BACKEND_NAME),
            tree_depth: TREE_MAX_DEPTH,
        }
    }

    /// Walk `depth` folder levels when building the search tree.
    pub fn with_tree_depth(mut self, depth: usize) -> Self {
        self.tree_depth = depth;
        self
    }
}

impl StorageBackend for LocalBackend {
    /// File name within the listed directory.
    type Entry = String;

    fn info(&self) -> &BackendInfo {
        &self.info
    }

    fn list_content(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let entries = fs::read_dir(path).map_err(|e| BackendError::io(path, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BackendError::io(path, e))?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => debug!(name = ?name, "skipping non UTF-8 file name"),
            }
        }
        names.sort_by(|a, b| natord::compare(a, b));

        debug!(path, entries = names.len(), "directory listed");
        Ok(names)
    }

    fn is_folder(&self, entry: &String, path: &str) -> bool {
        is_visible_folder(&Path::new(path).join(entry), entry)
    }

    fn is_image(&self, entry: &String, path: &str) -> bool {
        if entry.starts_with('.') {
            return false;
        }
        let full = Path::new(path).join(entry);
        let supported = full
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(is_supported_extension);
        supported && full.is_file()
    }

    fn entry_name(&self, entry: &String, _path: &str) -> String {
        entry.clone()
    }

    fn folder(&self, entry: &String, path: &str) -> Folder {
        let full = Path::new(path).join(entry);
        Folder {
            label: entry.clone(),
            last_modified: last_modified(&full),
            value: full.to_string_lossy().into_owned(),
        }
    }

    /// Visible folders below `path`, depth first, at most `tree_depth` levels deep.
    fn folder_tree(&self, path: &str, _content: &[String]) -> Result<Vec<String>, BackendError> {
        if self.tree_depth == 0 {
            return Ok(Vec::new());
        }

        let tree = WalkDir::new(path)
            .min_depth(1)
            .max_depth(self.tree_depth)
            .sort_by(|a, b| {
                natord::compare(&a.file_name().to_string_lossy(), &b.file_name().to_string_lossy())
            })
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || is_visible_folder(e.path(), &e.file_name().to_string_lossy())
            })
            .filter_map(|e| e.ok())
            .map(|e| e.path().to_string_lossy().into_owned())
            .collect();
        Ok(tree)
    }

    fn byte_accessor(&self, entry: &String, path: &str) -> Arc<dyn ByteAccessor> {
        Arc::new(FileAccessor {
            path: Path::new(path).join(entry),
        })
    }
}

/// Opens one local file.
#[derive(Debug, Clone)]
pub struct FileAccessor {
    path: PathBuf,
}

impl ByteAccessor for FileAccessor {
    fn open(&self) -> Result<Box<dyn Read + Send>, BackendError> {
        let display = self.path.display().to_string();
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BackendError::NotFound(display.clone()),
            _ => BackendError::io(display.clone(), e),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Folders are shown when their name has no dot and they can be listed.
fn is_visible_folder(full: &Path, name: &str) -> bool {
    !name.contains('.') && fs::read_dir(full).is_ok()
}

fn last_modified(path: &Path) -> Option<String> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).format("%Y-%m-%d").to_string())
}
