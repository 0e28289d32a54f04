//! # Cache Index
//!
//! In-memory map from cache key to file location, rebuilt from the cache
//! root on first use. The tree on disk is the only persisted state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tokio::fs;
use tracing::{debug, warn};

use crate::cache::key::split_file_name;
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Default)]
pub struct CacheIndex {
    entries: RwLock<HashMap<String, PathBuf>>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from every regular file below `root`.
    ///
    /// Fails with [`CacheError::Corruption`] on the first file whose name
    /// has no `.` separating key and suffix.
    pub async fn scan(root: &Path) -> CacheResult<Self> {
        let index = Self::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| CacheError::io(&dir, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| CacheError::io(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| CacheError::io(&path, e))?;
                let is_dir = file_type.is_dir();
                let is_file = if file_type.is_symlink() {
                    // linked files are indexed, linked directories are not walked
                    let target = fs::metadata(&path)
                        .await
                        .map_err(|e| CacheError::io(&path, e))?;
                    if target.is_dir() {
                        debug!(path = %path.display(), "Skipping symlinked directory");
                    }
                    target.is_file()
                } else {
                    file_type.is_file()
                };

                if is_dir {
                    pending.push(path);
                } else if is_file {
                    let key = entry
                        .file_name()
                        .to_str()
                        .and_then(split_file_name)
                        .map(|(key, _)| key.to_owned())
                        .ok_or_else(|| CacheError::Corruption { path: path.clone() })?;
                    index.insert(key, path);
                }
            }
        }

        debug!(root = %root.display(), entries = index.len(), "Scanned cache root");
        Ok(index)
    }

    pub fn get(&self, key: &str) -> Option<PathBuf> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Track `path` under `key`, returning the location it replaced
    pub fn insert(&self, key: String, path: PathBuf) -> Option<PathBuf> {
        let previous = self.entries.write().insert(key, path);
        if let Some(previous) = &previous {
            warn!(path = %previous.display(), "Cache key already indexed, replacing location");
        }
        previous
    }

    pub fn remove(&self, key: &str) -> Option<PathBuf> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
