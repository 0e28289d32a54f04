use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::StatusCode;

/// Errors raised by a [`Fetcher`](crate::fetcher::Fetcher)
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status code {0}")]
    StatusCode(StatusCode),

    #[error("Invalid HTTP client configuration: {0}")]
    InvalidConfig(String),

    #[error("Generic fetch error: {0}")]
    Generic(String),
}

/// Errors raised by the URL cache.
///
/// The type is `Clone` so that a failed initialization can be handed out
/// again on every later call without rescanning the cache root.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("Invalid cache configuration: {0}")]
    Configuration(String),

    #[error("Corrupted cache file: {}", .path.display())]
    Corruption { path: PathBuf },

    #[error("Can't create cache dir {}: {source}", .path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("Fetch failed: {0}")]
    Fetch(#[source] Arc<FetchError>),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl CacheError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn directory(path: &Path, source: std::io::Error) -> Self {
        CacheError::DirectoryCreation {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }
}

impl From<FetchError> for CacheError {
    fn from(err: FetchError) -> Self {
        CacheError::Fetch(Arc::new(err))
    }
}

/// Result of a cache operation
pub type CacheResult<T> = std::result::Result<T, CacheError>;
