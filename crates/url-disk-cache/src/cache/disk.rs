//! # URL Disk Cache
//!
//! Fetch-on-miss facade over the cache root. Content is never kept in
//! memory: every `get` reads the file again, hit or miss.
//!
//! Concurrent misses on the same URL are not deduplicated. Both callers
//! fetch, and the second one fails to create the already existing file.
//! A write that fails halfway leaves the partial file where it is.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::index::CacheIndex;
use crate::cache::key::{derive_key, derive_path, relative_path};
use crate::config::{CacheConfig, HttpFetcherConfig};
use crate::error::{CacheError, CacheResult};
use crate::fetcher::{Fetcher, HttpFetcher};

/// Outcome of the one-time initialization
#[derive(Debug)]
enum CacheState {
    Ready { root: PathBuf, index: CacheIndex },
    Failed(CacheError),
}

/// Disk-backed cache of URL content
pub struct UrlDiskCache {
    config: CacheConfig,
    fetcher: Arc<dyn Fetcher>,
    state: OnceCell<CacheState>,
}

impl UrlDiskCache {
    /// Create a cache that fetches misses through `fetcher`.
    ///
    /// Nothing touches the disk until the first operation.
    pub fn new(config: CacheConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            state: OnceCell::new(),
        }
    }

    /// Create a cache backed by an [`HttpFetcher`]
    pub fn with_http(config: CacheConfig, fetcher_config: &HttpFetcherConfig) -> CacheResult<Self> {
        let fetcher = HttpFetcher::new(fetcher_config)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn tag(&self) -> &str {
        &self.config.tag
    }

    /// Resolved cache root, once initialization has succeeded
    pub fn root_dir(&self) -> Option<&Path> {
        match self.state.get() {
            Some(CacheState::Ready { root, .. }) => Some(root.as_path()),
            _ => None,
        }
    }

    /// Absolute location the content of `url` is stored at
    pub fn path_for(&self, url: &Url) -> CacheResult<PathBuf> {
        Ok(self.config.root_dir()?.join(derive_path(url)))
    }

    /// Content of `url`, fetched and stored on the first request
    pub async fn get(&self, url: &Url) -> CacheResult<Bytes> {
        let (root, index) = self.ensure_initialized().await?;
        let key = derive_key(url);

        let path = match index.get(&key) {
            Some(path) => {
                debug!(url = %url, path = %path.display(), "Cache hit");
                path
            }
            None => {
                info!(url = %url, "Cache not found");
                self.put(root, index, url, key).await?
            }
        };

        let data = fs::read(&path)
            .await
            .map_err(|e| CacheError::io(&path, e))?;
        Ok(Bytes::from(data))
    }

    /// Content of `url` decoded as UTF-8, invalid sequences replaced
    pub async fn get_text(&self, url: &Url) -> CacheResult<String> {
        let data = self.get(url).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Forget `url` and remove its file.
    ///
    /// Returns `Ok(false)` when the URL was not cached or the file could not
    /// be removed. In the latter case the entry stays out of the index until
    /// the next process rescans the root.
    pub async fn delete(&self, url: &Url) -> CacheResult<bool> {
        // a root that was never created holds nothing to delete
        if self.state.get().is_none() {
            let root = self.config.root_dir()?;
            if !fs::try_exists(&root).await.unwrap_or(false) {
                debug!(url = %url, root = %root.display(), "Cache root missing, nothing to delete");
                return Ok(false);
            }
        }

        let (_, index) = self.ensure_initialized().await?;

        let Some(path) = index.remove(&derive_key(url)) else {
            return Ok(false);
        };

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(url = %url, path = %path.display(), "Removed cache entry");
                Ok(true)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove cache file");
                Ok(false)
            }
        }
    }

    /// Whether `url` is currently indexed
    pub async fn contains(&self, url: &Url) -> CacheResult<bool> {
        let (_, index) = self.ensure_initialized().await?;
        Ok(index.contains(&derive_key(url)))
    }

    /// Number of indexed entries
    pub async fn len(&self) -> CacheResult<usize> {
        let (_, index) = self.ensure_initialized().await?;
        Ok(index.len())
    }

    pub async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }

    async fn ensure_initialized(&self) -> CacheResult<(&Path, &CacheIndex)> {
        let state = self
            .state
            .get_or_init(|| async {
                match self.initialize().await {
                    Ok((root, index)) => CacheState::Ready { root, index },
                    Err(e) => {
                        warn!(tag = %self.config.tag, error = %e, "Cache initialization failed");
                        CacheState::Failed(e)
                    }
                }
            })
            .await;

        match state {
            CacheState::Ready { root, index } => Ok((root.as_path(), index)),
            CacheState::Failed(e) => Err(e.clone()),
        }
    }

    async fn initialize(&self) -> CacheResult<(PathBuf, CacheIndex)> {
        info!(tag = %self.config.tag, "Init cache...");

        let root = self.config.root_dir()?;
        if !fs::try_exists(&root).await.unwrap_or(false) {
            info!(root = %root.display(), "Create base dir");
            fs::create_dir_all(&root)
                .await
                .map_err(|e| CacheError::directory(&root, e))?;
        }

        let index = CacheIndex::scan(&root).await?;
        info!(root = %root.display(), entries = index.len(), "Init completed");
        Ok((root, index))
    }

    /// Miss-fill: fetch `url`, write it below `root` and index it
    async fn put(
        &self,
        root: &Path,
        index: &CacheIndex,
        url: &Url,
        key: String,
    ) -> CacheResult<PathBuf> {
        let path = root.join(relative_path(url, &key));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::directory(parent, e))?;
        }

        let data = self.fetcher.fetch(url.as_str()).await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| CacheError::io(&path, e))?;
        file.write_all(&data)
            .await
            .map_err(|e| CacheError::io(&path, e))?;
        file.flush().await.map_err(|e| CacheError::io(&path, e))?;

        index.insert(key, path.clone());
        info!(path = %path.display(), size = data.len(), "Download to cache");
        Ok(path)
    }
}

impl std::fmt::Debug for UrlDiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlDiskCache")
            .field("config", &self.config)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[inline]
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    /// Serves a fixed body and counts requests
    struct StubFetcher {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn new(body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                body,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(self.body.as_bytes()))
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
            Err(FetchError::Generic(format!("unreachable: {url}")))
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn cache(base: &Path, fetcher: Arc<dyn Fetcher>) -> UrlDiskCache {
        UrlDiskCache::new(CacheConfig::new(base, "test"), fetcher)
    }

    async fn count_files(dir: &Path) -> usize {
        let mut count = 0;
        let mut pending = vec![dir.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.unwrap();
            while let Some(entry) = entries.next_entry().await.unwrap() {
                if entry.file_type().await.unwrap().is_dir() {
                    pending.push(entry.path());
                } else {
                    count += 1;
                }
            }
        }
        count
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        init_tracing();
        let dir = tempdir().unwrap();
        let fetcher = StubFetcher::new("hello");
        let cache = cache(dir.path(), fetcher.clone());
        let u = url("http://example.com/a?b=1");

        assert_eq!(cache.get_text(&u).await.unwrap(), "hello");
        assert_eq!(fetcher.calls(), 1);

        let expected = dir
            .path()
            .join("test/example_com/a/ab55b561f5ab7c891e79cba33ab7df41.a__b_1");
        assert_eq!(fs::read(&expected).await.unwrap(), b"hello");
        assert_eq!(cache.path_for(&u).unwrap(), expected);
        assert_eq!(cache.root_dir(), Some(dir.path().join("test").as_path()));

        assert_eq!(cache.get_text(&u).await.unwrap(), "hello");
        assert_eq!(cache.get(&u).await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_hit_rereads_disk() {
        let dir = tempdir().unwrap();
        let cache = cache(dir.path(), StubFetcher::new("v1"));
        let u = url("http://example.com/page");

        assert_eq!(cache.get_text(&u).await.unwrap(), "v1");
        fs::write(cache.path_for(&u).unwrap(), b"v2").await.unwrap();
        assert_eq!(cache.get_text(&u).await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_entries_survive_restart() {
        let dir = tempdir().unwrap();
        let u = url("http://example.com/a?b=1");

        let first = cache(dir.path(), StubFetcher::new("hello"));
        first.get(&u).await.unwrap();
        drop(first);

        let fetcher = StubFetcher::new("other");
        let second = cache(dir.path(), fetcher.clone());
        assert!(second.contains(&u).await.unwrap());
        assert_eq!(second.len().await.unwrap(), 1);
        assert_eq!(second.get_text(&u).await.unwrap(), "hello");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_forces_refetch() {
        let dir = tempdir().unwrap();
        let fetcher = StubFetcher::new("hello");
        let cache = cache(dir.path(), fetcher.clone());
        let u = url("http://example.com/a");

        cache.get(&u).await.unwrap();
        assert!(cache.delete(&u).await.unwrap());
        assert!(!cache.contains(&u).await.unwrap());
        assert!(!fs::try_exists(cache.path_for(&u).unwrap()).await.unwrap());

        cache.get(&u).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_delete_unknown_url() {
        let dir = tempdir().unwrap();
        let fetcher = StubFetcher::new("hello");
        let cache = cache(dir.path(), fetcher.clone());
        cache.get(&url("http://example.com/kept")).await.unwrap();

        assert!(!cache.delete(&url("http://example.com/never")).await.unwrap());
        assert_eq!(count_files(dir.path()).await, 1);
        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_before_first_use_touches_nothing() {
        let dir = tempdir().unwrap();
        let fetcher = StubFetcher::new("hello");
        let cache = cache(dir.path(), fetcher.clone());

        assert!(!cache.delete(&url("http://example.com/never")).await.unwrap());

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
        assert!(cache.root_dir().is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_first_on_existing_root() {
        let dir = tempdir().unwrap();
        let u = url("http://example.com/a");
        cache(dir.path(), StubFetcher::new("hello"))
            .get(&u)
            .await
            .unwrap();

        let cache = cache(dir.path(), StubFetcher::new("hello"));
        assert!(cache.delete(&u).await.unwrap());
        assert!(!fs::try_exists(cache.path_for(&u).unwrap()).await.unwrap());
        assert!(cache.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_unwritable_host_dir_is_directory_error() {
        let dir = tempdir().unwrap();
        let fetcher = StubFetcher::new("hello");
        let cache = cache(dir.path(), fetcher.clone());
        let u = url("http://example.com/a");

        assert!(cache.is_empty().await.unwrap());
        let host_dir = dir.path().join("test/example_com");
        fs::write(&host_dir, b"not a directory").await.unwrap();

        let shard = &derive_key(&u)[..1];
        match cache.get(&u).await {
            Err(CacheError::DirectoryCreation { path, .. }) => {
                assert_eq!(path, host_dir.join(shard));
            }
            other => panic!("expected directory creation error, got {other:?}"),
        }
        assert!(!cache.contains(&u).await.unwrap());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_failure_still_drops_entry() {
        let dir = tempdir().unwrap();
        let cache = cache(dir.path(), StubFetcher::new("hello"));
        let u = url("http://example.com/a");

        cache.get(&u).await.unwrap();
        fs::remove_file(cache.path_for(&u).unwrap()).await.unwrap();

        assert!(!cache.delete(&u).await.unwrap());
        assert!(!cache.contains(&u).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_every_call() {
        init_tracing();
        let dir = tempdir().unwrap();
        let corrupt = dir.path().join("test/example_com/a/abcdef");
        fs::create_dir_all(corrupt.parent().unwrap()).await.unwrap();
        fs::write(&corrupt, b"junk").await.unwrap();

        let fetcher = StubFetcher::new("hello");
        let cache = cache(dir.path(), fetcher.clone());
        let u = url("http://example.com/a");

        for _ in 0..2 {
            match cache.get(&u).await {
                Err(CacheError::Corruption { path }) => assert_eq!(path, corrupt),
                other => panic!("expected corruption error, got {other:?}"),
            }
        }
        // fixing the tree does not help this instance, it never rescans
        fs::remove_file(&corrupt).await.unwrap();
        assert!(matches!(
            cache.delete(&u).await,
            Err(CacheError::Corruption { .. })
        ));
        assert!(cache.root_dir().is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_base_dir() {
        let cache = UrlDiskCache::new(
            CacheConfig::from_lookup("test", |_| None),
            StubFetcher::new("hello"),
        );
        assert!(matches!(
            cache.get(&url("http://example.com/")).await,
            Err(CacheError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_root_is_created() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("nested/base");
        let cache = cache(&base, StubFetcher::new("hello"));

        assert!(cache.is_empty().await.unwrap());
        assert!(fs::try_exists(base.join("test")).await.unwrap());
    }

    #[tokio::test]
    async fn test_sanitized_collisions_stay_distinct() {
        let dir = tempdir().unwrap();
        let cache = cache(dir.path(), StubFetcher::new("hello"));
        let dotted = url("http://example.com/a.b");
        let underscored = url("http://example.com/a_b");

        cache.get(&dotted).await.unwrap();
        cache.get(&underscored).await.unwrap();

        assert_eq!(cache.len().await.unwrap(), 2);
        assert_ne!(
            cache.path_for(&dotted).unwrap(),
            cache.path_for(&underscored).unwrap()
        );
        assert!(cache.delete(&dotted).await.unwrap());
        assert!(cache.contains(&underscored).await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let dir = tempdir().unwrap();
        let cache = cache(dir.path(), Arc::new(FailingFetcher));
        let u = url("http://example.com/a");

        match cache.get(&u).await {
            Err(CacheError::Fetch(e)) => assert!(matches!(*e, FetchError::Generic(_))),
            other => panic!("expected fetch error, got {other:?}"),
        }
        assert!(!cache.contains(&u).await.unwrap());
        assert_eq!(count_files(dir.path()).await, 0);
    }

    #[tokio::test]
    async fn test_existing_unindexed_file_is_io_error() {
        let dir = tempdir().unwrap();
        let cache = cache(dir.path(), StubFetcher::new("hello"));
        let u = url("http://example.com/a");

        assert!(cache.is_empty().await.unwrap());
        let path = cache.path_for(&u).unwrap();
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, b"stale").await.unwrap();

        assert!(matches!(
            cache.get(&u).await,
            Err(CacheError::Io { .. })
        ));
        assert_eq!(fs::read(&path).await.unwrap(), b"stale");
    }

    #[tokio::test]
    async fn test_tags_are_isolated() {
        let dir = tempdir().unwrap();
        let u = url("http://example.com/a");
        let pages = UrlDiskCache::new(
            CacheConfig::new(dir.path(), "pages"),
            StubFetcher::new("page"),
        );
        let images = UrlDiskCache::new(
            CacheConfig::new(dir.path(), "images"),
            StubFetcher::new("image"),
        );

        assert_eq!(pages.get_text(&u).await.unwrap(), "page");
        assert_eq!(images.get_text(&u).await.unwrap(), "image");
        assert!(pages.delete(&u).await.unwrap());
        assert!(images.contains(&u).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        struct BinaryFetcher;

        #[async_trait]
        impl Fetcher for BinaryFetcher {
            async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
                Ok(Bytes::from_static(&[b'o', b'k', 0xff]))
            }
        }

        let dir = tempdir().unwrap();
        let cache = cache(dir.path(), Arc::new(BinaryFetcher));
        let text = cache.get_text(&url("http://example.com/bin")).await.unwrap();
        assert_eq!(text, "ok\u{fffd}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use() {
        let dir = tempdir().unwrap();
        let fetcher = StubFetcher::new("hello");
        let cache = Arc::new(cache(dir.path(), fetcher.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .get_text(&url(&format!("http://example.com/item/{i}")))
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "hello");
        }
        assert_eq!(cache.len().await.unwrap(), 8);
        assert_eq!(fetcher.calls(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_shares_one_scan() {
        let dir = tempdir().unwrap();
        let u = url("http://example.com/seeded");
        cache(dir.path(), StubFetcher::new("seeded"))
            .get(&u)
            .await
            .unwrap();

        let fetcher = StubFetcher::new("fresh");
        let cache = Arc::new(cache(dir.path(), fetcher.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let u = u.clone();
                tokio::spawn(async move { cache.get_text(&u).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "seeded");
        }
        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(fetcher.calls(), 0);
    }
}
