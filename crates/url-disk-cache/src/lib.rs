//! # url-disk-cache
//!
//! A disk-backed cache mapping URLs to previously fetched content, so the
//! same content is not downloaded again across process runs.
//!
//! ## Features
//!
//! - Stable MD5 keys and a browsable `<host>/<shard>/<key>.<path>` tree
//! - Index rebuilt from disk on first use, scanned exactly once
//! - Fetch-on-miss through a pluggable [`Fetcher`], reqwest by default
//!
//! ```no_run
//! use url::Url;
//! use url_disk_cache::{CacheConfig, HttpFetcherConfig, UrlDiskCache};
//!
//! # async fn run() -> url_disk_cache::CacheResult<()> {
//! let cache = UrlDiskCache::with_http(
//!     CacheConfig::from_env("pages"),
//!     &HttpFetcherConfig::default(),
//! )?;
//! let url = Url::parse("https://example.com/index.html").expect("valid url");
//! let html = cache.get_text(&url).await?;
//! # let _ = html;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod proxy;

pub use builder::{CacheConfigBuilder, HttpFetcherConfigBuilder};
pub use cache::{CacheIndex, UrlDiskCache, derive_key, derive_path};
pub use config::{BASE_DIR_ENV, CacheConfig, HttpFetcherConfig, type_tag};
pub use error::{CacheError, CacheResult, FetchError};
pub use fetcher::{Fetcher, HttpFetcher, create_client};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
