use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::error::{CacheError, CacheResult};
use crate::proxy::ProxyConfig;

/// Environment variable read by [`CacheConfig::from_env`]
pub const BASE_DIR_ENV: &str = "URL_DISK_CACHE_BASE_DIR";

const DEFAULT_USER_AGENT: &str = concat!("url-disk-cache/", env!("CARGO_PKG_VERSION"));

/// Where a cache keeps its files.
///
/// The cache root is `<base_dir>/<tag>`. Caches sharing a base directory
/// but using different tags never see each other's files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Base directory shared by all tags
    pub base_dir: Option<PathBuf>,
    /// Namespace subdirectory for this cache
    pub tag: String,
}

impl CacheConfig {
    pub fn new(base_dir: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            tag: tag.into(),
        }
    }

    pub fn builder() -> crate::builder::CacheConfigBuilder {
        crate::builder::CacheConfigBuilder::new()
    }

    /// Tag the cache with the unqualified name of `T`
    pub fn for_type<T: ?Sized>(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(base_dir, type_tag::<T>())
    }

    /// Read the base directory from [`BASE_DIR_ENV`].
    ///
    /// A missing variable is not an error here; it surfaces as
    /// [`CacheError::Configuration`] on the first cache operation.
    pub fn from_env(tag: impl Into<String>) -> Self {
        Self::from_lookup(tag, |name| std::env::var_os(name))
    }

    pub(crate) fn from_lookup(
        tag: impl Into<String>,
        lookup: impl FnOnce(&str) -> Option<OsString>,
    ) -> Self {
        Self {
            base_dir: lookup(BASE_DIR_ENV).map(PathBuf::from),
            tag: tag.into(),
        }
    }

    /// Resolve `<base_dir>/<tag>`
    pub fn root_dir(&self) -> CacheResult<PathBuf> {
        match &self.base_dir {
            Some(base) if !base.as_os_str().is_empty() => Ok(base.join(&self.tag)),
            _ => Err(CacheError::Configuration(format!(
                "Cache base dir expected (set it explicitly or use {BASE_DIR_ENV})"
            ))),
        }
    }
}

/// Unqualified name of a type, generic arguments stripped
pub fn type_tag<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path).to_owned()
}

/// Configurable options for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,

    /// Accept any server certificate
    pub danger_accept_invalid_certs: bool,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpFetcherConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
            danger_accept_invalid_certs: false,
        }
    }
}

impl HttpFetcherConfig {
    pub fn builder() -> crate::builder::HttpFetcherConfigBuilder {
        crate::builder::HttpFetcherConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers
    }
}
