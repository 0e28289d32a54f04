//! # Configuration builders
//!
//! Fluent builders for [`CacheConfig`] and [`HttpFetcherConfig`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use url_disk_cache::{CacheConfig, HttpFetcherConfig};
//!
//! let cache_config = CacheConfig::builder()
//!     .with_base_dir("/var/cache/urls")
//!     .with_tag("pages")
//!     .build();
//!
//! let fetcher_config = HttpFetcherConfig::builder()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .build();
//! # let _ = (cache_config, fetcher_config);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{CacheConfig, HttpFetcherConfig, type_tag};
use crate::proxy::ProxyConfig;

/// Builder for [`CacheConfig`]
#[derive(Debug, Clone, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base directory shared by all tags
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = Some(base_dir.into());
        self
    }

    /// Set the namespace subdirectory
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.tag = tag.into();
        self
    }

    /// Use the unqualified name of `T` as the tag
    pub fn with_tag_for<T: ?Sized>(mut self) -> Self {
        self.config.tag = type_tag::<T>();
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}

/// Builder for [`HttpFetcherConfig`]
#[derive(Debug, Clone)]
pub struct HttpFetcherConfigBuilder {
    config: HttpFetcherConfig,
}

impl HttpFetcherConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpFetcherConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a default header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Route fetches through `proxy`; system proxy settings stop applying
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self.config.use_system_proxy = false;
        self
    }

    /// Ignored once an explicit proxy is set
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        if self.config.proxy.is_none() {
            self.config.use_system_proxy = use_system_proxy;
        }
        self
    }

    /// Skip server certificate validation. Only for testing against
    /// self-signed hosts.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.danger_accept_invalid_certs = accept;
        self
    }

    pub fn build(self) -> HttpFetcherConfig {
        self.config
    }
}

impl Default for HttpFetcherConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
