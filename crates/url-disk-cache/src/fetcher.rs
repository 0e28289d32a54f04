//! # HTTP collaborator
//!
//! The cache talks to the network only through the [`Fetcher`] trait.
//! [`HttpFetcher`] is the reqwest-backed implementation used in production.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info, warn};

use crate::config::HttpFetcherConfig;
use crate::error::FetchError;

/// Fetches the full body of a URL.
///
/// Implementations report any network or protocol failure as an error and
/// must not retry on the cache's behalf.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &HttpFetcherConfig) -> Result<Client, FetchError> {
    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if config.danger_accept_invalid_certs {
        // the platform verifier has no relaxed mode
        warn!("TLS certificate validation disabled for fetches");
        client_builder = client_builder.danger_accept_invalid_certs(true);
    } else {
        client_builder = client_builder.use_preconfigured_tls(platform_tls_config()?);
    }

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.pool_idle_timeout.is_zero() {
        client_builder = client_builder.pool_idle_timeout(config.pool_idle_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        client_builder = client_builder.proxy(proxy_config.to_proxy()?);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy for fetches");
    } else if config.use_system_proxy {
        debug!("Using system proxy settings for fetches");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for fetches");
    }

    client_builder.build().map_err(FetchError::from)
}

fn platform_tls_config() -> Result<ClientConfig, FetchError> {
    let provider = Arc::new(ring::default_provider());

    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FetchError::InvalidConfig(format!("TLS protocol versions: {e}")))?
        .with_platform_verifier()
        .map_err(|e| FetchError::InvalidConfig(format!("TLS platform verifier: {e}")))?
        .with_no_client_auth())
}

/// [`Fetcher`] backed by a reqwest [`Client`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpFetcherConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    /// Wrap an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::StatusCode(status));
        }

        let body = response.bytes().await?;
        debug!(url, size = body.len(), "Fetched content");
        Ok(body)
    }
}
