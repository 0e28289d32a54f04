use reqwest::Proxy;

use crate::error::FetchError;

/// Which requests go through the proxy. `Socks5` and `All` cover every
/// scheme; a bare `host:port` is assumed to be `socks5://` for `Socks5`.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ProxyType {
    Http,
    Https,
    Socks5,
    All,
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy used by the HTTP fetcher
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn to_proxy(&self) -> Result<Proxy, FetchError> {
        let invalid = |kind: &str, e: reqwest::Error| {
            FetchError::InvalidConfig(format!("Invalid {kind} proxy URL {}: {e}", self.url))
        };

        let mut proxy = match self.proxy_type {
            ProxyType::Http => Proxy::http(&self.url).map_err(|e| invalid("HTTP", e))?,
            ProxyType::Https => Proxy::https(&self.url).map_err(|e| invalid("HTTPS", e))?,
            ProxyType::Socks5 => {
                let url = if self.url.starts_with("socks5://") {
                    self.url.clone()
                } else {
                    format!("socks5://{}", self.url)
                };
                Proxy::all(&url).map_err(|e| invalid("SOCKS5", e))?
            }
            ProxyType::All => Proxy::all(&self.url).map_err(|e| invalid("generic", e))?,
        };

        if let Some(auth) = &self.auth {
            proxy = proxy.basic_auth(&auth.username, &auth.password);
        }

        Ok(proxy)
    }
}
