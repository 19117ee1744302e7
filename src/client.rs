//! Client configuration handles and built clients
//!
//! [`ClientConfig`] is the identity key for the service's client cache: each
//! handle carries a process-unique id, so two handles are two cache entries
//! even when structurally equal. Hold the handle stable across
//! [`get_client`](crate::ApproovService::get_client) calls to benefit from
//! caching.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::Serialize;

static NEXT_CONFIG_ID: AtomicU64 = AtomicU64::new(1);

/// User-supplied configuration for an API client, not yet built.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    id: u64,
    base_url: Url,
    default_headers: HeaderMap,
}

impl ClientConfig {
    /// A configuration rooted at `base_url`. Requests join their paths onto
    /// this URL.
    pub fn new(base_url: Url) -> Self {
        ClientConfig {
            id: NEXT_CONFIG_ID.fetch_add(1, Ordering::Relaxed),
            base_url,
            default_headers: HeaderMap::new(),
        }
    }

    /// Add a header applied to every request made through the built client.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// The cache identity of this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// An HTTP client produced by the service: the user's configuration bound
/// to a pinned, interceptor-equipped transport.
pub struct BuiltClient {
    base_url: Url,
    default_headers: HeaderMap,
    http: ClientWithMiddleware,
}

impl BuiltClient {
    pub(crate) fn new(config: &ClientConfig, http: ClientWithMiddleware) -> Self {
        BuiltClient {
            base_url: config.base_url.clone(),
            default_headers: config.default_headers.clone(),
            http,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying middleware-equipped client, for requests that need
    /// full control.
    pub fn http(&self) -> &ClientWithMiddleware {
        &self.http
    }

    /// Start a request for `path` relative to the base URL.
    pub fn request(&self, method: Method, path: &str) -> crate::Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|_| crate::Error::InvalidRequestPath(path.to_string()))?;
        Ok(self
            .http
            .request(method, url)
            .headers(self.default_headers.clone()))
    }

    pub fn get(&self, path: &str) -> crate::Result<RequestBuilder> {
        self.request(Method::GET, path)
    }

    /// A POST of `body` serialized as JSON.
    pub fn post_json<B: Serialize>(&self, path: &str, body: &B) -> crate::Result<RequestBuilder> {
        Ok(self.request(Method::POST, path)?.json(body))
    }
}
