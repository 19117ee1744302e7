//! Per-request attestation interceptor
//!
//! Installed by the service on every client it builds. Each outbound request
//! is bound to a fresh attestation token fetched for the request's host; a
//! fetch that fails fatally aborts the request through the middleware
//! chain's normal failure path so the caller may retry.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Request, Response};
use http::Extensions;
use reqwest_middleware::{Middleware, Next};

use crate::error::{Error, Result};
use crate::provider::{AttestationProvider, TokenFetchResult, TokenFetchStatus};
use crate::service::ApproovService;

/// Header carrying the attestation token on outbound requests.
pub const APPROOV_HEADER: &str = "Approov-Token";

/// Prefix prepended to the token value, e.g. "Bearer " for backends that
/// expect one. Empty by default.
pub const APPROOV_TOKEN_PREFIX: &str = "";

/// Middleware that binds requests to Approov attestation tokens.
pub struct ApproovInterceptor {
    /// Back-reference for dynamic config updates; weak so cached clients do
    /// not keep the service alive.
    service: Weak<ApproovService>,
    provider: Arc<dyn AttestationProvider>,
    /// Binding header captured at client build time, or None.
    binding_header: Option<String>,
}

impl ApproovInterceptor {
    pub(crate) fn new(
        service: Weak<ApproovService>,
        provider: Arc<dyn AttestationProvider>,
        binding_header: Option<String>,
    ) -> Self {
        ApproovInterceptor {
            service,
            provider,
            binding_header,
        }
    }

    /// Token binding and fetch for one request; mutates the request in
    /// place. Split from `handle` so it is testable without a network.
    pub(crate) async fn prepare(&self, request: &mut Request) -> Result<()> {
        // update the data hash from any token binding header
        if let Some(header) = &self.binding_header {
            match request.headers().get(header.as_str()) {
                Some(value) => self.provider.set_data_hash_in_token(value.as_bytes()),
                None => return Err(Error::MissingBindingHeader(header.clone())),
            }
        }

        // request a token for the destination host
        let host = request.url().host_str().unwrap_or_default().to_string();
        let fetch = self.provider.fetch_token(&host).await;

        // the loggable form can be checked with "approov token -check"; token
        // annotations appear here to explain why a request is being rejected
        tracing::info!("Approov token for {}: {}", host, fetch.loggable_token);

        if fetch.is_config_changed {
            if let Some(service) = self.service.upgrade() {
                service.update_dynamic_config();
            }
        }

        // warn if pins need updating; the flush above means the next client
        // build picks them up, but this persists if the app never rebuilds
        if fetch.is_force_apply_pins {
            tracing::error!("Approov pins need to be updated");
        }

        self.dispatch(request, &fetch)
    }

    /// Apply the status table: attach the token, pass through, or fail.
    fn dispatch(&self, request: &mut Request, fetch: &TokenFetchResult) -> Result<()> {
        match fetch.status {
            TokenFetchStatus::Success => {
                let value =
                    HeaderValue::from_str(&format!("{}{}", APPROOV_TOKEN_PREFIX, fetch.token))?;
                request.headers_mut().insert(APPROOV_HEADER, value);
                Ok(())
            }
            status if status.is_pass_through() => Ok(()),
            status => Err(Error::TokenFetch(status)),
        }
    }
}

#[async_trait]
impl Middleware for ApproovInterceptor {
    async fn handle(
        &self,
        mut request: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        self.prepare(&mut request)
            .await
            .map_err(Error::into_middleware)?;
        next.run(request, extensions).await
    }
}

/// Handle a completed prefetch. The placeholder domain is expected to be
/// unknown to the account, so `UNKNOWN_URL` confirms the provider answered.
pub(crate) fn log_prefetch_result(fetch: &TokenFetchResult) {
    if fetch.status == TokenFetchStatus::UnknownUrl {
        tracing::info!("Approov prefetch success");
    } else {
        tracing::info!("Approov prefetch failure: {}", fetch.status);
    }
}
