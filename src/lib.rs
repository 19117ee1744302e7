//! # Approov Mediation Layer
//!
//! Client-side HTTP mediation for apps that prove their integrity to their
//! backend with Approov attestation tokens, while defeating on-device
//! man-in-the-middle interception through TLS certificate pinning.
//!
//! The crate sits between the application and the attestation SDK:
//!
//! 1. [`ApproovService`] initializes the provider (replaying any persisted
//!    dynamic configuration), then acts as a factory for HTTP clients.
//! 2. Each client it builds carries a certificate-pinning policy derived
//!    from the provider's current pin set (base64 SPKI SHA-256 digests per
//!    domain) and an [`interceptor`](interceptor::ApproovInterceptor) that
//!    fetches a token per request.
//! 3. Every outbound request gets an `Approov-Token` header, optionally
//!    bound to the value of a designated request header so the token
//!    cryptographically commits to it.
//!
//! Clients are cached by the caller's [`ClientConfig`] handle and rebuilt
//! whenever pin inputs change, so pins can be rotated server-side without
//! shipping an app update.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use approov_mediation::{ApproovService, ClientConfig};
//!
//! # async fn run(provider: Arc<dyn approov_mediation::AttestationProvider>) -> anyhow::Result<()> {
//! let service = ApproovService::new(provider, "/data/local/myapp", "#123456#initial-config");
//! service.set_binding_header(Some("Authorization"));
//! service.prefetch_token();
//!
//! let shapes = ClientConfig::new("https://shapes.approov.io/v2/".parse()?);
//! let client = service.get_client(&shapes)?;
//! let response = client.get("shapes")?.send().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod interceptor;
pub mod pinning;
pub mod provider;
pub mod service;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_util;

pub use client::{BuiltClient, ClientConfig};
pub use error::{Error, Result};
pub use provider::{
    AttestationProvider, PinSet, ProviderError, TokenFetchResult, TokenFetchStatus,
};
pub use service::ApproovService;
pub use store::ConfigStore;
pub use transport::TransportBuilder;
