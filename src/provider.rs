//! Bridge to the native Approov attestation SDK
//!
//! The SDK itself is an opaque native library with process-wide state. The
//! mediation layer consumes it through the [`AttestationProvider`] trait so
//! that the service, interceptor, and tests are independent of the concrete
//! binding in use.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Algorithm identifier for public-key pins, as understood by the SDK.
pub const PIN_ALGORITHM: &str = "public-key-sha256";

/// Pin material: domain name to ordered base64 SPKI SHA-256 digests.
pub type PinSet = HashMap<String, Vec<String>>;

/// Outcome classification of a token fetch.
///
/// Four codes allow the request to proceed (`Success` with a token attached,
/// the other three unchanged); everything else aborts the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFetchStatus {
    Success,
    NoApproovService,
    UnknownUrl,
    UnprotectedUrl,
    NoNetwork,
    PoorNetwork,
    MitmDetected,
    BadUrl,
    NotInitialized,
    Rejected,
    Disabled,
    InternalError,
}

impl TokenFetchStatus {
    /// True for the statuses that let the request proceed without a token.
    pub fn is_pass_through(self) -> bool {
        matches!(
            self,
            TokenFetchStatus::Success
                | TokenFetchStatus::NoApproovService
                | TokenFetchStatus::UnknownUrl
                | TokenFetchStatus::UnprotectedUrl
        )
    }
}

impl fmt::Display for TokenFetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenFetchStatus::Success => "SUCCESS",
            TokenFetchStatus::NoApproovService => "NO_APPROOV_SERVICE",
            TokenFetchStatus::UnknownUrl => "UNKNOWN_URL",
            TokenFetchStatus::UnprotectedUrl => "UNPROTECTED_URL",
            TokenFetchStatus::NoNetwork => "NO_NETWORK",
            TokenFetchStatus::PoorNetwork => "POOR_NETWORK",
            TokenFetchStatus::MitmDetected => "MITM_DETECTED",
            TokenFetchStatus::BadUrl => "BAD_URL",
            TokenFetchStatus::NotInitialized => "NOT_INITIALIZED",
            TokenFetchStatus::Rejected => "REJECTED",
            TokenFetchStatus::Disabled => "DISABLED",
            TokenFetchStatus::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(name)
    }
}

/// Result of a token fetch from the attestation provider.
#[derive(Debug, Clone)]
pub struct TokenFetchResult {
    pub status: TokenFetchStatus,
    /// The token string; empty unless `status` is `Success`.
    pub token: String,
    /// Redacted rendering of the token, safe for logs.
    pub loggable_token: String,
    /// The provider has a revised dynamic configuration to persist.
    pub is_config_changed: bool,
    /// The provider's pin set must be applied before further requests.
    pub is_force_apply_pins: bool,
}

impl TokenFetchResult {
    /// A successful fetch carrying `token`.
    pub fn success(token: impl Into<String>) -> Self {
        let token = token.into();
        let loggable_token = format!("{{\"did\":\"<redacted>\",\"exp\":0}} [{} bytes]", token.len());
        TokenFetchResult {
            status: TokenFetchStatus::Success,
            token,
            loggable_token,
            is_config_changed: false,
            is_force_apply_pins: false,
        }
    }

    /// A tokenless result with the given status.
    pub fn status(status: TokenFetchStatus) -> Self {
        TokenFetchResult {
            status,
            token: String::new(),
            loggable_token: status.to_string(),
            is_config_changed: false,
            is_force_apply_pins: false,
        }
    }

    pub fn with_config_changed(mut self) -> Self {
        self.is_config_changed = true;
        self
    }

    pub fn with_force_apply_pins(mut self) -> Self {
        self.is_force_apply_pins = true;
        self
    }
}

/// Initialization failure reported by the attestation SDK.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
}

/// The attestation SDK surface consumed by the mediation layer.
///
/// Implementations wrap a process-wide singleton; the crate never calls
/// `initialize` more than once per service construction and shares the
/// provider by `Arc` between the service and its interceptors.
#[async_trait]
pub trait AttestationProvider: Send + Sync + 'static {
    /// One-time SDK initialization with the app's initial config string and
    /// any previously persisted dynamic configuration.
    fn initialize(
        &self,
        initial_config: &str,
        dynamic_config: Option<&str>,
        comment: Option<&str>,
    ) -> Result<(), ProviderError>;

    /// The SDK's current dynamic configuration string.
    fn fetch_config(&self) -> Option<String>;

    /// Current pin material for the given algorithm identifier.
    fn get_pins(&self, algorithm: &str) -> PinSet;

    /// Fetch a token for `host`. Awaiting this is the per-request blocking
    /// point; spawned, it serves the prefetch path.
    async fn fetch_token(&self, host: &str) -> TokenFetchResult;

    /// Bind arbitrary bytes into the next issued token's data hash.
    fn set_data_hash_in_token(&self, data: &[u8]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_statuses() {
        assert!(TokenFetchStatus::Success.is_pass_through());
        assert!(TokenFetchStatus::NoApproovService.is_pass_through());
        assert!(TokenFetchStatus::UnknownUrl.is_pass_through());
        assert!(TokenFetchStatus::UnprotectedUrl.is_pass_through());
        assert!(!TokenFetchStatus::Rejected.is_pass_through());
        assert!(!TokenFetchStatus::NoNetwork.is_pass_through());
    }

    #[test]
    fn status_names() {
        assert_eq!(TokenFetchStatus::Success.to_string(), "SUCCESS");
        assert_eq!(TokenFetchStatus::UnknownUrl.to_string(), "UNKNOWN_URL");
        assert_eq!(TokenFetchStatus::MitmDetected.to_string(), "MITM_DETECTED");
    }

    #[test]
    fn success_result_redacts_token() {
        let result = TokenFetchResult::success("TKN1");
        assert_eq!(result.token, "TKN1");
        assert!(!result.loggable_token.contains("TKN1"));
    }
}
