//! Error types for the Approov mediation layer

use thiserror::Error;

use crate::provider::TokenFetchStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Approov missing token binding header: {0}")]
    MissingBindingHeader(String),

    #[error("Approov token fetch failed: {0}")]
    TokenFetch(TokenFetchStatus),

    #[error("TLS pinning setup failed: {0}")]
    Pinning(String),

    #[error("Approov token not valid as a header value: {0}")]
    InvalidTokenHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("HTTP transport build failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid request path: {0}")]
    InvalidRequestPath(String),
}

impl Error {
    /// Wrap for delivery through the middleware chain's failure path.
    pub(crate) fn into_middleware(self) -> reqwest_middleware::Error {
        reqwest_middleware::Error::Middleware(anyhow::Error::new(self))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
