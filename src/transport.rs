//! Shared HTTP transport configuration
//!
//! The service owns one [`TransportBuilder`] and reuses it for every client
//! build. Users may replace it to customize timeouts or install their own
//! middleware; the service inserts and removes its attestation interceptor
//! on the same ordered list, so each slot carries an attestation marker.

use std::sync::Arc;
use std::time::Duration;

use reqwest_middleware::Middleware;

/// One entry in the ordered middleware list.
#[derive(Clone)]
pub(crate) struct MiddlewareSlot {
    pub(crate) middleware: Arc<dyn Middleware>,
    /// Set only on slots the service installed for attestation.
    pub(crate) attestation: bool,
}

/// Builder for the shared underlying HTTP transport.
#[derive(Clone, Default)]
pub struct TransportBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    slots: Vec<MiddlewareSlot>,
}

impl TransportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Connection establishment timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Append a user middleware to the ordered list.
    pub fn add_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.slots.push(MiddlewareSlot {
            middleware,
            attestation: false,
        });
        self
    }

    /// Drop every attestation slot, leaving user middleware untouched.
    pub(crate) fn remove_attestation_middleware(&mut self) {
        self.slots.retain(|slot| !slot.attestation);
    }

    /// Append a service-owned attestation interceptor slot.
    pub(crate) fn add_attestation_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.slots.push(MiddlewareSlot {
            middleware,
            attestation: true,
        });
    }

    pub(crate) fn slots(&self) -> &[MiddlewareSlot] {
        &self.slots
    }

    /// Build the underlying reqwest client, optionally with a pinned TLS
    /// configuration.
    pub(crate) fn build_reqwest(
        &self,
        tls: Option<rustls::ClientConfig>,
    ) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        if let Some(tls) = tls {
            builder = builder.use_preconfigured_tls(tls);
        }
        builder.build()
    }
}
