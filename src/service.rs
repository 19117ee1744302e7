//! The Approov mediation service
//!
//! Owns the attestation provider lifecycle and acts as the factory for
//! pinned, interceptor-equipped HTTP clients. Built clients are cached by
//! the identity of the caller's [`ClientConfig`] handle; any change to the
//! inputs of pinning (dynamic config refresh, transport replacement, binding
//! header change) flushes the cache so the next build re-reads pins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use reqwest_middleware::ClientBuilder;

use crate::client::{BuiltClient, ClientConfig};
use crate::error::Result;
use crate::interceptor::{log_prefetch_result, ApproovInterceptor};
use crate::pinning::pinned_tls_config;
use crate::provider::{AttestationProvider, PIN_ALGORITHM};
use crate::store::ConfigStore;
use crate::transport::TransportBuilder;

/// Placeholder domain used to warm the provider's token cache. It does not
/// need to be a registered API for the account.
const PREFETCH_DOMAIN: &str = "www.approov.io";

/// Mutable service state, serialized by one service-wide lock. The lock is
/// never held across an await; the interceptor re-acquires it on its own
/// thread when a config change is signaled.
struct ServiceState {
    transport: TransportBuilder,
    binding_header: Option<String>,
    clients: HashMap<u64, Arc<BuiltClient>>,
}

/// Mediation layer between the application and the Approov SDK.
///
/// Treat as a per-process singleton: the underlying SDK is process-wide
/// state, and multiple services would race on initialization and on token
/// data hashes.
pub struct ApproovService {
    provider: Arc<dyn AttestationProvider>,
    store: ConfigStore,
    initialized: bool,
    state: Mutex<ServiceState>,
}

impl ApproovService {
    /// Create the service, initializing the attestation provider with
    /// `initial_config` and any previously persisted dynamic configuration
    /// under `storage_root`.
    ///
    /// Construction never fails: if the provider rejects its arguments the
    /// service runs degraded, still handing out clients but without pins or
    /// tokens.
    pub fn new(
        provider: Arc<dyn AttestationProvider>,
        storage_root: impl Into<PathBuf>,
        initial_config: &str,
    ) -> Arc<Self> {
        let store = ConfigStore::new(storage_root);
        let dynamic_config = store.get();

        let initialized =
            match provider.initialize(initial_config, dynamic_config.as_deref(), None) {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!("Approov initialization failed: {}", e);
                    false
                }
            };

        let service = Arc::new(ApproovService {
            provider,
            store,
            initialized,
            state: Mutex::new(ServiceState {
                transport: TransportBuilder::new(),
                binding_header: None,
                clients: HashMap::new(),
            }),
        });

        // first launch: persist the provider's dynamic configuration so
        // subsequent runs can hand it back at initialization
        if initialized && dynamic_config.is_none() {
            service.update_dynamic_config();
        }

        service
    }

    /// Whether provider initialization succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Warm the provider's token cache in the background to lower the
    /// latency of the first real fetch. Completion is logged only. Must be
    /// called within a Tokio runtime; a no-op when degraded.
    pub fn prefetch_token(&self) {
        if !self.initialized {
            return;
        }
        let provider = self.provider.clone();
        tokio::spawn(async move {
            let fetch = provider.fetch_token(PREFETCH_DOMAIN).await;
            log_prefetch_result(&fetch);
        });
    }

    /// Persist the provider's latest dynamic configuration and flush the
    /// client cache, since the pins may have changed and clients must be
    /// rebuilt. Safe to call from inside the interceptor.
    pub fn update_dynamic_config(&self) {
        tracing::info!("Approov dynamic configuration updated");
        let config = self.provider.fetch_config();
        self.store.put(config.as_deref());
        self.state.lock().unwrap().clients.clear();
    }

    /// Replace the shared transport builder used for all subsequent client
    /// builds. Flushes the client cache, so only call when an actual change
    /// is required.
    pub fn set_transport_builder(&self, transport: TransportBuilder) {
        let mut state = self.state.lock().unwrap();
        state.transport = transport;
        state.clients.clear();
    }

    /// Set the header whose value is hashed into issued tokens, binding
    /// them to the request context; `None` disables binding. Choose a header
    /// whose value is stable across requests, such as `Authorization`.
    /// Flushes the client cache when the value actually changes.
    pub fn set_binding_header(&self, header: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        if state.binding_header.as_deref() != header {
            state.binding_header = header.map(String::from);
            state.clients.clear();
        }
    }

    /// Get a client for `config`, building one on demand. Clients are
    /// cached by the handle's identity until an invalidating change; the
    /// pins applied reflect the provider's state at build time.
    pub fn get_client(self: &Arc<Self>, config: &ClientConfig) -> Result<Arc<BuiltClient>> {
        let mut state = self.state.lock().unwrap();
        if let Some(client) = state.clients.get(&config.id()) {
            return Ok(client.clone());
        }

        let http = if self.initialized {
            // fresh pins on every build
            let pins = self.provider.get_pins(PIN_ALGORITHM);
            let tls = pinned_tls_config(&pins)?;

            // exactly one attestation interceptor per client: drop any prior
            // instance before installing one bound to the current binding header
            state.transport.remove_attestation_middleware();
            let interceptor = ApproovInterceptor::new(
                Arc::downgrade(self),
                self.provider.clone(),
                state.binding_header.clone(),
            );
            state.transport.add_attestation_middleware(Arc::new(interceptor));

            tracing::info!("Building new Approov client");
            let reqwest_client = state.transport.build_reqwest(Some(tls))?;
            let mut builder = ClientBuilder::new(reqwest_client);
            for slot in state.transport.slots() {
                builder = builder.with_arc(slot.middleware.clone());
            }
            builder.build()
        } else {
            // degraded: neither pins nor tokens can be applied
            tracing::error!("Cannot build Approov client due to initialization failure");
            let reqwest_client = state.transport.build_reqwest(None)?;
            let mut builder = ClientBuilder::new(reqwest_client);
            for slot in state.transport.slots() {
                builder = builder.with_arc(slot.middleware.clone());
            }
            builder.build()
        };

        let client = Arc::new(BuiltClient::new(config, http));
        state.clients.insert(config.id(), client.clone());
        Ok(client)
    }

    #[cfg(test)]
    pub(crate) fn cached_client_count(&self) -> usize {
        self.state.lock().unwrap().clients.len()
    }

    #[cfg(test)]
    pub(crate) fn attestation_slot_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .transport
            .slots()
            .iter()
            .filter(|slot| slot.attestation)
            .count()
    }
}
