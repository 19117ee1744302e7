//! Shared test support: an in-memory attestation provider

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::provider::{
    AttestationProvider, PinSet, ProviderError, TokenFetchResult, TokenFetchStatus,
};

/// Scriptable provider recording every interaction.
pub(crate) struct MockProvider {
    fail_init: bool,
    dynamic_config: Option<String>,
    pins: PinSet,
    queued_tokens: Mutex<VecDeque<TokenFetchResult>>,
    init_calls: Mutex<Vec<(String, Option<String>)>>,
    fetched_hosts: Mutex<Vec<String>>,
    data_hashes: Mutex<Vec<Vec<u8>>>,
    pin_queries: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        MockProvider {
            fail_init: false,
            dynamic_config: Some("dyn-default".into()),
            pins: PinSet::new(),
            queued_tokens: Mutex::new(VecDeque::new()),
            init_calls: Mutex::new(Vec::new()),
            fetched_hosts: Mutex::new(Vec::new()),
            data_hashes: Mutex::new(Vec::new()),
            pin_queries: AtomicUsize::new(0),
        }
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn with_dynamic_config(mut self, config: &str) -> Self {
        self.dynamic_config = Some(config.into());
        self
    }

    pub fn with_pins(mut self, pins: PinSet) -> Self {
        self.pins = pins;
        self
    }

    pub fn queue_token(&self, result: TokenFetchResult) {
        self.queued_tokens.lock().unwrap().push_back(result);
    }

    pub fn init_calls(&self) -> Vec<(String, Option<String>)> {
        self.init_calls.lock().unwrap().clone()
    }

    pub fn fetched_hosts(&self) -> Vec<String> {
        self.fetched_hosts.lock().unwrap().clone()
    }

    pub fn data_hashes(&self) -> Vec<Vec<u8>> {
        self.data_hashes.lock().unwrap().clone()
    }

    pub fn pin_queries(&self) -> usize {
        self.pin_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationProvider for MockProvider {
    fn initialize(
        &self,
        initial_config: &str,
        dynamic_config: Option<&str>,
        _comment: Option<&str>,
    ) -> Result<(), ProviderError> {
        self.init_calls
            .lock()
            .unwrap()
            .push((initial_config.into(), dynamic_config.map(String::from)));
        if self.fail_init {
            Err(ProviderError::IllegalArgument("bad config".into()))
        } else {
            Ok(())
        }
    }

    fn fetch_config(&self) -> Option<String> {
        self.dynamic_config.clone()
    }

    fn get_pins(&self, _algorithm: &str) -> PinSet {
        self.pin_queries.fetch_add(1, Ordering::SeqCst);
        self.pins.clone()
    }

    async fn fetch_token(&self, host: &str) -> TokenFetchResult {
        self.fetched_hosts.lock().unwrap().push(host.to_string());
        self.queued_tokens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TokenFetchResult::status(TokenFetchStatus::NoApproovService))
    }

    fn set_data_hash_in_token(&self, data: &[u8]) {
        self.data_hashes.lock().unwrap().push(data.to_vec());
    }
}
