//! Non-volatile storage for the dynamic configuration
//!
//! The dynamic configuration is an opaque string the attestation provider
//! emits after initialization and may revise at runtime. It is kept under a
//! single well-known key so a subsequent launch can hand it straight back to
//! the provider. Storage failure degrades silently: the next run re-fetches
//! the configuration from the provider.

use std::fs;
use std::path::PathBuf;

// Namespace and key mirror the platform shared-preferences layout.
const APPROOV_PREFS: &str = "approov-prefs";
const APPROOV_CONFIG: &str = "approov-config";

/// File-backed store for the dynamic configuration string.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    namespace: PathBuf,
}

impl ConfigStore {
    /// Create a store rooted at the process's local storage directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ConfigStore {
            namespace: root.into().join(APPROOV_PREFS),
        }
    }

    fn key_path(&self) -> PathBuf {
        self.namespace.join(APPROOV_CONFIG)
    }

    /// The persisted dynamic configuration, or `None` if absent.
    pub fn get(&self) -> Option<String> {
        fs::read_to_string(self.key_path()).ok()
    }

    /// Persist the dynamic configuration; `None` removes the key.
    pub fn put(&self, config: Option<&str>) {
        let path = self.key_path();
        let outcome = match config {
            Some(value) => fs::create_dir_all(&self.namespace)
                .and_then(|_| fs::write(&path, value)),
            None => match fs::remove_file(&path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = outcome {
            tracing::warn!("Approov dynamic configuration not persisted: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert_eq!(store.get(), None);
    }

    #[test]
    fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store.put(Some("dyn-cfg-1"));
        assert_eq!(store.get().as_deref(), Some("dyn-cfg-1"));
        store.put(Some("dyn-cfg-2"));
        assert_eq!(store.get().as_deref(), Some("dyn-cfg-2"));
    }

    #[test]
    fn put_none_removes_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store.put(Some("dyn-cfg"));
        store.put(None);
        assert_eq!(store.get(), None);
        // removing an absent key is not an error
        store.put(None);
        assert_eq!(store.get(), None);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        ConfigStore::new(dir.path()).put(Some("persisted"));
        let reopened = ConfigStore::new(dir.path());
        assert_eq!(reopened.get().as_deref(), Some("persisted"));
    }
}
