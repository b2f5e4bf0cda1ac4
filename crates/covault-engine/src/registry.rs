//! Per-chain coordination service registry
//!
//! One HTTP client per chain id, created on first use and shared afterwards.
//! The registry is an explicit owned object rather than ambient module
//! state, so tests can clear it and sessions can hold their own.

use crate::service::HttpCoordinationService;
use covault_types::{CoordinationConfig, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Cache of coordination service clients keyed by chain id
#[derive(Default)]
pub struct ServiceRegistry {
    clients: Mutex<HashMap<String, Arc<HttpCoordinationService>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the client for a chain, creating it on first use
    pub fn get_or_create(
        &self,
        chain_id: &str,
        config: &CoordinationConfig,
    ) -> Result<Arc<HttpCoordinationService>> {
        let mut clients = self.clients.lock().expect("registry lock poisoned");
        if let Some(client) = clients.get(chain_id) {
            return Ok(client.clone());
        }

        let client = Arc::new(HttpCoordinationService::new(
            &config.endpoint,
            Duration::from_secs(config.timeout_secs),
        )?);
        debug!(chain_id, endpoint = %config.endpoint, "coordination service client created");
        clients.insert(chain_id.to_string(), client.clone());
        Ok(client)
    }

    /// Number of cached clients
    pub fn len(&self) -> usize {
        self.clients.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached client
    pub fn clear(&self) {
        self.clients.lock().expect("registry lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CoordinationConfig {
        CoordinationConfig {
            enabled: true,
            endpoint: "http://localhost:8787".to_string(),
            supported_chains: vec!["covault-local".to_string()],
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_clients_are_reused_per_chain() {
        let registry = ServiceRegistry::new();
        let a = registry.get_or_create("chain-a", &config()).unwrap();
        let b = registry.get_or_create("chain-a", &config()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        registry.get_or_create("chain-b", &config()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clear_resets_cache() {
        let registry = ServiceRegistry::new();
        registry.get_or_create("chain-a", &config()).unwrap();
        assert!(!registry.is_empty());
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_endpoint_is_not_cached() {
        let registry = ServiceRegistry::new();
        let mut bad = config();
        bad.endpoint = "not a url".to_string();
        assert!(registry.get_or_create("chain-a", &bad).is_err());
        assert!(registry.is_empty());
    }
}
