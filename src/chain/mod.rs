//! Chain module - per-domain RPC clients and the domain registry
//!
//! Each participating domain gets one `ChainClient` wrapping an HTTP
//! provider and a signer keyed to that domain. Clients are immutable for
//! the process lifetime and shared by reference.

pub mod client;

pub use client::ChainClient;

use crate::config::Settings;
use crate::error::{BridgeError, BridgeResult};

use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Holds connected clients for all enabled domains, keyed by domain ID
pub struct DomainRegistry {
    clients: DashMap<u32, Arc<ChainClient>>,
}

impl DomainRegistry {
    /// Connect clients for every enabled domain in the configuration
    pub async fn connect(settings: &Settings) -> BridgeResult<Self> {
        let clients = DashMap::new();

        for (name, domain) in settings.enabled_domains() {
            info!(
                "Connecting domain {} (ID: {})",
                name, domain.domain_id
            );
            let client = ChainClient::connect(domain, settings.polling.clone()).await?;
            clients.insert(domain.domain_id, Arc::new(client));
        }

        Ok(Self { clients })
    }

    /// Get the client for a specific domain
    pub fn get(&self, domain_id: u32) -> BridgeResult<Arc<ChainClient>> {
        self.clients
            .get(&domain_id)
            .map(|c| c.clone())
            .ok_or(BridgeError::DomainNotFound { domain_id })
    }

    /// Probe every connected domain's RPC endpoint
    pub async fn health_check(&self) -> Vec<(u32, bool)> {
        let mut results = Vec::new();

        for entry in self.clients.iter() {
            let domain_id = *entry.key();
            let healthy = entry.value().get_block_number().await.is_ok();
            crate::metrics::record_domain_health(domain_id, healthy);
            results.push((domain_id, healthy));
        }

        results
    }
}
