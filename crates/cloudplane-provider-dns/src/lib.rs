// # DNS Services Provider
//
// This crate provides private DNS resources for cloudplane:
//
// - `ibm_dns_permitted_network`: VPCs allowed to resolve a private zone
// - `ibm_dns_glb_monitor`: health checks for DNS global load balancers
//
// ## Concurrency
//
// The service rejects concurrent permitted-network changes within one zone.
// Those calls hold the process-wide named lock
// `private_dns_permitted_network_<instance><zone>`.
//
// ## API Reference
//
// - DNS Services v1: `https://api.dns-svcs.cloud.ibm.com/v1`

pub mod api;
pub mod client;
pub mod monitor;
pub mod permitted_network;

pub use client::DnsClient;
pub use monitor::{MonitorRecord, MonitorResource};
pub use permitted_network::{PermittedNetworkRecord, PermittedNetworkResource};

use cloudplane_core::{ProviderConfig, ResourceRegistry, Result};
use std::sync::Arc;

/// Register this crate's resources
///
/// # Returns
///
/// - `Err(Error::ClientInit)`: If the API key is empty
pub fn register(registry: &ResourceRegistry, config: &ProviderConfig) -> Result<()> {
    let client = Arc::new(DnsClient::new(config)?);

    registry.register_resource(PermittedNetworkResource::new(client.clone()));
    registry.register_resource(MonitorResource::new(client));
    Ok(())
}
