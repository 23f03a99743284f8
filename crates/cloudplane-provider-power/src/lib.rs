// # Power Virtual Server Provider
//
// This crate provides the `ibm_pi_network` resource for cloudplane.
//
// ## Behaviour
//
// - VLAN networks require a CIDR; the gateway and usable range default to
//   host 1 and hosts 4..size-2 of that CIDR
// - Public VLAN networks take their addressing from the service
// - Workspaces with a Power Edge Router are waited on until the router is
//   active before networks are created or read
// - Create failures are retried unless the request is rejected (400/422);
//   delete retries until the network is gone
//
// ## Security Requirements
//
// - API key NEVER appears in logs (see `RestClient`'s Debug)
// - Provider fails fast if the key is empty
//
// ## API Reference
//
// - Power networks: `/pcloud/v1/cloud-instances/:id/networks`
// - Workspaces: `/v1/workspaces/:id`
// - Global tagging: `/v3/tags`

pub mod api;
pub mod cidr;
pub mod client;
pub mod network;

pub use client::{PowerClient, TaggingClient};
pub use network::{NetworkRecord, NetworkResource, NetworkType, Toggle};

use cloudplane_core::{ProviderConfig, ResourceRegistry, Result};
use std::sync::Arc;

/// Register this crate's resources
///
/// # Parameters
///
/// - `registry`: Registry to add handlers to
/// - `config`: Provider configuration supplying credentials and endpoints
///
/// # Returns
///
/// - `Err(Error::ClientInit)`: If the API key is empty
pub fn register(registry: &ResourceRegistry, config: &ProviderConfig) -> Result<()> {
    let power = Arc::new(PowerClient::new(config)?);
    let tagging = Arc::new(TaggingClient::new(config)?);

    let networks = NetworkResource::new(
        power.clone(),
        power,
        tagging,
        config.poll.settings(),
    )
    .on_prem(config.on_prem);

    registry.register_resource(networks);
    Ok(())
}
