// # Cloud Internet Services Provider
//
// This crate provides CIS zone security resources for cloudplane:
//
// - `ibm_cis_firewall_rules`: firewall rules bound to existing filters
// - `ibm_cis_mtls`: client CA certificates for mutual TLS
//
// Both are identified by `<entity>/<zone>/<cis_crn>`.
//
// ## Security Requirements
//
// - API key NEVER appears in logs
// - Certificate bodies NEVER appear in logs or Debug output
//
// ## API Reference
//
// - CIS v1: `https://api.cis.cloud.ibm.com/v1/:crn/zones/:zone_id/...`
// - Every response is wrapped in `{"success", "errors", "result"}`

pub mod api;
pub mod client;
pub mod firewall_rules;
pub mod mtls;

pub use client::CisClient;
pub use firewall_rules::{FirewallAction, FirewallRuleRecord, FirewallRuleResource};
pub use mtls::{MtlsRecord, MtlsResource};

use cloudplane_core::{ProviderConfig, ResourceRegistry, Result};
use std::sync::Arc;

/// Register this crate's resources
///
/// # Returns
///
/// - `Err(Error::ClientInit)`: If the API key is empty
pub fn register(registry: &ResourceRegistry, config: &ProviderConfig) -> Result<()> {
    let client = Arc::new(CisClient::new(config)?);

    registry.register_resource(FirewallRuleResource::new(client.clone(), client.clone()));
    registry.register_resource(MtlsResource::new(client));
    Ok(())
}
