// # Hyper Protect Crypto Services Provider
//
// This crate provides the `ibm_hpcs` data source: a read-only lookup of an
// HPCS instance by name that reports its plan, endpoints, unit counts and
// the configuration of every crypto unit.
//
// ## API Reference
//
// - Resource controller v2: `https://resource-controller.cloud.ibm.com/v2/resource_instances`
// - Global catalog v1: `https://globalcatalog.cloud.ibm.com/api/v1`
// - Crypto units: `https://<region>.broker.hs-crypto.cloud.ibm.com/crypto_v2/instances/:guid/hsms`

pub mod api;
pub mod client;
pub mod instance;

pub use client::{CatalogClient, CryptoUnitClient, ResourceControllerClient};
pub use instance::{HpcsDataSource, HpcsQuery, HpcsRecord, ServiceEndpoints};

use cloudplane_core::{ProviderConfig, ResourceRegistry, Result};
use std::sync::Arc;

/// Register this crate's data sources
///
/// # Returns
///
/// - `Err(Error::ClientInit)`: If the API key is empty
pub fn register(registry: &ResourceRegistry, config: &ProviderConfig) -> Result<()> {
    let instances = Arc::new(ResourceControllerClient::new(config)?);
    let catalog = Arc::new(CatalogClient::new(config)?);
    let crypto_units = Arc::new(CryptoUnitClient::new(config)?);

    registry.register_data_source(HpcsDataSource::new(instances, catalog, crypto_units));
    Ok(())
}
