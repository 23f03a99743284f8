//! REST implementations of the lookup APIs
//!
//! ## API Reference
//!
//! - List instances: GET `/v2/resource_instances?name=&resource_group_id=&resource_id=&start=`
//! - Catalog search: GET `/?q=name:<name>&complete=false`
//! - Catalog entry: GET `/:id`
//! - Crypto units: GET `/crypto_v2/instances/:guid/hsms`

use crate::api::{
    CatalogApi, CatalogEntry, CryptoUnitApi, HsmInfo, InstanceFilter, InstancePage,
    ResourceControllerApi,
};
use async_trait::async_trait;
use cloudplane_core::{ProviderConfig, RestClient, Result};
use serde::Deserialize;

/// Resource controller client
#[derive(Debug, Clone)]
pub struct ResourceControllerClient {
    rest: RestClient,
}

impl ResourceControllerClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let rest = RestClient::new(
            "resource-controller",
            config.endpoints.resource_controller.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        Ok(Self { rest })
    }
}

#[async_trait]
impl ResourceControllerApi for ResourceControllerClient {
    async fn list_instances(&self, filter: &InstanceFilter, start: Option<&str>) -> Result<InstancePage> {
        let mut query = vec![("name", filter.name.as_str())];
        if let Some(group) = &filter.resource_group_id {
            query.push(("resource_group_id", group.as_str()));
        }
        if let Some(resource_id) = &filter.resource_id {
            query.push(("resource_id", resource_id.as_str()));
        }
        if let Some(start) = start {
            query.push(("start", start));
        }
        self.rest.get("/v2/resource_instances", &query).await
    }
}

/// Global catalog client
#[derive(Debug, Clone)]
pub struct CatalogClient {
    rest: RestClient,
}

#[derive(Deserialize)]
struct CatalogSearch {
    #[serde(default)]
    resources: Vec<CatalogEntry>,
}

impl CatalogClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let rest = RestClient::new(
            "catalog",
            config.endpoints.catalog.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        Ok(Self { rest })
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn find_by_name(&self, name: &str) -> Result<Vec<CatalogEntry>> {
        let q = format!("name:{name}");
        let search: CatalogSearch = self
            .rest
            .get("", &[("q", q.as_str()), ("complete", "false")])
            .await?;
        // the search is fuzzy; keep exact matches only
        Ok(search
            .resources
            .into_iter()
            .filter(|entry| entry.name == name)
            .collect())
    }

    async fn get(&self, id: &str) -> Result<CatalogEntry> {
        self.rest.get(id, &[]).await
    }
}

/// Crypto-unit query client
#[derive(Debug, Clone)]
pub struct CryptoUnitClient {
    rest: RestClient,
}

impl CryptoUnitClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let rest = RestClient::new(
            "hpcs",
            config.hpcs_url(),
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        Ok(Self { rest })
    }
}

#[async_trait]
impl CryptoUnitApi for CryptoUnitClient {
    async fn query(&self, instance_guid: &str) -> Result<Vec<HsmInfo>> {
        let path = format!("/crypto_v2/instances/{instance_guid}/hsms");
        let units: Option<Vec<HsmInfo>> = self.rest.get(&path, &[]).await?;
        Ok(units.unwrap_or_default())
    }
}
