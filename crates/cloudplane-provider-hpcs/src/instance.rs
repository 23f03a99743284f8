//! `ibm_hpcs`: look up a Hyper Protect Crypto Services instance by name
//!
//! The lookup lists instances through the resource controller (following
//! continuation links), narrows them by location and requires exactly one
//! match. Catalog names and crypto-unit details are fetched for that match.

use crate::api::{
    CatalogApi, CryptoUnitApi, HsmInfo, InstanceFilter, ResourceControllerApi, ResourceInstance,
};
use async_trait::async_trait;
use cloudplane_core::http::query_param;
use cloudplane_core::{DataSource, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DATA_SOURCE_TYPE: &str = "ibm_hpcs";

pub const DEFAULT_SERVICE: &str = "hs-crypto";

/// Lookup arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpcsQuery {
    pub name: String,
    #[serde(default)]
    pub resource_group_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default = "default_service")]
    pub service: String,
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

impl HpcsQuery {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resource_group_id: None,
            location: None,
            service: default_service(),
        }
    }
}

/// Network exposure of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceEndpoints {
    PrivateOnly,
    PublicAndPrivate,
}

impl ServiceEndpoints {
    /// Anything other than `private-only` exposes both endpoints
    fn from_allowed_network(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("private-only") => ServiceEndpoints::PrivateOnly,
            _ => ServiceEndpoints::PublicAndPrivate,
        }
    }
}

/// The instance found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpcsRecord {
    pub name: String,
    pub resource_group_id: Option<String>,
    pub location: Option<String>,
    pub service: String,
    pub status: Option<String>,
    pub guid: Option<String>,
    pub crn: Option<String>,
    pub plan: String,
    pub extensions: BTreeMap<String, String>,
    pub service_endpoints: Option<ServiceEndpoints>,
    pub units: Option<u32>,
    pub failover_units: Option<u32>,
    pub hsm_info: Vec<HsmInfo>,
}

/// Flatten extensions to string values keyed by their dotted path
///
/// Nested objects contribute `parent.child` keys; nulls are dropped.
fn flatten(map: Option<&Map<String, Value>>) -> BTreeMap<String, String> {
    fn walk(prefix: &str, map: &Map<String, Value>, out: &mut BTreeMap<String, String>) {
        for (key, value) in map {
            let key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match value {
                Value::Object(inner) => walk(&key, inner, out),
                Value::Null => {}
                Value::String(s) => {
                    out.insert(key, s.clone());
                }
                other => {
                    out.insert(key, other.to_string());
                }
            }
        }
    }

    let mut out = BTreeMap::new();
    if let Some(map) = map {
        walk("", map, &mut out);
    }
    out
}

/// A unit count given as a number or a numeric string
fn unit_count(parameters: &Map<String, Value>, key: &str) -> Option<u32> {
    let value = parameters.get(key)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if parsed.is_none() {
        warn!("Instance parameter {} is not a unit count: {}", key, value);
    }
    parsed
}

/// Continuation token carried by a `next_url`
fn continuation(next_url: Option<&str>) -> Option<String> {
    let next_url = next_url.filter(|u| !u.is_empty())?;
    query_param(next_url, "next_url")
        .or_else(|| query_param(next_url, "start"))
        .filter(|token| !token.is_empty())
}

/// Handler for the `ibm_hpcs` data source
pub struct HpcsDataSource {
    instances: Arc<dyn ResourceControllerApi>,
    catalog: Arc<dyn CatalogApi>,
    crypto_units: Arc<dyn CryptoUnitApi>,
}

impl HpcsDataSource {
    pub fn new(
        instances: Arc<dyn ResourceControllerApi>,
        catalog: Arc<dyn CatalogApi>,
        crypto_units: Arc<dyn CryptoUnitApi>,
    ) -> Self {
        Self {
            instances,
            catalog,
            crypto_units,
        }
    }

    /// Every instance matching `filter`, across all pages
    async fn list_all(&self, filter: &InstanceFilter) -> Result<Vec<ResourceInstance>> {
        let mut instances = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let page = self
                .instances
                .list_instances(filter, start.as_deref())
                .await
                .map_err(|e| e.with_operation(DATA_SOURCE_TYPE, "list instances"))?;
            instances.extend(page.resources);

            match continuation(page.next_url.as_deref()) {
                Some(token) if start.as_deref() == Some(token.as_str()) => {
                    return Err(Error::api(
                        "resource-controller",
                        "list instances",
                        None,
                        format!("continuation token '{token}' repeated"),
                    ));
                }
                Some(token) => {
                    debug!("Fetching next page of instances named {}", filter.name);
                    start = Some(token);
                }
                None => return Ok(instances),
            }
        }
    }

    async fn service_id(&self, service: &str) -> Result<String> {
        let offerings = self
            .catalog
            .find_by_name(service)
            .await
            .map_err(|e| e.with_operation(DATA_SOURCE_TYPE, "find service offering"))?;
        offerings
            .into_iter()
            .next()
            .map(|entry| entry.id)
            .ok_or_else(|| Error::not_found(format!("service offering '{service}'")))
    }

    async fn catalog_name(&self, id: Option<&str>, what: &str) -> Result<String> {
        let Some(id) = id else {
            return Ok(String::new());
        };
        let entry = self
            .catalog
            .get(id)
            .await
            .map_err(|e| e.with_operation(DATA_SOURCE_TYPE, what))?;
        Ok(entry.name)
    }
}

#[async_trait]
impl DataSource for HpcsDataSource {
    type Query = HpcsQuery;
    type Record = HpcsRecord;

    fn type_name(&self) -> &'static str {
        DATA_SOURCE_TYPE
    }

    async fn read(&self, query: &HpcsQuery) -> Result<(String, HpcsRecord)> {
        if query.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }

        let mut filter = InstanceFilter {
            name: query.name.clone(),
            resource_group_id: query.resource_group_id.clone(),
            resource_id: None,
        };
        if !query.service.is_empty() {
            filter.resource_id = Some(self.service_id(&query.service).await?);
        }

        let mut matches = self.list_all(&filter).await?;
        if let Some(location) = &query.location {
            matches.retain(|instance| instance.location() == Some(location.as_str()));
        }

        let instance = match matches.len() {
            0 => {
                return Err(Error::not_found(format!(
                    "No resource instance found with name [{}]; if it is not in the default \
                     resource group, specify resource_group_id, location or service",
                    query.name
                )));
            }
            1 => matches.remove(0),
            n => {
                return Err(Error::validation(format!(
                    "{n} resource instances found with name [{}]; specify resource_group_id, \
                     location or service to narrow the match",
                    query.name
                )));
            }
        };
        info!("Found HPCS instance {} ({})", instance.name, instance.id);

        let service = self
            .catalog_name(instance.resource_id.as_deref(), "get service offering")
            .await?;
        let plan = self
            .catalog_name(instance.resource_plan_id.as_deref(), "get plan")
            .await?;

        let (service_endpoints, units, failover_units) = match &instance.parameters {
            Some(parameters) => (
                Some(ServiceEndpoints::from_allowed_network(parameters.get("allowed_network"))),
                unit_count(parameters, "units"),
                unit_count(parameters, "failover_units"),
            ),
            None => (None, None, None),
        };

        let hsm_info = match instance.guid.as_deref() {
            Some(guid) => self
                .crypto_units
                .query(guid)
                .await
                .map_err(|e| e.with_operation(DATA_SOURCE_TYPE, "query crypto units"))?,
            None => Vec::new(),
        };

        let record = HpcsRecord {
            name: instance.name.clone(),
            resource_group_id: instance.resource_group_id.clone(),
            location: instance.location().map(str::to_string),
            service,
            status: instance.state.clone(),
            guid: instance.guid.clone(),
            crn: instance.crn.clone(),
            plan,
            extensions: flatten(instance.extensions.as_ref()),
            service_endpoints,
            units,
            failover_units,
            hsm_info,
        };
        Ok((instance.id, record))
    }
}
