//! In-memory resource controller, catalog and crypto-unit services

#![allow(dead_code)]

use async_trait::async_trait;
use cloudplane_core::{Error, Result};
use cloudplane_provider_hpcs::api::{
    CatalogApi, CatalogEntry, CryptoUnitApi, HsmAdmin, HsmInfo, InstanceFilter, InstancePage,
    ResourceControllerApi, ResourceInstance,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SERVICE_ID: &str = "svc-hs-crypto";
pub const PLAN_ID: &str = "plan-standard";

/// Serves instances in pages of `page_size`
#[derive(Clone)]
pub struct FakeHpcs {
    instances: Arc<Mutex<Vec<ResourceInstance>>>,
    pub page_size: usize,
    pub list_calls: Arc<AtomicUsize>,
    pub filters: Arc<Mutex<Vec<InstanceFilter>>>,
    pub queried: Arc<Mutex<Vec<String>>>,
}

impl Default for FakeHpcs {
    fn default() -> Self {
        Self {
            instances: Arc::default(),
            page_size: 2,
            list_calls: Arc::default(),
            filters: Arc::default(),
            queried: Arc::default(),
        }
    }
}

/// An HPCS instance with two units and a failover unit
pub fn instance(id: &str, name: &str, region: &str) -> ResourceInstance {
    let parameters = serde_json::json!({
        "allowed_network": "private-only",
        "units": "2",
        "failover_units": 1
    });
    let extensions = serde_json::json!({
        "mode": "standard",
        "endpoints": {"private": "https://api.private.hs-crypto.example"}
    });
    ResourceInstance {
        id: id.to_string(),
        guid: Some(format!("guid-{id}")),
        crn: Some(format!("crn:v1:bluemix:public:hs-crypto:{region}:a/acc:guid-{id}::")),
        name: name.to_string(),
        state: Some("active".to_string()),
        region_id: Some(region.to_string()),
        resource_group_id: Some("default-group".to_string()),
        resource_id: Some(SERVICE_ID.to_string()),
        resource_plan_id: Some(PLAN_ID.to_string()),
        parameters: parameters.as_object().cloned(),
        extensions: extensions.as_object().cloned(),
    }
}

impl FakeHpcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(self, instance: ResourceInstance) -> Self {
        self.instances.lock().unwrap().push(instance);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceControllerApi for FakeHpcs {
    async fn list_instances(&self, filter: &InstanceFilter, start: Option<&str>) -> Result<InstancePage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().unwrap().push(filter.clone());

        let matching: Vec<ResourceInstance> = self
            .instances
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.name == filter.name)
            .filter(|i| {
                filter.resource_group_id.is_none() || i.resource_group_id == filter.resource_group_id
            })
            .cloned()
            .collect();

        let offset: usize = match start {
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| Error::validation(format!("bad start token {token}")))?,
            None => 0,
        };
        let end = (offset + self.page_size).min(matching.len());
        let next_url = (end < matching.len())
            .then(|| format!("/v2/resource_instances?name={}&next_url=page-{end}", filter.name));

        Ok(InstancePage {
            next_url,
            resources: matching[offset.min(end)..end].to_vec(),
        })
    }
}

#[async_trait]
impl CatalogApi for FakeHpcs {
    async fn find_by_name(&self, name: &str) -> Result<Vec<CatalogEntry>> {
        if name == "hs-crypto" {
            Ok(vec![CatalogEntry {
                id: SERVICE_ID.to_string(),
                name: name.to_string(),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn get(&self, id: &str) -> Result<CatalogEntry> {
        let name = match id {
            SERVICE_ID => "hs-crypto",
            PLAN_ID => "standard",
            _ => return Err(Error::not_found(format!("catalog entry {id}"))),
        };
        Ok(CatalogEntry {
            id: id.to_string(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl CryptoUnitApi for FakeHpcs {
    async fn query(&self, instance_guid: &str) -> Result<Vec<HsmInfo>> {
        self.queried.lock().unwrap().push(instance_guid.to_string());
        Ok(vec![HsmInfo {
            hsm_id: format!("{instance_guid}-unit-1"),
            hsm_location: "us-south-1".to_string(),
            hsm_type: "recovery".to_string(),
            signature_threshold: 1,
            revocation_threshold: 1,
            current_mk_status: "Valid".to_string(),
            new_mk_status: "Empty".to_string(),
            current_mkvp: "0xabc".to_string(),
            new_mkvp: String::new(),
            admins: vec![HsmAdmin {
                name: "admin1".to_string(),
                ski: "ski-1".to_string(),
            }],
        }])
    }
}
