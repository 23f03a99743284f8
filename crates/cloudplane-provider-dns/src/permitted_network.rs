//! `ibm_dns_permitted_network`: a VPC allowed to resolve a private zone
//!
//! The service rejects concurrent changes to one zone's permitted networks,
//! so create, delete and the existence check all hold the zone's named lock.
//! Every field is write-once; there is no in-place update.

use crate::api::{PermittedNetworkApi, PermittedNetworkCreate, PermittedNetworkVpc};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_core::lock::{self, KeyGuard};
use cloudplane_core::{CompositeId, Error, Resource, ResourceData, Result, Timeouts};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const RESOURCE_TYPE: &str = "ibm_dns_permitted_network";

/// The only permitted network type the service accepts
pub const NETWORK_TYPE_VPC: &str = "vpc";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermittedNetworkRecord {
    pub instance_id: String,
    pub zone_id: String,
    pub vpc_crn: String,
    #[serde(rename = "type", default = "default_network_type")]
    pub network_type: String,

    // Computed
    #[serde(default)]
    pub permitted_network_id: Option<String>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: Option<String>,
}

fn default_network_type() -> String {
    NETWORK_TYPE_VPC.to_string()
}

impl PermittedNetworkRecord {
    pub fn new(instance_id: &str, zone_id: &str, vpc_crn: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            zone_id: zone_id.to_string(),
            vpc_crn: vpc_crn.to_string(),
            network_type: default_network_type(),
            permitted_network_id: None,
            created_on: None,
            modified_on: None,
            state: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("instance_id", &self.instance_id),
            ("zone_id", &self.zone_id),
            ("vpc_crn", &self.vpc_crn),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation(format!("{field} is required")));
            }
        }
        if self.network_type != NETWORK_TYPE_VPC {
            return Err(Error::validation(format!(
                "type must be '{NETWORK_TYPE_VPC}', got '{}'",
                self.network_type
            )));
        }
        Ok(())
    }
}

/// Named lock key guarding one zone's permitted networks
pub fn lock_key(instance_id: &str, zone_id: &str) -> String {
    format!("private_dns_permitted_network_{instance_id}{zone_id}")
}

/// Handler for `ibm_dns_permitted_network`
pub struct PermittedNetworkResource {
    api: Arc<dyn PermittedNetworkApi>,
}

impl PermittedNetworkResource {
    pub fn new(api: Arc<dyn PermittedNetworkApi>) -> Self {
        Self { api }
    }

    async fn zone_lock(instance_id: &str, zone_id: &str) -> KeyGuard {
        lock::global().lock(lock_key(instance_id, zone_id)).await
    }
}

#[async_trait]
impl Resource for PermittedNetworkResource {
    type Record = PermittedNetworkRecord;

    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn timeouts(&self) -> Timeouts {
        let ten = Duration::from_secs(10 * 60);
        Timeouts::new(ten, ten, ten)
    }

    async fn create(&self, data: &mut ResourceData<PermittedNetworkRecord>) -> Result<()> {
        let record = data.get().clone();
        record.validate()?;

        let body = PermittedNetworkCreate {
            network_type: record.network_type.clone(),
            permitted_network: PermittedNetworkVpc {
                vpc_crn: record.vpc_crn.clone(),
            },
        };

        let created = {
            let _guard = Self::zone_lock(&record.instance_id, &record.zone_id).await;
            self.api
                .create(&record.instance_id, &record.zone_id, &body)
                .await
                .map_err(|e| e.with_operation(RESOURCE_TYPE, "create"))?
        };

        data.set_id(
            CompositeId::new([
                record.instance_id.as_str(),
                record.zone_id.as_str(),
                created.id.as_str(),
            ])
            .to_string(),
        );
        info!(
            "Permitted {} in zone {} as {}",
            record.vpc_crn, record.zone_id, created.id
        );

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData<PermittedNetworkRecord>) -> Result<()> {
        let [instance_id, zone_id, id] = CompositeId::split::<3>(data.require_id()?)?;

        let lookup = {
            let _guard = Self::zone_lock(&instance_id, &zone_id).await;
            self.api.get(&instance_id, &zone_id, &id).await
        };
        let network = match lookup {
            Ok(network) => network,
            Err(e) if e.is_not_found() => {
                warn!("Permitted network {} no longer exists, removing it", id);
                data.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "read")),
        };

        let record = data.get_mut();
        record.instance_id = instance_id;
        record.zone_id = zone_id;
        record.permitted_network_id = Some(network.id);
        record.vpc_crn = network.permitted_network.vpc_crn;
        record.network_type = network.network_type;
        record.state = network.state;
        record.created_on = network.created_on;
        record.modified_on = network.modified_on;
        Ok(())
    }

    /// Every field is write-once; a changed field needs a replacement
    async fn update(&self, data: &mut ResourceData<PermittedNetworkRecord>) -> Result<()> {
        let changed = [
            ("instance_id", data.has_change(|r| &r.instance_id)),
            ("zone_id", data.has_change(|r| &r.zone_id)),
            ("vpc_crn", data.has_change(|r| &r.vpc_crn)),
            ("type", data.has_change(|r| &r.network_type)),
        ];
        match changed.iter().find(|(_, changed)| *changed) {
            Some((field, _)) => Err(Error::validation(format!(
                "{RESOURCE_TYPE}: {field} cannot be changed in place"
            ))),
            None => Ok(()),
        }
    }

    async fn delete(&self, data: &mut ResourceData<PermittedNetworkRecord>) -> Result<()> {
        let [instance_id, zone_id, id] = CompositeId::split::<3>(data.require_id()?)?;

        let _guard = Self::zone_lock(&instance_id, &zone_id).await;
        match self.api.delete(&instance_id, &zone_id, &id).await {
            Ok(()) => info!("Removed permitted network {} from zone {}", id, zone_id),
            Err(e) if e.is_not_found() => debug!("Permitted network {} already gone", id),
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "delete")),
        }

        data.clear_id();
        Ok(())
    }
}
