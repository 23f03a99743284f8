//! DNS Services API surface
//!
//! [`crate::client::DnsClient`] implements both traits against the live
//! service; tests implement them in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_core::Result;
use serde::{Deserialize, Serialize};

/// VPC reference inside a permitted network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermittedNetworkVpc {
    pub vpc_crn: String,
}

/// A network allowed to resolve a private zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermittedNetwork {
    pub id: String,
    #[serde(rename = "type")]
    pub network_type: String,
    pub permitted_network: PermittedNetworkVpc,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

/// Body of a permitted network create call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermittedNetworkCreate {
    #[serde(rename = "type")]
    pub network_type: String,
    pub permitted_network: PermittedNetworkVpc,
}

/// An HTTP header sent by a health check
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HealthcheckHeader {
    pub name: String,
    pub value: Vec<String>,
}

/// Monitor fields shared by create, update and read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorBody {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub monitor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HealthcheckHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_insecure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_body: Option<String>,
}

/// A GLB health-check monitor as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    #[serde(flatten)]
    pub body: MonitorBody,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

/// Permitted networks of a private zone
#[async_trait]
pub trait PermittedNetworkApi: Send + Sync {
    async fn create(
        &self,
        instance_id: &str,
        zone_id: &str,
        body: &PermittedNetworkCreate,
    ) -> Result<PermittedNetwork>;

    async fn get(&self, instance_id: &str, zone_id: &str, id: &str) -> Result<PermittedNetwork>;

    async fn delete(&self, instance_id: &str, zone_id: &str, id: &str) -> Result<()>;
}

/// GLB monitors of a DNS instance
#[async_trait]
pub trait MonitorApi: Send + Sync {
    async fn create(&self, instance_id: &str, body: &MonitorBody) -> Result<Monitor>;

    async fn get(&self, instance_id: &str, monitor_id: &str) -> Result<Monitor>;

    async fn update(&self, instance_id: &str, monitor_id: &str, body: &MonitorBody) -> Result<Monitor>;

    async fn delete(&self, instance_id: &str, monitor_id: &str) -> Result<()>;
}
