//! Vendor API surface used by the network resource
//!
//! The traits are the seam between resource logic and HTTP: the REST clients
//! in [`crate::client`] implement them against the live services, and tests
//! implement them in memory.

use async_trait::async_trait;
use cloudplane_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Workspace capability that enables the Power Edge Router
pub const PER_CAPABILITY: &str = "power-edge-router";

/// A starting/ending address pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IpAddressRange {
    #[serde(rename = "startingIPAddress")]
    pub starting_ip_address: String,
    #[serde(rename = "endingIPAddress")]
    pub ending_ip_address: String,
}

impl IpAddressRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            starting_ip_address: start.into(),
            ending_ip_address: end.into(),
        }
    }
}

/// A network as returned by the service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    #[serde(rename = "networkID")]
    pub network_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub network_type: String,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default, rename = "ipAddressRanges")]
    pub ip_address_ranges: Vec<IpAddressRange>,
    #[serde(default, rename = "dnsServers")]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub mtu: Option<u32>,
    #[serde(default, rename = "vlanID")]
    pub vlan_id: Option<u32>,
    #[serde(default)]
    pub crn: Option<String>,
    #[serde(default)]
    pub advertise: Option<String>,
    #[serde(default)]
    pub arp_broadcast: Option<String>,
}

/// Body of a network create call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub network_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(rename = "ipAddressRanges", skip_serializing_if = "Vec::is_empty")]
    pub ip_address_ranges: Vec<IpAddressRange>,
    #[serde(rename = "dnsServers", skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arp_broadcast: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_tags: Vec<String>,
}

/// Body of a network update call; only set fields are sent
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "dnsServers", skip_serializing_if = "Option::is_none")]
    pub dns_servers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(rename = "ipAddressRanges", skip_serializing_if = "Option::is_none")]
    pub ip_address_ranges: Option<Vec<IpAddressRange>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertise: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arp_broadcast: Option<String>,
}

impl NetworkUpdate {
    /// Whether nothing would be sent
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether `network` already reflects every field of this update
    ///
    /// DNS servers and address ranges are compared as sets because the
    /// service does not preserve their order.
    pub fn is_applied_to(&self, network: &Network) -> bool {
        if let Some(name) = &self.name {
            if *name != network.name {
                return false;
            }
        }
        if let Some(dns) = &self.dns_servers {
            let wanted: BTreeSet<&String> = dns.iter().collect();
            let actual: BTreeSet<&String> = network.dns_servers.iter().collect();
            if dns.len() != network.dns_servers.len() || wanted != actual {
                return false;
            }
        }
        if let Some(gateway) = &self.gateway {
            if network.gateway.as_ref() != Some(gateway) {
                return false;
            }
        }
        if let Some(ranges) = &self.ip_address_ranges {
            let mut wanted = ranges.clone();
            let mut actual = network.ip_address_ranges.clone();
            wanted.sort();
            actual.sort();
            if wanted != actual {
                return false;
            }
        }
        if let Some(advertise) = &self.advertise {
            if network.advertise.as_ref() != Some(advertise) {
                return false;
            }
        }
        if let Some(arp) = &self.arp_broadcast {
            if network.arp_broadcast.as_ref() != Some(arp) {
                return false;
            }
        }
        true
    }
}

/// Power Edge Router details of a workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerEdgeRouter {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub migration_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDetails {
    #[serde(default)]
    pub power_edge_router: Option<PowerEdgeRouter>,
}

/// A Power workspace (cloud instance)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    #[serde(default)]
    pub capabilities: HashMap<String, bool>,
    #[serde(default)]
    pub details: WorkspaceDetails,
}

impl Workspace {
    /// Whether the workspace has the Power Edge Router capability
    pub fn has_per(&self) -> bool {
        self.capabilities.get(PER_CAPABILITY).copied().unwrap_or(false)
    }

    /// Current Power Edge Router state, if reported
    pub fn per_state(&self) -> Option<&str> {
        self.details
            .power_edge_router
            .as_ref()
            .map(|per| per.state.as_str())
    }
}

/// Network operations within one workspace
#[async_trait]
pub trait NetworkApi: Send + Sync {
    async fn create(&self, cloud_instance_id: &str, body: &NetworkCreate) -> Result<Network>;

    async fn get(&self, cloud_instance_id: &str, network_id: &str) -> Result<Network>;

    async fn update(
        &self,
        cloud_instance_id: &str,
        network_id: &str,
        body: &NetworkUpdate,
    ) -> Result<Network>;

    async fn delete(&self, cloud_instance_id: &str, network_id: &str) -> Result<()>;
}

/// Workspace lookups
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    async fn get(&self, cloud_instance_id: &str) -> Result<Workspace>;
}

/// User tags attached to an entity by CRN
#[async_trait]
pub trait TaggingApi: Send + Sync {
    async fn tags(&self, crn: &str) -> Result<BTreeSet<String>>;

    /// Attach tags in `new` but not `old`, detach tags in `old` but not `new`
    async fn update_tags(
        &self,
        crn: &str,
        old: &BTreeSet<String>,
        new: &BTreeSet<String>,
    ) -> Result<()>;
}
