//! `ibm_pi_network`: a network inside a Power Virtual Server workspace
//!
//! ## Lifecycle
//!
//! - **Create**: validate, derive default addressing for VLAN networks, wait
//!   for the workspace Power Edge Router (PER) when the workspace has one,
//!   create with retry until the service accepts or rejects (400/422) the
//!   request, then wait until the network
//!   reports a VLAN ID.
//! - **Update**: send only changed fields, then wait until the service
//!   reports every one of them.
//! - **Delete**: delete with retry, then wait until the network is gone.
//!
//! User tags go through the global tagging service; failures there are
//! logged and never fail the operation.

use crate::api::{IpAddressRange, Network, NetworkApi, NetworkCreate, NetworkUpdate, TaggingApi, WorkspaceApi};
use crate::cidr::generate_ip_data;
use async_trait::async_trait;
use cloudplane_core::poll::{self, PollSettings, RefreshFn, Refreshed, Waiter, states};
use cloudplane_core::{CompositeId, Error, Resource, ResourceData, Result, Timeouts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const RESOURCE_TYPE: &str = "ibm_pi_network";

/// Accepted MTU range
pub const MTU_RANGE: std::ops::RangeInclusive<u32> = 1450..=9000;

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    /// Private VLAN; requires a CIDR
    #[serde(rename = "vlan")]
    Vlan,
    /// Public VLAN; addressing is assigned by the service
    #[serde(rename = "pub-vlan")]
    PubVlan,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Vlan => "vlan",
            NetworkType::PubVlan => "pub-vlan",
        }
    }

    fn from_remote(value: &str) -> Option<Self> {
        match value {
            "vlan" => Some(NetworkType::Vlan),
            "pub-vlan" => Some(NetworkType::PubVlan),
            _ => None,
        }
    }
}

/// An enable/disable switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    Enable,
    Disable,
}

impl Toggle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Toggle::Enable => "enable",
            Toggle::Disable => "disable",
        }
    }

    fn from_remote(value: &str) -> Option<Self> {
        match value {
            "enable" => Some(Toggle::Enable),
            "disable" => Some(Toggle::Disable),
            _ => None,
        }
    }
}

/// An address range in the configuration record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    pub starting_ip_address: String,
    pub ending_ip_address: String,
}

impl From<&AddressRange> for IpAddressRange {
    fn from(range: &AddressRange) -> Self {
        IpAddressRange::new(&range.starting_ip_address, &range.ending_ip_address)
    }
}

impl From<IpAddressRange> for AddressRange {
    fn from(range: IpAddressRange) -> Self {
        Self {
            starting_ip_address: range.starting_ip_address,
            ending_ip_address: range.ending_ip_address,
        }
    }
}

/// Configuration record of a network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRecord {
    /// Workspace the network lives in
    pub cloud_instance_id: String,
    pub name: String,
    pub network_type: NetworkType,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub dns_servers: BTreeSet<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub ip_address_ranges: BTreeSet<AddressRange>,
    #[serde(default)]
    pub mtu: Option<u32>,
    #[serde(default = "default_advertise")]
    pub advertise: Toggle,
    #[serde(default = "default_arp_broadcast")]
    pub arp_broadcast: Toggle,
    #[serde(default)]
    pub user_tags: BTreeSet<String>,

    // Computed
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub crn: Option<String>,
    #[serde(default)]
    pub vlan_id: Option<u32>,
}

fn default_advertise() -> Toggle {
    Toggle::Enable
}

fn default_arp_broadcast() -> Toggle {
    Toggle::Disable
}

impl NetworkRecord {
    /// A record with defaults for every optional field
    pub fn new(
        cloud_instance_id: impl Into<String>,
        name: impl Into<String>,
        network_type: NetworkType,
    ) -> Self {
        Self {
            cloud_instance_id: cloud_instance_id.into(),
            name: name.into(),
            network_type,
            cidr: None,
            dns_servers: BTreeSet::new(),
            gateway: None,
            ip_address_ranges: BTreeSet::new(),
            mtu: None,
            advertise: default_advertise(),
            arp_broadcast: default_arp_broadcast(),
            user_tags: BTreeSet::new(),
            network_id: None,
            crn: None,
            vlan_id: None,
        }
    }

    /// Check required fields and field combinations
    pub fn validate(&self) -> Result<()> {
        if self.cloud_instance_id.trim().is_empty() {
            return Err(Error::validation("cloud_instance_id is required"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }
        match (self.network_type, &self.cidr) {
            (NetworkType::Vlan, None) => {
                return Err(Error::validation("cidr is required when network_type is vlan"));
            }
            (NetworkType::PubVlan, Some(_)) => {
                return Err(Error::validation(
                    "cidr cannot be set when network_type is pub-vlan",
                ));
            }
            _ => {}
        }
        if let Some(mtu) = self.mtu {
            if !MTU_RANGE.contains(&mtu) {
                return Err(Error::validation(format!(
                    "mtu must be between {} and {}, got {mtu}",
                    MTU_RANGE.start(),
                    MTU_RANGE.end()
                )));
            }
        }
        Ok(())
    }

    /// Build the create body, filling VLAN addressing from the CIDR
    ///
    /// Explicit `gateway` and `ip_address_ranges` win over derived values.
    pub fn create_body(&self) -> Result<NetworkCreate> {
        let mut body = NetworkCreate {
            name: self.name.clone(),
            network_type: self.network_type.as_str().to_string(),
            dns_servers: self.dns_servers.iter().cloned().collect(),
            mtu: self.mtu,
            user_tags: self.user_tags.iter().cloned().collect(),
            ..NetworkCreate::default()
        };

        if let (NetworkType::Vlan, Some(cidr)) = (self.network_type, &self.cidr) {
            let derived = generate_ip_data(cidr)?;

            body.cidr = Some(cidr.clone());
            body.gateway = Some(
                self.gateway
                    .clone()
                    .unwrap_or_else(|| derived.gateway.to_string()),
            );
            body.ip_address_ranges = if self.ip_address_ranges.is_empty() {
                vec![IpAddressRange::new(
                    derived.first_usable.to_string(),
                    derived.last_usable.to_string(),
                )]
            } else {
                self.ip_address_ranges.iter().map(IpAddressRange::from).collect()
            };
        }

        Ok(body)
    }
}

/// Handler for `ibm_pi_network`
pub struct NetworkResource {
    networks: Arc<dyn NetworkApi>,
    workspaces: Arc<dyn WorkspaceApi>,
    tagging: Arc<dyn TaggingApi>,
    poll: PollSettings,
    on_prem: bool,
}

impl NetworkResource {
    pub fn new(
        networks: Arc<dyn NetworkApi>,
        workspaces: Arc<dyn WorkspaceApi>,
        tagging: Arc<dyn TaggingApi>,
        poll: PollSettings,
    ) -> Self {
        Self {
            networks,
            workspaces,
            tagging,
            poll,
            on_prem: false,
        }
    }

    /// On-prem locations skip the workspace capability lookup
    pub fn on_prem(mut self, on_prem: bool) -> Self {
        self.on_prem = on_prem;
        self
    }

    /// Whether the workspace has PER, waiting for it to be active if so
    async fn per_ready(&self, cloud_instance_id: &str, timeout: Duration) -> Result<bool> {
        if self.on_prem {
            return Ok(false);
        }

        let workspace = WorkspaceApi::get(self.workspaces.as_ref(), cloud_instance_id).await?;
        if !workspace.has_per() {
            return Ok(false);
        }

        let workspaces = &self.workspaces;
        let refresh = RefreshFn(move || async move {
            let workspace = WorkspaceApi::get(workspaces.as_ref(), cloud_instance_id).await?;
            match workspace.per_state() {
                Some(states::ERROR) => Err(Error::api(
                    RESOURCE_TYPE,
                    "wait for Power Edge Router",
                    None,
                    format!("workspace {cloud_instance_id} Power Edge Router is in error state"),
                )),
                Some(state) => Ok(Refreshed::new((), state)),
                None => Ok(Refreshed::new((), states::INACTIVE)),
            }
        });

        debug!("Waiting for Power Edge Router in {}", cloud_instance_id);
        Waiter::new([states::INACTIVE, states::CONFIGURING], [states::ACTIVE])
            .settings(&self.poll)
            .timeout(timeout)
            .wait(&refresh)
            .await?;
        Ok(true)
    }

    async fn wait_available(
        &self,
        cloud_instance_id: &str,
        network_id: &str,
        timeout: Duration,
    ) -> Result<Network> {
        let networks = &self.networks;
        let refresh = RefreshFn(move || async move {
            let network = networks.get(cloud_instance_id, network_id).await?;
            let state = if network.vlan_id.is_some() {
                states::AVAILABLE
            } else {
                states::BUILD
            };
            Ok(Refreshed::new(network, state))
        });

        Waiter::new([states::RETRY, states::BUILD], [states::AVAILABLE])
            .settings(&self.poll)
            .timeout(timeout)
            .wait(&refresh)
            .await
    }

    async fn wait_updated(
        &self,
        cloud_instance_id: &str,
        network_id: &str,
        body: &NetworkUpdate,
        timeout: Duration,
    ) -> Result<Network> {
        let networks = &self.networks;
        let refresh = RefreshFn(move || async move {
            let network = networks.get(cloud_instance_id, network_id).await?;
            let state = if body.is_applied_to(&network) {
                states::AVAILABLE
            } else {
                states::RETRY
            };
            Ok(Refreshed::new(network, state))
        });

        Waiter::new([states::RETRY], [states::AVAILABLE])
            .settings(&self.poll)
            .timeout(timeout)
            .wait(&refresh)
            .await
    }

    async fn wait_deleted(
        &self,
        cloud_instance_id: &str,
        network_id: &str,
        timeout: Duration,
    ) -> Result<()> {
        let networks = &self.networks;
        let refresh = RefreshFn(move || async move {
            match networks.get(cloud_instance_id, network_id).await {
                Ok(_) => Ok(Refreshed::new((), states::FOUND)),
                Err(e) if e.is_not_found() => Ok(Refreshed::new((), states::NOT_FOUND)),
                Err(e) => Err(e),
            }
        });

        Waiter::new([states::FOUND], [states::NOT_FOUND])
            .settings(&self.poll)
            .timeout(timeout)
            .wait(&refresh)
            .await
    }

    /// Replace user tags, logging instead of failing
    async fn write_tags(&self, crn: &str, old: &BTreeSet<String>, new: &BTreeSet<String>) {
        if let Err(e) = self.tagging.update_tags(crn, old, new).await {
            warn!("Failed to update user tags on network {}: {}", crn, e);
        }
    }
}

fn context(operation: &'static str) -> impl Fn(Error) -> Error {
    move |e| e.with_operation(RESOURCE_TYPE, operation)
}

fn split_id(id: &str) -> Result<(String, String)> {
    let [cloud_instance_id, network_id] = CompositeId::split::<2>(id)?;
    Ok((cloud_instance_id, network_id))
}

#[async_trait]
impl Resource for NetworkResource {
    type Record = NetworkRecord;

    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::new(
            Duration::from_secs(15 * 60),
            Duration::from_secs(10 * 60),
            Duration::from_secs(10 * 60),
        )
    }

    async fn create(&self, data: &mut ResourceData<NetworkRecord>) -> Result<()> {
        let record = data.get().clone();
        record.validate()?;
        let mut body = record.create_body()?;
        let timeouts = *data.timeouts();
        let cloud_instance_id = record.cloud_instance_id.as_str();

        let per = self
            .per_ready(cloud_instance_id, timeouts.read)
            .await
            .map_err(context("create"))?;
        if per && record.network_type == NetworkType::Vlan {
            body.advertise = Some(record.advertise.as_str().to_string());
            body.arp_broadcast = Some(record.arp_broadcast.as_str().to_string());
        }

        let networks = &self.networks;
        let body = &body;
        let created =
            poll::retry_unless_rejected(timeouts.create, self.poll.retry_interval, move || {
                networks.create(cloud_instance_id, body)
            })
            .await
            .map_err(context("create"))?;

        let network_id = created.network_id.clone();
        data.set_id(CompositeId::new([cloud_instance_id, network_id.as_str()]).to_string());
        info!("Created network {} in workspace {}", network_id, cloud_instance_id);

        let network = self
            .wait_available(cloud_instance_id, &network_id, timeouts.create)
            .await
            .map_err(context("create"))?;

        if !record.user_tags.is_empty() {
            if let Some(crn) = network.crn.as_deref().or(created.crn.as_deref()) {
                self.write_tags(crn, &BTreeSet::new(), &record.user_tags).await;
            }
        }

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData<NetworkRecord>) -> Result<()> {
        let (cloud_instance_id, network_id) = split_id(data.require_id()?)?;

        let network = match self.networks.get(&cloud_instance_id, &network_id).await {
            Ok(network) => network,
            Err(e) if e.is_not_found() => {
                warn!("Network {} no longer exists, removing it", network_id);
                data.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "read")),
        };

        let per = self
            .per_ready(&cloud_instance_id, data.timeouts().read)
            .await
            .map_err(context("read"))?;

        let tags = match network.crn.as_deref() {
            Some(crn) => match self.tagging.tags(crn).await {
                Ok(tags) => Some(tags),
                Err(e) => {
                    warn!("Failed to read user tags of network {}: {}", network_id, e);
                    None
                }
            },
            None => None,
        };

        let record = data.get_mut();
        record.cloud_instance_id = cloud_instance_id;
        record.network_id = Some(network.network_id);
        record.name = network.name;
        match NetworkType::from_remote(&network.network_type) {
            Some(network_type) => record.network_type = network_type,
            None => warn!("Network {} has unknown type '{}'", network_id, network.network_type),
        }
        record.cidr = network.cidr;
        record.gateway = network.gateway;
        record.dns_servers = network.dns_servers.into_iter().collect();
        record.ip_address_ranges = network
            .ip_address_ranges
            .into_iter()
            .map(AddressRange::from)
            .collect();
        record.mtu = network.mtu;
        record.vlan_id = network.vlan_id;
        record.crn = network.crn;

        if per && record.network_type == NetworkType::Vlan {
            if let Some(advertise) = network.advertise.as_deref().and_then(Toggle::from_remote) {
                record.advertise = advertise;
            }
            if let Some(arp) = network.arp_broadcast.as_deref().and_then(Toggle::from_remote) {
                record.arp_broadcast = arp;
            }
        }
        if let Some(tags) = tags {
            record.user_tags = tags;
        }

        Ok(())
    }

    async fn update(&self, data: &mut ResourceData<NetworkRecord>) -> Result<()> {
        let (cloud_instance_id, network_id) = split_id(data.require_id()?)?;
        let record = data.get();
        let mut body = NetworkUpdate::default();

        if data.has_change(|r| &r.advertise) {
            body.advertise = Some(record.advertise.as_str().to_string());
        }
        if data.has_change(|r| &r.arp_broadcast) {
            body.arp_broadcast = Some(record.arp_broadcast.as_str().to_string());
        }
        if data.has_change(|r| &r.dns_servers) {
            body.dns_servers = Some(record.dns_servers.iter().cloned().collect());
        }

        let gateway_changed = data.has_change(|r| &r.gateway);
        let ranges_changed = data.has_change(|r| &r.ip_address_ranges);
        if gateway_changed || ranges_changed {
            if record.network_type != NetworkType::Vlan {
                return Err(Error::validation(format!(
                    "{} networks do not allow ip_address_ranges or gateway updates",
                    record.network_type.as_str()
                )));
            }
            if ranges_changed {
                body.ip_address_ranges =
                    Some(record.ip_address_ranges.iter().map(IpAddressRange::from).collect());
            }
            if gateway_changed {
                body.gateway = record.gateway.clone();
            }
        }

        if data.has_change(|r| &r.name) {
            body.name = Some(record.name.clone());
        }

        let tags_changed = data.has_change(|r| &r.user_tags);
        if body.is_empty() && !tags_changed {
            debug!("Network {} has no changes", network_id);
            return Ok(());
        }

        let timeouts = *data.timeouts();
        if !body.is_empty() {
            self.networks
                .update(&cloud_instance_id, &network_id, &body)
                .await
                .map_err(context("update"))?;
            self.wait_updated(&cloud_instance_id, &network_id, &body, timeouts.update)
                .await
                .map_err(context("update"))?;
            info!("Updated network {}", network_id);
        }

        if tags_changed {
            if let Some(crn) = record.crn.clone() {
                let old = data.prior().map(|p| p.user_tags.clone()).unwrap_or_default();
                let new = data.get().user_tags.clone();
                self.write_tags(&crn, &old, &new).await;
            }
        }

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData<NetworkRecord>) -> Result<()> {
        let (cloud_instance_id, network_id) = split_id(data.require_id()?)?;
        let timeouts = *data.timeouts();

        let networks = &self.networks;
        let (ci, nid) = (cloud_instance_id.as_str(), network_id.as_str());
        poll::delete_with_retry(timeouts.delete, self.poll.retry_interval, move || {
            networks.delete(ci, nid)
        })
        .await
        .map_err(context("delete"))?;

        self.wait_deleted(ci, nid, timeouts.delete)
            .await
            .map_err(context("delete"))?;

        info!("Deleted network {}", network_id);
        data.clear_id();
        Ok(())
    }
}
