//! In-memory Power service used by the network contract tests
//!
//! One `FakePower` implements the network, workspace and tagging APIs and
//! counts every call, so tests can assert on remote traffic.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudplane_core::poll::{Backoff, PollSettings};
use cloudplane_core::{Error, Result};
use cloudplane_provider_power::api::{
    Network, NetworkApi, NetworkCreate, NetworkUpdate, PowerEdgeRouter, TaggingApi, Workspace,
    WorkspaceApi, WorkspaceDetails, PER_CAPABILITY,
};
use cloudplane_provider_power::NetworkResource;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Poll settings that keep tests fast
pub fn fast_poll() -> PollSettings {
    PollSettings {
        delay: Duration::ZERO,
        interval: Duration::from_millis(5),
        backoff: Backoff::Fixed,
        retry_interval: Duration::from_millis(5),
    }
}

#[derive(Default)]
struct State {
    networks: HashMap<String, Network>,
    /// Gets left before a network reports its VLAN ID
    builds: HashMap<String, usize>,
    tags: HashMap<String, BTreeSet<String>>,
    per_states: Vec<&'static str>,
    last_create: Option<NetworkCreate>,
}

/// Counting in-memory Power service
#[derive(Clone, Default)]
pub struct FakePower {
    state: Arc<Mutex<State>>,
    next_id: Arc<AtomicUsize>,

    /// Total remote calls of any kind
    pub calls: Arc<AtomicUsize>,
    pub creates: Arc<AtomicUsize>,
    pub updates: Arc<AtomicUsize>,
    pub deletes: Arc<AtomicUsize>,
    pub workspace_gets: Arc<AtomicUsize>,

    /// Number of create calls to fail before succeeding
    pub create_failures: Arc<AtomicUsize>,
    /// Status of those failures; 503 when unset
    pub create_failure_status: Option<u16>,
    /// Number of delete calls to answer with 409 before succeeding
    pub delete_failures: Arc<AtomicUsize>,
    /// Gets a new network spends without a VLAN ID
    pub build_polls: usize,
    /// Whether tagging calls fail
    pub tagging_down: bool,
}

impl FakePower {
    pub fn new() -> Self {
        Self {
            build_polls: 2,
            ..Self::default()
        }
    }

    /// Give the workspace a Power Edge Router that walks through `states`
    pub fn with_per(self, states: Vec<&'static str>) -> Self {
        self.state.lock().unwrap().per_states = states;
        self
    }

    /// Fail the next `count` creates with `status`
    pub fn with_create_failures(mut self, count: usize, status: u16) -> Self {
        self.create_failures.store(count, Ordering::SeqCst);
        self.create_failure_status = Some(status);
        self
    }

    pub fn with_tagging_down(mut self) -> Self {
        self.tagging_down = true;
        self
    }

    pub fn resource(&self) -> NetworkResource {
        let fake = Arc::new(self.clone());
        NetworkResource::new(fake.clone(), fake.clone(), fake, fast_poll())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn network(&self, network_id: &str) -> Option<Network> {
        self.state.lock().unwrap().networks.get(network_id).cloned()
    }

    pub fn last_create(&self) -> Option<NetworkCreate> {
        self.state.lock().unwrap().last_create.clone()
    }

    pub fn tags_on(&self, crn: &str) -> BTreeSet<String> {
        self.state.lock().unwrap().tags.get(crn).cloned().unwrap_or_default()
    }

    /// Remove a network behind the provider's back
    pub fn vanish(&self, network_id: &str) {
        self.state.lock().unwrap().networks.remove(network_id);
    }

    fn count(&self, counter: &AtomicUsize) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl NetworkApi for FakePower {
    async fn create(&self, _cloud_instance_id: &str, body: &NetworkCreate) -> Result<Network> {
        self.count(&self.creates);
        if take_failure(&self.create_failures) {
            let status = self.create_failure_status.unwrap_or(503);
            return Err(Error::api("power", "POST networks", Some(status), "try again"));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let network_id = format!("net-{n}");
        let network = Network {
            network_id: network_id.clone(),
            name: body.name.clone(),
            network_type: body.network_type.clone(),
            cidr: body.cidr.clone(),
            gateway: body.gateway.clone(),
            ip_address_ranges: body.ip_address_ranges.clone(),
            dns_servers: body.dns_servers.clone(),
            mtu: body.mtu.or(Some(1450)),
            vlan_id: None,
            crn: Some(format!("crn:v1:power:{network_id}")),
            advertise: body.advertise.clone(),
            arp_broadcast: body.arp_broadcast.clone(),
        };

        let mut state = self.state.lock().unwrap();
        state.builds.insert(network_id.clone(), self.build_polls);
        state.networks.insert(network_id, network.clone());
        state.last_create = Some(body.clone());
        Ok(network)
    }

    async fn get(&self, _cloud_instance_id: &str, network_id: &str) -> Result<Network> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        let building = match state.builds.get_mut(network_id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        };

        let network = state
            .networks
            .get_mut(network_id)
            .ok_or_else(|| Error::not_found(format!("network {network_id}")))?;
        if !building && network.vlan_id.is_none() {
            network.vlan_id = Some(100);
        }
        Ok(network.clone())
    }

    async fn update(
        &self,
        _cloud_instance_id: &str,
        network_id: &str,
        body: &NetworkUpdate,
    ) -> Result<Network> {
        self.count(&self.updates);
        let mut state = self.state.lock().unwrap();
        let network = state
            .networks
            .get_mut(network_id)
            .ok_or_else(|| Error::not_found(format!("network {network_id}")))?;

        if let Some(name) = &body.name {
            network.name = name.clone();
        }
        if let Some(dns) = &body.dns_servers {
            // the service does not keep order
            let mut dns = dns.clone();
            dns.reverse();
            network.dns_servers = dns;
        }
        if let Some(gateway) = &body.gateway {
            network.gateway = Some(gateway.clone());
        }
        if let Some(ranges) = &body.ip_address_ranges {
            network.ip_address_ranges = ranges.clone();
        }
        if let Some(advertise) = &body.advertise {
            network.advertise = Some(advertise.clone());
        }
        if let Some(arp) = &body.arp_broadcast {
            network.arp_broadcast = Some(arp.clone());
        }
        Ok(network.clone())
    }

    async fn delete(&self, _cloud_instance_id: &str, network_id: &str) -> Result<()> {
        self.count(&self.deletes);
        if take_failure(&self.delete_failures) {
            return Err(Error::api("power", "DELETE networks", Some(409), "network busy"));
        }

        let mut state = self.state.lock().unwrap();
        state.builds.remove(network_id);
        state
            .networks
            .remove(network_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("network {network_id}")))
    }
}

#[async_trait]
impl WorkspaceApi for FakePower {
    async fn get(&self, cloud_instance_id: &str) -> Result<Workspace> {
        self.count(&self.workspace_gets);
        let mut state = self.state.lock().unwrap();

        let mut workspace = Workspace {
            id: cloud_instance_id.to_string(),
            ..Workspace::default()
        };
        if !state.per_states.is_empty() {
            let per_state = if state.per_states.len() > 1 {
                state.per_states.remove(0)
            } else {
                state.per_states[0]
            };
            workspace.capabilities.insert(PER_CAPABILITY.to_string(), true);
            workspace.details = WorkspaceDetails {
                power_edge_router: Some(PowerEdgeRouter {
                    state: per_state.to_string(),
                    migration_status: None,
                }),
            };
        }
        Ok(workspace)
    }
}

#[async_trait]
impl TaggingApi for FakePower {
    async fn tags(&self, crn: &str) -> Result<BTreeSet<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.tagging_down {
            return Err(Error::api("tagging", "GET /v3/tags", Some(500), "down"));
        }
        Ok(self.tags_on(crn))
    }

    async fn update_tags(
        &self,
        crn: &str,
        old: &BTreeSet<String>,
        new: &BTreeSet<String>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.tagging_down {
            return Err(Error::api("tagging", "POST /v3/tags/attach", Some(500), "down"));
        }

        let mut state = self.state.lock().unwrap();
        let tags = state.tags.entry(crn.to_string()).or_default();
        for tag in old.difference(new) {
            tags.remove(tag);
        }
        tags.extend(new.iter().cloned());
        Ok(())
    }
}
