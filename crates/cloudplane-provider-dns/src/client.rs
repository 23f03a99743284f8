//! REST implementation of the DNS Services API
//!
//! ## API Reference
//!
//! - Permitted networks: `/instances/:id/dnszones/:zone_id/permitted_networks[/:pn_id]`
//! - GLB monitors: `/instances/:id/monitors[/:monitor_id]`

use crate::api::{Monitor, MonitorApi, MonitorBody, PermittedNetwork, PermittedNetworkApi, PermittedNetworkCreate};
use async_trait::async_trait;
use cloudplane_core::{ProviderConfig, RestClient, Result};

/// DNS Services client
#[derive(Debug, Clone)]
pub struct DnsClient {
    rest: RestClient,
}

impl DnsClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let rest = RestClient::new(
            "dns",
            config.endpoints.dns.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        Ok(Self { rest })
    }

    fn permitted_networks(instance_id: &str, zone_id: &str) -> String {
        format!("/instances/{instance_id}/dnszones/{zone_id}/permitted_networks")
    }

    fn monitors(instance_id: &str) -> String {
        format!("/instances/{instance_id}/monitors")
    }
}

#[async_trait]
impl PermittedNetworkApi for DnsClient {
    async fn create(
        &self,
        instance_id: &str,
        zone_id: &str,
        body: &PermittedNetworkCreate,
    ) -> Result<PermittedNetwork> {
        self.rest
            .post(&Self::permitted_networks(instance_id, zone_id), body)
            .await
    }

    async fn get(&self, instance_id: &str, zone_id: &str, id: &str) -> Result<PermittedNetwork> {
        let path = format!("{}/{id}", Self::permitted_networks(instance_id, zone_id));
        self.rest.get(&path, &[]).await
    }

    async fn delete(&self, instance_id: &str, zone_id: &str, id: &str) -> Result<()> {
        let path = format!("{}/{id}", Self::permitted_networks(instance_id, zone_id));
        self.rest.delete(&path).await
    }
}

#[async_trait]
impl MonitorApi for DnsClient {
    async fn create(&self, instance_id: &str, body: &MonitorBody) -> Result<Monitor> {
        self.rest.post(&Self::monitors(instance_id), body).await
    }

    async fn get(&self, instance_id: &str, monitor_id: &str) -> Result<Monitor> {
        let path = format!("{}/{monitor_id}", Self::monitors(instance_id));
        self.rest.get(&path, &[]).await
    }

    async fn update(&self, instance_id: &str, monitor_id: &str, body: &MonitorBody) -> Result<Monitor> {
        let path = format!("{}/{monitor_id}", Self::monitors(instance_id));
        self.rest.patch(&path, body).await
    }

    async fn delete(&self, instance_id: &str, monitor_id: &str) -> Result<()> {
        let path = format!("{}/{monitor_id}", Self::monitors(instance_id));
        self.rest.delete(&path).await
    }
}
