//! REST implementations of the Power and tagging APIs
//!
//! ## API Reference
//!
//! - Create network: POST `/pcloud/v1/cloud-instances/:id/networks`
//! - Get / update / delete network: GET, PUT, DELETE
//!   `/pcloud/v1/cloud-instances/:id/networks/:network_id`
//! - Get workspace: GET `/v1/workspaces/:id`
//! - List tags: GET `/v3/tags?attached_to=:crn&tag_type=user`
//! - Attach / detach: POST `/v3/tags/attach`, POST `/v3/tags/detach`

use crate::api::{Network, NetworkApi, NetworkCreate, NetworkUpdate, TaggingApi, Workspace, WorkspaceApi};
use async_trait::async_trait;
use cloudplane_core::http::Method;
use cloudplane_core::{ProviderConfig, RestClient, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Power Virtual Server client
#[derive(Debug, Clone)]
pub struct PowerClient {
    rest: RestClient,
}

impl PowerClient {
    /// Create a client for the configured region
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let rest = RestClient::new(
            "power",
            config.power_url(),
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        Ok(Self { rest })
    }

    fn network_path(cloud_instance_id: &str, network_id: &str) -> String {
        format!("/pcloud/v1/cloud-instances/{cloud_instance_id}/networks/{network_id}")
    }
}

#[async_trait]
impl NetworkApi for PowerClient {
    async fn create(&self, cloud_instance_id: &str, body: &NetworkCreate) -> Result<Network> {
        let path = format!("/pcloud/v1/cloud-instances/{cloud_instance_id}/networks");
        self.rest.post(&path, body).await
    }

    async fn get(&self, cloud_instance_id: &str, network_id: &str) -> Result<Network> {
        self.rest
            .get(&Self::network_path(cloud_instance_id, network_id), &[])
            .await
    }

    async fn update(
        &self,
        cloud_instance_id: &str,
        network_id: &str,
        body: &NetworkUpdate,
    ) -> Result<Network> {
        self.rest
            .put(&Self::network_path(cloud_instance_id, network_id), body)
            .await
    }

    async fn delete(&self, cloud_instance_id: &str, network_id: &str) -> Result<()> {
        self.rest
            .delete(&Self::network_path(cloud_instance_id, network_id))
            .await
    }
}

#[async_trait]
impl WorkspaceApi for PowerClient {
    async fn get(&self, cloud_instance_id: &str) -> Result<Workspace> {
        self.rest
            .get(&format!("/v1/workspaces/{cloud_instance_id}"), &[])
            .await
    }
}

/// Global tagging client
#[derive(Debug, Clone)]
pub struct TaggingClient {
    rest: RestClient,
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    items: Vec<TagItem>,
}

#[derive(Deserialize)]
struct TagItem {
    name: String,
}

#[derive(Serialize)]
struct TagResource<'a> {
    resource_id: &'a str,
}

#[derive(Serialize)]
struct TagChange<'a> {
    resources: [TagResource<'a>; 1],
    tag_names: Vec<&'a str>,
}

impl TaggingClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let rest = RestClient::new(
            "tagging",
            config.endpoints.tagging.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        Ok(Self { rest })
    }

    async fn change(&self, action: &str, crn: &str, names: Vec<&str>) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        debug!("Tagging {} {} tag(s) on {}", action, names.len(), crn);

        let body = TagChange {
            resources: [TagResource { resource_id: crn }],
            tag_names: names,
        };
        let _: serde_json::Value = self
            .rest
            .call(
                Method::POST,
                &format!("/v3/tags/{action}"),
                &[("tag_type", "user")],
                &[],
                Some(&body),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaggingApi for TaggingClient {
    async fn tags(&self, crn: &str) -> Result<BTreeSet<String>> {
        let list: TagList = self
            .rest
            .get("/v3/tags", &[("attached_to", crn), ("tag_type", "user")])
            .await?;
        Ok(list.items.into_iter().map(|item| item.name).collect())
    }

    async fn update_tags(
        &self,
        crn: &str,
        old: &BTreeSet<String>,
        new: &BTreeSet<String>,
    ) -> Result<()> {
        let detach: Vec<&str> = old.difference(new).map(String::as_str).collect();
        let attach: Vec<&str> = new.difference(old).map(String::as_str).collect();

        self.change("detach", crn, detach).await?;
        self.change("attach", crn, attach).await
    }
}
