//! Resource controller, global catalog and crypto-unit API surface

use async_trait::async_trait;
use cloudplane_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A provisioned service instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: String,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub crn: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub resource_group_id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub resource_plan_id: Option<String>,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default)]
    pub extensions: Option<Map<String, Value>>,
}

impl ResourceInstance {
    /// Where the instance lives: its region, or the location segment of its CRN
    pub fn location(&self) -> Option<&str> {
        if let Some(region) = self.region_id.as_deref().filter(|r| !r.is_empty()) {
            return Some(region);
        }
        // crn:v1:<cloud>:<type>:<service>:<location>:...
        self.crn
            .as_deref()
            .and_then(|crn| crn.split(':').nth(5))
            .filter(|l| !l.is_empty())
    }
}

/// One page of an instance listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstancePage {
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceInstance>,
}

/// Server-side filters for an instance listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    pub name: String,
    pub resource_group_id: Option<String>,
    /// Catalog ID of the service offering
    pub resource_id: Option<String>,
}

/// A global catalog entry (service offering or plan)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

/// An administrator enrolled on a crypto unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsmAdmin {
    pub name: String,
    pub ski: String,
}

/// Configuration of one crypto unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsmInfo {
    pub hsm_id: String,
    #[serde(default)]
    pub hsm_location: String,
    #[serde(default)]
    pub hsm_type: String,
    #[serde(default)]
    pub signature_threshold: i64,
    #[serde(default)]
    pub revocation_threshold: i64,
    #[serde(default)]
    pub current_mk_status: String,
    #[serde(default)]
    pub new_mk_status: String,
    #[serde(default)]
    pub current_mkvp: String,
    #[serde(default)]
    pub new_mkvp: String,
    #[serde(default)]
    pub admins: Vec<HsmAdmin>,
}

#[async_trait]
pub trait ResourceControllerApi: Send + Sync {
    /// List one page of instances; `start` is the continuation token
    async fn list_instances(&self, filter: &InstanceFilter, start: Option<&str>) -> Result<InstancePage>;
}

#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Service offerings with exactly this name
    async fn find_by_name(&self, name: &str) -> Result<Vec<CatalogEntry>>;

    async fn get(&self, id: &str) -> Result<CatalogEntry>;
}

#[async_trait]
pub trait CryptoUnitApi: Send + Sync {
    /// Crypto units of an instance, by instance GUID
    async fn query(&self, instance_guid: &str) -> Result<Vec<HsmInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_prefers_region() {
        let instance = ResourceInstance {
            region_id: Some("us-south".to_string()),
            crn: Some("crn:v1:bluemix:public:hs-crypto:eu-de:a/acc:guid::".to_string()),
            ..Default::default()
        };
        assert_eq!(instance.location(), Some("us-south"));
    }

    #[test]
    fn test_location_from_crn() {
        let instance = ResourceInstance {
            crn: Some("crn:v1:bluemix:public:hs-crypto:eu-de:a/acc:guid::".to_string()),
            ..Default::default()
        };
        assert_eq!(instance.location(), Some("eu-de"));
        assert_eq!(ResourceInstance::default().location(), None);
    }

    #[test]
    fn test_page_without_next_url() {
        let page: InstancePage =
            serde_json::from_value(serde_json::json!({"rows_count": 0, "resources": []})).unwrap();
        assert!(page.next_url.is_none());
        assert!(page.resources.is_empty());
    }
}
