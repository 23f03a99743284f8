//! Cloud Internet Services API surface
//!
//! CIS responses wrap their payload in an envelope:
//!
//! ```json
//! {"success": true, "errors": [], "messages": [], "result": { ... }}
//! ```
//!
//! [`Envelope::into_result`] unwraps it, turning `success: false` into an
//! [`Error::Api`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// An error or message entry in a response envelope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMessage {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Response envelope shared by every CIS endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<EnvelopeMessage>,
    pub result: Option<T>,
}

fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    /// The payload, or the envelope's errors
    pub fn into_result(self, operation: &str) -> Result<T> {
        self.into_optional(operation)?
            .ok_or_else(|| Error::api("cis", operation, None, "response has no result"))
    }

    /// The payload if any, or the envelope's errors
    pub fn into_optional(self, operation: &str) -> Result<Option<T>> {
        if !self.success {
            let message = self
                .errors
                .iter()
                .map(|e| match e.code {
                    Some(code) => format!("{code}: {}", e.message),
                    None => e.message.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::api("cis", operation, None, message));
        }
        Ok(self.result)
    }
}

/// Zone part of a `domain_id`
///
/// Domain IDs may be given as `zoneID:crn`; only the zone is used in paths.
pub fn zone_id(domain_id: &str) -> &str {
    domain_id.split(':').next().unwrap_or(domain_id)
}

/// Reference to a filter by ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRef {
    pub id: String,
}

/// A firewall rule as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub id: String,
    pub filter: FilterRef,
    pub action: String,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub paused: bool,
}

/// One rule in a create call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirewallRuleInput {
    pub filter: FilterRef,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

/// One rule in an update call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirewallRuleUpdate {
    pub id: String,
    #[serde(flatten)]
    pub rule: FirewallRuleInput,
}

/// A client certificate authority used for mutual TLS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessCertificate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub associated_hostnames: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,
}

#[derive(Clone, PartialEq, Serialize)]
pub struct AccessCertificateCreate {
    pub name: String,
    pub certificate: String,
    pub associated_hostnames: Vec<String>,
}

// Custom Debug implementation that hides the certificate
impl std::fmt::Debug for AccessCertificateCreate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCertificateCreate")
            .field("name", &self.name)
            .field("certificate", &"<REDACTED>")
            .field("associated_hostnames", &self.associated_hostnames)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessCertificateUpdate {
    pub name: String,
    pub associated_hostnames: Vec<String>,
}

/// Firewall rules of a zone
#[async_trait]
pub trait FirewallRuleApi: Send + Sync {
    async fn create(&self, crn: &str, zone_id: &str, rule: &FirewallRuleInput) -> Result<FirewallRule>;

    async fn get(&self, crn: &str, zone_id: &str, rule_id: &str) -> Result<FirewallRule>;

    async fn update(&self, crn: &str, zone_id: &str, rule: &FirewallRuleUpdate) -> Result<FirewallRule>;

    async fn delete(&self, crn: &str, zone_id: &str, rule_id: &str) -> Result<()>;
}

/// Filters referenced by firewall rules
#[async_trait]
pub trait FilterApi: Send + Sync {
    async fn delete(&self, crn: &str, zone_id: &str, filter_id: &str) -> Result<()>;
}

/// mTLS access certificates of a zone
#[async_trait]
pub trait AccessCertificateApi: Send + Sync {
    async fn create(
        &self,
        crn: &str,
        zone_id: &str,
        body: &AccessCertificateCreate,
    ) -> Result<AccessCertificate>;

    async fn get(&self, crn: &str, zone_id: &str, cert_id: &str) -> Result<AccessCertificate>;

    async fn update(
        &self,
        crn: &str,
        zone_id: &str,
        cert_id: &str,
        body: &AccessCertificateUpdate,
    ) -> Result<AccessCertificate>;

    async fn delete(&self, crn: &str, zone_id: &str, cert_id: &str) -> Result<()>;
}
