//! REST implementation of the CIS APIs
//!
//! ## API Reference
//!
//! - Firewall rules: `/v1/:crn/zones/:zone_id/firewall/rules[/:rule_id]`
//! - Filters: `/v1/:crn/zones/:zone_id/filters?id=:filter_id`
//! - Access certificates: `/v1/:crn/zones/:zone_id/access_certificates[/:cert_id]`
//!
//! Rule create and update take and return arrays; this client sends and
//! expects exactly one rule.

use crate::api::{
    AccessCertificate, AccessCertificateApi, AccessCertificateCreate, AccessCertificateUpdate,
    Envelope, FilterApi, FirewallRule, FirewallRuleApi, FirewallRuleInput, FirewallRuleUpdate,
};
use async_trait::async_trait;
use cloudplane_core::http::Method;
use cloudplane_core::{Error, ProviderConfig, RestClient, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// CIS client
#[derive(Debug, Clone)]
pub struct CisClient {
    rest: RestClient,
}

impl CisClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let rest = RestClient::new(
            "cis",
            config.endpoints.cis.clone(),
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        Ok(Self { rest })
    }

    /// Zone-scoped path; the CRN's `/` is escaped so it stays one segment
    fn zone_path(crn: &str, zone_id: &str, rest: &str) -> String {
        format!("/v1/{}/zones/{zone_id}/{rest}", crn.replace('/', "%2F"))
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let operation = format!("{method} {path}");
        let envelope: Envelope<T> = self.rest.call(method, path, query, &[], body).await?;
        envelope.into_result(&operation)
    }

    /// Send a body-less call whose result, if any, is ignored
    async fn send_unit(&self, method: Method, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let operation = format!("{method} {path}");
        let envelope: Option<Envelope<serde_json::Value>> =
            self.rest.call(method, path, query, &[], None::<&()>).await?;
        if let Some(envelope) = envelope {
            envelope.into_optional(&operation)?;
        }
        Ok(())
    }

    async fn send_one<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let results: Vec<T> = self.send(method.clone(), path, &[], Some(body)).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Error::api("cis", format!("{method} {path}"), None, "empty result list"))
    }
}

#[async_trait]
impl FirewallRuleApi for CisClient {
    async fn create(&self, crn: &str, zone_id: &str, rule: &FirewallRuleInput) -> Result<FirewallRule> {
        let path = Self::zone_path(crn, zone_id, "firewall/rules");
        self.send_one(Method::POST, &path, &[rule]).await
    }

    async fn get(&self, crn: &str, zone_id: &str, rule_id: &str) -> Result<FirewallRule> {
        let path = Self::zone_path(crn, zone_id, &format!("firewall/rules/{rule_id}"));
        self.send(Method::GET, &path, &[], None::<&()>).await
    }

    async fn update(&self, crn: &str, zone_id: &str, rule: &FirewallRuleUpdate) -> Result<FirewallRule> {
        let path = Self::zone_path(crn, zone_id, "firewall/rules");
        self.send_one(Method::PUT, &path, &[rule]).await
    }

    async fn delete(&self, crn: &str, zone_id: &str, rule_id: &str) -> Result<()> {
        let path = Self::zone_path(crn, zone_id, "firewall/rules");
        self.send_unit(Method::DELETE, &path, &[("id", rule_id)]).await
    }
}

#[async_trait]
impl FilterApi for CisClient {
    async fn delete(&self, crn: &str, zone_id: &str, filter_id: &str) -> Result<()> {
        let path = Self::zone_path(crn, zone_id, "filters");
        self.send_unit(Method::DELETE, &path, &[("id", filter_id)]).await
    }
}

#[async_trait]
impl AccessCertificateApi for CisClient {
    async fn create(
        &self,
        crn: &str,
        zone_id: &str,
        body: &AccessCertificateCreate,
    ) -> Result<AccessCertificate> {
        let path = Self::zone_path(crn, zone_id, "access_certificates");
        self.send(Method::POST, &path, &[], Some(body)).await
    }

    async fn get(&self, crn: &str, zone_id: &str, cert_id: &str) -> Result<AccessCertificate> {
        let path = Self::zone_path(crn, zone_id, &format!("access_certificates/{cert_id}"));
        self.send(Method::GET, &path, &[], None::<&()>).await
    }

    async fn update(
        &self,
        crn: &str,
        zone_id: &str,
        cert_id: &str,
        body: &AccessCertificateUpdate,
    ) -> Result<AccessCertificate> {
        let path = Self::zone_path(crn, zone_id, &format!("access_certificates/{cert_id}"));
        self.send(Method::PATCH, &path, &[], Some(body)).await
    }

    async fn delete(&self, crn: &str, zone_id: &str, cert_id: &str) -> Result<()> {
        let path = Self::zone_path(crn, zone_id, &format!("access_certificates/{cert_id}"));
        self.send_unit(Method::DELETE, &path, &[]).await
    }
}
