//! In-memory CIS zone used by the CIS contract tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use cloudplane_core::{Error, Result};
use cloudplane_provider_cis::api::{
    AccessCertificate, AccessCertificateApi, AccessCertificateCreate, AccessCertificateUpdate,
    FilterApi, FirewallRule, FirewallRuleApi, FirewallRuleInput, FirewallRuleUpdate,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CRN: &str = "crn:v1:bluemix:public:internet-svcs:global:a/acc123:inst456::";
pub const ZONE: &str = "zone-1";

#[derive(Clone, Default)]
pub struct FakeCis {
    rules: Arc<Mutex<HashMap<String, FirewallRule>>>,
    filters: Arc<Mutex<HashSet<String>>>,
    certs: Arc<Mutex<HashMap<String, AccessCertificate>>>,
    next_id: Arc<AtomicUsize>,

    pub calls: Arc<AtomicUsize>,
    pub updates: Arc<AtomicUsize>,
    /// Zones seen by any call, to check the CRN and zone reach the service
    pub seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeCis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-existing filter a rule can reference
    pub fn with_filter(self, id: &str) -> Self {
        self.filters.lock().unwrap().insert(id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rule(&self, id: &str) -> Option<FirewallRule> {
        self.rules.lock().unwrap().get(id).cloned()
    }

    pub fn has_filter(&self, id: &str) -> bool {
        self.filters.lock().unwrap().contains(id)
    }

    pub fn cert(&self, id: &str) -> Option<AccessCertificate> {
        self.certs.lock().unwrap().get(id).cloned()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn record(&self, crn: &str, zone_id: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((crn.to_string(), zone_id.to_string()));
    }
}

#[async_trait]
impl FirewallRuleApi for FakeCis {
    async fn create(&self, crn: &str, zone_id: &str, rule: &FirewallRuleInput) -> Result<FirewallRule> {
        self.record(crn, zone_id);
        if !self.has_filter(&rule.filter.id) {
            return Err(Error::api("cis", "create firewall rule", Some(400), "filter not found"));
        }
        let created = FirewallRule {
            id: self.next("rule"),
            filter: rule.filter.clone(),
            action: rule.action.clone(),
            // the service assigns a priority when none is given
            priority: rule.priority.or(Some(1000)),
            description: rule.description.clone(),
            paused: rule.paused.unwrap_or(false),
        };
        self.rules
            .lock()
            .unwrap()
            .insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get(&self, crn: &str, zone_id: &str, rule_id: &str) -> Result<FirewallRule> {
        self.record(crn, zone_id);
        self.rule(rule_id)
            .ok_or_else(|| Error::not_found(format!("firewall rule {rule_id}")))
    }

    async fn update(&self, crn: &str, zone_id: &str, rule: &FirewallRuleUpdate) -> Result<FirewallRule> {
        self.record(crn, zone_id);
        self.updates.fetch_add(1, Ordering::SeqCst);

        let mut rules = self.rules.lock().unwrap();
        let stored = rules
            .get_mut(&rule.id)
            .ok_or_else(|| Error::not_found(format!("firewall rule {}", rule.id)))?;
        stored.filter = rule.rule.filter.clone();
        stored.action = rule.rule.action.clone();
        stored.priority = rule.rule.priority.or(stored.priority);
        stored.description = rule.rule.description.clone();
        stored.paused = rule.rule.paused.unwrap_or(stored.paused);
        Ok(stored.clone())
    }

    async fn delete(&self, crn: &str, zone_id: &str, rule_id: &str) -> Result<()> {
        self.record(crn, zone_id);
        self.rules
            .lock()
            .unwrap()
            .remove(rule_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("firewall rule {rule_id}")))
    }
}

#[async_trait]
impl FilterApi for FakeCis {
    async fn delete(&self, crn: &str, zone_id: &str, filter_id: &str) -> Result<()> {
        self.record(crn, zone_id);
        if self.filters.lock().unwrap().remove(filter_id) {
            Ok(())
        } else {
            Err(Error::not_found(format!("filter {filter_id}")))
        }
    }
}

#[async_trait]
impl AccessCertificateApi for FakeCis {
    async fn create(
        &self,
        crn: &str,
        zone_id: &str,
        body: &AccessCertificateCreate,
    ) -> Result<AccessCertificate> {
        self.record(crn, zone_id);
        let now = Utc::now();
        let cert = AccessCertificate {
            id: self.next("cert"),
            name: body.name.clone(),
            fingerprint: Some("ab:cd".to_string()),
            associated_hostnames: body.associated_hostnames.clone(),
            created_at: Some(now),
            updated_at: Some(now),
            expires_on: Some(now + Duration::days(365)),
        };
        self.certs
            .lock()
            .unwrap()
            .insert(cert.id.clone(), cert.clone());
        Ok(cert)
    }

    async fn get(&self, crn: &str, zone_id: &str, cert_id: &str) -> Result<AccessCertificate> {
        self.record(crn, zone_id);
        self.cert(cert_id)
            .ok_or_else(|| Error::not_found(format!("access certificate {cert_id}")))
    }

    async fn update(
        &self,
        crn: &str,
        zone_id: &str,
        cert_id: &str,
        body: &AccessCertificateUpdate,
    ) -> Result<AccessCertificate> {
        self.record(crn, zone_id);
        self.updates.fetch_add(1, Ordering::SeqCst);

        let mut certs = self.certs.lock().unwrap();
        let cert = certs
            .get_mut(cert_id)
            .ok_or_else(|| Error::not_found(format!("access certificate {cert_id}")))?;
        cert.name = body.name.clone();
        cert.associated_hostnames = body.associated_hostnames.clone();
        cert.updated_at = Some(Utc::now());
        Ok(cert.clone())
    }

    async fn delete(&self, crn: &str, zone_id: &str, cert_id: &str) -> Result<()> {
        self.record(crn, zone_id);
        self.certs
            .lock()
            .unwrap()
            .remove(cert_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("access certificate {cert_id}")))
    }
}
