//! `ibm_cis_firewall_rules`: a zone firewall rule bound to an existing filter
//!
//! The identity is `rule_id/zone_id/cis_crn`; the CRN contains `/` and is
//! always the trailing segment.

use crate::api::{
    self, FilterApi, FilterRef, FirewallRule, FirewallRuleApi, FirewallRuleInput, FirewallRuleUpdate,
};
use async_trait::async_trait;
use cloudplane_core::{CompositeId, Error, Resource, ResourceData, Result, Timeouts};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const RESOURCE_TYPE: &str = "ibm_cis_firewall_rules";

/// Highest priority the service accepts
pub const MAX_PRIORITY: u32 = 2_147_483_647;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirewallAction {
    Log,
    Allow,
    Challenge,
    JsChallenge,
    Block,
}

impl FirewallAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirewallAction::Log => "log",
            FirewallAction::Allow => "allow",
            FirewallAction::Challenge => "challenge",
            FirewallAction::JsChallenge => "js_challenge",
            FirewallAction::Block => "block",
        }
    }

    fn from_remote(value: &str) -> Option<Self> {
        match value {
            "log" => Some(FirewallAction::Log),
            "allow" => Some(FirewallAction::Allow),
            "challenge" => Some(FirewallAction::Challenge),
            "js_challenge" => Some(FirewallAction::JsChallenge),
            "block" => Some(FirewallAction::Block),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallRuleRecord {
    pub cis_id: String,
    pub domain_id: String,
    pub filter_id: String,
    pub action: FirewallAction,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub paused: Option<bool>,

    // Computed
    #[serde(default)]
    pub firewall_rule_id: Option<String>,
}

impl FirewallRuleRecord {
    pub fn new(cis_id: &str, domain_id: &str, filter_id: &str, action: FirewallAction) -> Self {
        Self {
            cis_id: cis_id.to_string(),
            domain_id: domain_id.to_string(),
            filter_id: filter_id.to_string(),
            action,
            priority: None,
            description: None,
            paused: None,
            firewall_rule_id: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("cis_id", &self.cis_id),
            ("domain_id", &self.domain_id),
            ("filter_id", &self.filter_id),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation(format!("{field} is required")));
            }
        }
        if let Some(priority) = self.priority {
            if !(1..=MAX_PRIORITY).contains(&priority) {
                return Err(Error::validation(format!(
                    "priority must be between 1 and {MAX_PRIORITY}, got {priority}"
                )));
            }
        }
        Ok(())
    }

    fn input(&self) -> FirewallRuleInput {
        FirewallRuleInput {
            filter: FilterRef {
                id: self.filter_id.clone(),
            },
            action: self.action.as_str().to_string(),
            priority: self.priority,
            description: self.description.clone(),
            paused: self.paused,
        }
    }

    fn apply(&mut self, crn: String, zone_id: &str, rule: FirewallRule) {
        self.cis_id = crn;
        if api::zone_id(&self.domain_id) != zone_id {
            self.domain_id = zone_id.to_string();
        }
        self.filter_id = rule.filter.id;
        match FirewallAction::from_remote(&rule.action) {
            Some(action) => self.action = action,
            None => warn!("Firewall rule {} has unknown action '{}'", rule.id, rule.action),
        }
        if rule.priority.is_some() {
            self.priority = rule.priority;
        }
        self.description = rule.description;
        self.paused = Some(rule.paused);
        self.firewall_rule_id = Some(rule.id);
    }
}

/// Handler for `ibm_cis_firewall_rules`
pub struct FirewallRuleResource {
    rules: Arc<dyn FirewallRuleApi>,
    filters: Arc<dyn FilterApi>,
}

impl FirewallRuleResource {
    pub fn new(rules: Arc<dyn FirewallRuleApi>, filters: Arc<dyn FilterApi>) -> Self {
        Self { rules, filters }
    }
}

#[async_trait]
impl Resource for FirewallRuleResource {
    type Record = FirewallRuleRecord;

    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn timeouts(&self) -> Timeouts {
        let ten = Duration::from_secs(10 * 60);
        Timeouts::new(ten, ten, ten)
    }

    async fn create(&self, data: &mut ResourceData<FirewallRuleRecord>) -> Result<()> {
        let record = data.get();
        record.validate()?;
        let zone_id = api::zone_id(&record.domain_id);

        let rule = self
            .rules
            .create(&record.cis_id, zone_id, &record.input())
            .await
            .map_err(|e| e.with_operation(RESOURCE_TYPE, "create"))?;

        let id = CompositeId::new([rule.id.as_str(), zone_id, record.cis_id.as_str()]).to_string();
        info!("Created firewall rule {} in zone {}", rule.id, zone_id);
        data.set_id(id);

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData<FirewallRuleRecord>) -> Result<()> {
        let [rule_id, zone_id, crn] = CompositeId::split::<3>(data.require_id()?)?;

        let rule = match self.rules.get(&crn, &zone_id, &rule_id).await {
            Ok(rule) => rule,
            Err(e) if e.is_not_found() => {
                warn!("Firewall rule {} no longer exists, removing it", rule_id);
                data.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "read")),
        };

        data.get_mut().apply(crn, &zone_id, rule);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData<FirewallRuleRecord>) -> Result<()> {
        let [rule_id, zone_id, crn] = CompositeId::split::<3>(data.require_id()?)?;
        let record = data.get();
        record.validate()?;

        let changed = data.has_change(|r| &r.filter_id)
            || data.has_change(|r| &r.action)
            || data.has_change(|r| &r.paused)
            || data.has_change(|r| &r.description)
            || data.has_change(|r| &r.priority);
        if !changed {
            debug!("Firewall rule {} has no changes", rule_id);
            return Ok(());
        }

        let update = FirewallRuleUpdate {
            id: rule_id.clone(),
            rule: record.input(),
        };
        self.rules
            .update(&crn, &zone_id, &update)
            .await
            .map_err(|e| e.with_operation(RESOURCE_TYPE, "update"))?;
        info!("Updated firewall rule {}", rule_id);

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData<FirewallRuleRecord>) -> Result<()> {
        let [rule_id, zone_id, crn] = CompositeId::split::<3>(data.require_id()?)?;

        match self.rules.delete(&crn, &zone_id, &rule_id).await {
            Ok(()) => info!("Deleted firewall rule {}", rule_id),
            Err(e) if e.is_not_found() => {
                // The filter may already back another rule
                debug!("Firewall rule {} already gone, leaving its filter", rule_id);
                data.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "delete")),
        }

        // The rule's filter goes with it
        let filter_id = data.get().filter_id.clone();
        if !filter_id.is_empty() {
            match self.filters.delete(&crn, &zone_id, &filter_id).await {
                Ok(()) => info!("Deleted filter {}", filter_id),
                Err(e) if e.is_not_found() => debug!("Filter {} already gone", filter_id),
                Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "delete")),
            }
        }

        data.clear_id();
        Ok(())
    }
}
