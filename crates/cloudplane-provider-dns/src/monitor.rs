//! `ibm_dns_glb_monitor`: a health check used by DNS global load balancers

use crate::api::{HealthcheckHeader, Monitor, MonitorApi, MonitorBody};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_core::{CompositeId, Error, Resource, ResourceData, Result, Timeouts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const RESOURCE_TYPE: &str = "ibm_dns_glb_monitor";

/// Accepted `expected_codes` values
pub const EXPECTED_CODES: &[&str] = &[
    "200", "201", "202", "203", "204", "205", "206", "207", "208", "226", "2xx", "3xx", "4xx",
    "5xx",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorType {
    #[default]
    Http,
    Https,
    Tcp,
}

impl MonitorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorType::Http => "HTTP",
            MonitorType::Https => "HTTPS",
            MonitorType::Tcp => "TCP",
        }
    }

    fn from_remote(value: &str) -> Option<Self> {
        match value {
            "HTTP" => Some(MonitorType::Http),
            "HTTPS" => Some(MonitorType::Https),
            "TCP" => Some(MonitorType::Tcp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorMethod {
    Get,
    Head,
}

impl MonitorMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorMethod::Get => "GET",
            MonitorMethod::Head => "HEAD",
        }
    }

    fn from_remote(value: &str) -> Option<Self> {
        match value {
            "GET" => Some(MonitorMethod::Get),
            "HEAD" => Some(MonitorMethod::Head),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRecord {
    pub instance_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub monitor_type: MonitorType,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default)]
    pub method: Option<MonitorMethod>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: BTreeSet<HealthcheckHeader>,
    #[serde(default)]
    pub allow_insecure: Option<bool>,
    #[serde(default)]
    pub expected_codes: Option<String>,
    #[serde(default)]
    pub expected_body: Option<String>,

    // Computed
    #[serde(default)]
    pub monitor_id: Option<String>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    60
}

fn default_retries() -> u32 {
    1
}

fn default_timeout() -> u32 {
    5
}

impl MonitorRecord {
    pub fn new(instance_id: &str, name: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            name: name.to_string(),
            description: None,
            monitor_type: MonitorType::default(),
            port: None,
            interval: default_interval(),
            retries: default_retries(),
            timeout: default_timeout(),
            method: None,
            path: None,
            headers: BTreeSet::new(),
            allow_insecure: None,
            expected_codes: None,
            expected_body: None,
            monitor_id: None,
            created_on: None,
            modified_on: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.instance_id.trim().is_empty() {
            return Err(Error::validation("instance_id is required"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }
        if let Some(codes) = &self.expected_codes {
            if !EXPECTED_CODES.contains(&codes.as_str()) {
                return Err(Error::validation(format!(
                    "expected_codes must be one of {}, got '{codes}'",
                    EXPECTED_CODES.join(",")
                )));
            }
        }
        Ok(())
    }

    /// The monitor body sent on create; unset fields are left to the service
    pub fn body(&self) -> MonitorBody {
        MonitorBody {
            name: self.name.clone(),
            description: self.description.clone(),
            monitor_type: Some(self.monitor_type.as_str().to_string()),
            port: self.port,
            interval: Some(self.interval),
            retries: Some(self.retries),
            timeout: Some(self.timeout),
            method: self.method.map(|m| m.as_str().to_string()),
            path: self.path.clone(),
            headers: self.headers.iter().cloned().collect(),
            allow_insecure: self.allow_insecure,
            expected_codes: self.expected_codes.clone(),
            expected_body: self.expected_body.clone(),
        }
    }

    /// The body sent on update
    ///
    /// Updates are merged into the stored monitor, so `description` and
    /// `expected_body` are always sent (empty when unset) to clear old values.
    /// `path`, `method`, `expected_codes` and `allow_insecure` fall back to
    /// the service's value when unset.
    pub fn update_body(&self) -> MonitorBody {
        MonitorBody {
            description: Some(self.description.clone().unwrap_or_default()),
            expected_body: Some(self.expected_body.clone().unwrap_or_default()),
            ..self.body()
        }
    }

    /// Copy the service's view of the monitor into this record
    fn apply(&mut self, monitor: Monitor) {
        let body = monitor.body;

        self.monitor_id = Some(monitor.id);
        self.created_on = monitor.created_on;
        self.modified_on = monitor.modified_on;
        self.name = body.name;
        self.port = body.port;
        self.headers = body.headers.into_iter().collect();

        if let Some(kind) = body.monitor_type.as_deref() {
            match MonitorType::from_remote(kind) {
                Some(kind) => self.monitor_type = kind,
                None => warn!("Monitor has unknown type '{}'", kind),
            }
        }
        if let Some(method) = body.method.as_deref().and_then(MonitorMethod::from_remote) {
            self.method = Some(method);
        }
        if let Some(interval) = body.interval {
            self.interval = interval;
        }
        if let Some(retries) = body.retries {
            self.retries = retries;
        }
        if let Some(timeout) = body.timeout {
            self.timeout = timeout;
        }
        if body.path.is_some() {
            self.path = body.path;
        }
        if body.expected_codes.is_some() {
            self.expected_codes = body.expected_codes;
        }
        if body.allow_insecure.is_some() {
            self.allow_insecure = body.allow_insecure;
        }
        self.description = body.description.filter(|d| !d.is_empty());
        self.expected_body = body.expected_body.filter(|b| !b.is_empty());
    }
}

/// Handler for `ibm_dns_glb_monitor`
pub struct MonitorResource {
    api: Arc<dyn MonitorApi>,
}

impl MonitorResource {
    pub fn new(api: Arc<dyn MonitorApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for MonitorResource {
    type Record = MonitorRecord;

    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn timeouts(&self) -> Timeouts {
        let ten = Duration::from_secs(10 * 60);
        Timeouts::new(ten, ten, ten)
    }

    async fn create(&self, data: &mut ResourceData<MonitorRecord>) -> Result<()> {
        let record = data.get();
        record.validate()?;

        let monitor = self
            .api
            .create(&record.instance_id, &record.body())
            .await
            .map_err(|e| e.with_operation(RESOURCE_TYPE, "create"))?;

        let id = CompositeId::new([record.instance_id.as_str(), monitor.id.as_str()]).to_string();
        info!("Created GLB monitor {} ({})", monitor.id, record.name);
        data.set_id(id);

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData<MonitorRecord>) -> Result<()> {
        let [instance_id, monitor_id] = CompositeId::split::<2>(data.require_id()?)?;

        let monitor = match self.api.get(&instance_id, &monitor_id).await {
            Ok(monitor) => monitor,
            Err(e) if e.is_not_found() => {
                warn!("GLB monitor {} no longer exists, removing it", monitor_id);
                data.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "read")),
        };

        let record = data.get_mut();
        record.instance_id = instance_id;
        record.apply(monitor);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData<MonitorRecord>) -> Result<()> {
        let [instance_id, monitor_id] = CompositeId::split::<2>(data.require_id()?)?;

        if data.has_change(|r| &r.instance_id) {
            return Err(Error::validation(format!(
                "{RESOURCE_TYPE}: instance_id cannot be changed in place"
            )));
        }
        let record = data.get();
        record.validate()?;

        let changed = data.has_change(|r| &r.name)
            || data.has_change(|r| &r.description)
            || data.has_change(|r| &r.monitor_type)
            || data.has_change(|r| &r.port)
            || data.has_change(|r| &r.interval)
            || data.has_change(|r| &r.retries)
            || data.has_change(|r| &r.timeout)
            || data.has_change(|r| &r.method)
            || data.has_change(|r| &r.path)
            || data.has_change(|r| &r.headers)
            || data.has_change(|r| &r.allow_insecure)
            || data.has_change(|r| &r.expected_codes)
            || data.has_change(|r| &r.expected_body);
        if !changed {
            debug!("GLB monitor {} has no changes", monitor_id);
            return Ok(());
        }

        self.api
            .update(&instance_id, &monitor_id, &record.update_body())
            .await
            .map_err(|e| e.with_operation(RESOURCE_TYPE, "update"))?;
        info!("Updated GLB monitor {}", monitor_id);

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData<MonitorRecord>) -> Result<()> {
        let [instance_id, monitor_id] = CompositeId::split::<2>(data.require_id()?)?;

        match self.api.delete(&instance_id, &monitor_id).await {
            Ok(()) => info!("Deleted GLB monitor {}", monitor_id),
            Err(e) if e.is_not_found() => debug!("GLB monitor {} already gone", monitor_id),
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "delete")),
        }

        data.clear_id();
        Ok(())
    }
}
