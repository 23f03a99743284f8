//! Configuration types for cloudplane providers
//!
//! This module defines the provider-wide settings every provider crate is
//! registered with: credentials, service endpoints and poll timing.

use crate::error::{Error, Result};
use crate::poll::{Backoff, PollSettings};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Provider-wide configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key used as the bearer credential for every service
    pub api_key: String,

    /// Region used to derive regional endpoints (e.g. "us-south")
    #[serde(default = "default_region")]
    pub region: String,

    /// Service endpoint overrides
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Poll-converge timing
    #[serde(default)]
    pub poll: PollConfig,

    /// Per-request HTTP timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Power Virtual Server runs in a customer data center
    ///
    /// On-prem locations have no workspace capabilities to query.
    #[serde(default)]
    pub on_prem: bool,
}

// Keep the API key out of logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoints", &self.endpoints)
            .field("poll", &self.poll)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("on_prem", &self.on_prem)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a configuration with default endpoints for `region`
    pub fn new(api_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            region: region.into(),
            endpoints: EndpointsConfig::default(),
            poll: PollConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
            on_prem: false,
        }
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::config("API key cannot be empty"));
        }
        if self.region.trim().is_empty() {
            return Err(Error::config("Region cannot be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::config("Request timeout must be > 0"));
        }

        self.endpoints.validate()?;
        self.poll.validate()?;

        Ok(())
    }

    /// Power Virtual Server endpoint for the configured region
    pub fn power_url(&self) -> String {
        self.endpoints
            .power
            .clone()
            .unwrap_or_else(|| format!("https://{}.power-iaas.cloud.ibm.com", self.region))
    }

    /// Hyper Protect Crypto Services endpoint for the configured region
    pub fn hpcs_url(&self) -> String {
        self.endpoints
            .hpcs
            .clone()
            .unwrap_or_else(|| format!("https://{}.broker.hs-crypto.cloud.ibm.com", self.region))
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Service endpoints
///
/// Global services have fixed defaults; regional ones are derived from the
/// region unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Power Virtual Server (regional)
    #[serde(default)]
    pub power: Option<String>,

    /// DNS Services
    #[serde(default = "default_dns_url")]
    pub dns: String,

    /// Cloud Internet Services
    #[serde(default = "default_cis_url")]
    pub cis: String,

    /// Resource controller
    #[serde(default = "default_resource_controller_url")]
    pub resource_controller: String,

    /// Global catalog
    #[serde(default = "default_catalog_url")]
    pub catalog: String,

    /// Global tagging
    #[serde(default = "default_tagging_url")]
    pub tagging: String,

    /// Hyper Protect Crypto Services broker (regional)
    #[serde(default)]
    pub hpcs: Option<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            power: None,
            dns: default_dns_url(),
            cis: default_cis_url(),
            resource_controller: default_resource_controller_url(),
            catalog: default_catalog_url(),
            tagging: default_tagging_url(),
            hpcs: None,
        }
    }
}

impl EndpointsConfig {
    fn validate(&self) -> Result<()> {
        let fixed = [
            ("dns", Some(&self.dns)),
            ("cis", Some(&self.cis)),
            ("resource_controller", Some(&self.resource_controller)),
            ("catalog", Some(&self.catalog)),
            ("tagging", Some(&self.tagging)),
            ("power", self.power.as_ref()),
            ("hpcs", self.hpcs.as_ref()),
        ];

        for (name, url) in fixed {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(Error::config(format!(
                        "Endpoint '{name}' must be an http(s) URL, got '{url}'"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Poll-converge timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay before the first refresh (in seconds)
    #[serde(default = "default_poll_delay_secs")]
    pub delay_secs: u64,

    /// Minimum interval between refreshes (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound for exponential backoff (in seconds)
    ///
    /// When unset the interval stays fixed.
    #[serde(default)]
    pub max_interval_secs: Option<u64>,

    /// Interval between attempts of a retried create or delete (in seconds)
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_poll_delay_secs(),
            interval_secs: default_poll_interval_secs(),
            max_interval_secs: None,
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

impl PollConfig {
    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::config("Poll interval must be > 0"));
        }
        if self.retry_interval_secs == 0 {
            return Err(Error::config("Retry interval must be > 0"));
        }
        if let Some(max) = self.max_interval_secs {
            if max < self.interval_secs {
                return Err(Error::config(format!(
                    "Maximum poll interval ({max}s) is below the poll interval ({}s)",
                    self.interval_secs
                )));
            }
        }
        Ok(())
    }

    /// Convert to the durations used by the poll loop
    pub fn settings(&self) -> PollSettings {
        let backoff = match self.max_interval_secs {
            Some(max) => Backoff::Exponential {
                max: Duration::from_secs(max),
            },
            None => Backoff::Fixed,
        };

        PollSettings {
            delay: Duration::from_secs(self.delay_secs),
            interval: Duration::from_secs(self.interval_secs),
            backoff,
            retry_interval: Duration::from_secs(self.retry_interval_secs),
        }
    }
}

fn default_region() -> String {
    "us-south".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_dns_url() -> String {
    "https://api.dns-svcs.cloud.ibm.com/v1".to_string()
}

fn default_cis_url() -> String {
    "https://api.cis.cloud.ibm.com".to_string()
}

fn default_resource_controller_url() -> String {
    "https://resource-controller.cloud.ibm.com".to_string()
}

fn default_catalog_url() -> String {
    "https://globalcatalog.cloud.ibm.com/api/v1".to_string()
}

fn default_tagging_url() -> String {
    "https://tags.global-search-tagging.cloud.ibm.com".to_string()
}

fn default_poll_delay_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_retry_interval_secs() -> u64 {
    5
}
