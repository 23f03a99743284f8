//! `ibm_cis_mtls`: a client CA certificate that enables mutual TLS for
//! hostnames in a zone
//!
//! The service never returns the certificate body, so the configured value is
//! carried over on every read. It cannot be replaced in place.

use crate::api::{
    self, AccessCertificate, AccessCertificateApi, AccessCertificateCreate, AccessCertificateUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudplane_core::{CompositeId, Error, Resource, ResourceData, Result, Timeouts};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const RESOURCE_TYPE: &str = "ibm_cis_mtls";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MtlsRecord {
    pub cis_id: String,
    pub domain_id: String,
    pub certificate: String,
    pub name: String,
    #[serde(default)]
    pub associated_hostnames: Vec<String>,

    // Computed
    #[serde(default)]
    pub mtls_id: Option<String>,
    #[serde(default)]
    pub cert_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,
}

// Custom Debug implementation that hides the certificate
impl std::fmt::Debug for MtlsRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MtlsRecord")
            .field("cis_id", &self.cis_id)
            .field("domain_id", &self.domain_id)
            .field("certificate", &"<REDACTED>")
            .field("name", &self.name)
            .field("associated_hostnames", &self.associated_hostnames)
            .field("cert_id", &self.cert_id)
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

impl MtlsRecord {
    pub fn new(cis_id: &str, domain_id: &str, certificate: &str, name: &str) -> Self {
        Self {
            cis_id: cis_id.to_string(),
            domain_id: domain_id.to_string(),
            certificate: certificate.to_string(),
            name: name.to_string(),
            associated_hostnames: Vec::new(),
            mtls_id: None,
            cert_id: None,
            created_at: None,
            updated_at: None,
            expires_on: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("cis_id", &self.cis_id),
            ("domain_id", &self.domain_id),
            ("certificate", &self.certificate),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::validation(format!("{field} is required")));
            }
        }
        Ok(())
    }

    fn apply(&mut self, crn: String, zone_id: &str, cert: AccessCertificate) {
        self.cis_id = crn;
        if api::zone_id(&self.domain_id) != zone_id {
            self.domain_id = zone_id.to_string();
        }
        self.name = cert.name;
        self.associated_hostnames = cert.associated_hostnames;
        self.mtls_id = Some(cert.id.clone());
        self.cert_id = Some(cert.id);
        self.created_at = cert.created_at;
        self.updated_at = cert.updated_at;
        self.expires_on = cert.expires_on;
    }
}

/// Handler for `ibm_cis_mtls`
pub struct MtlsResource {
    api: Arc<dyn AccessCertificateApi>,
}

impl MtlsResource {
    pub fn new(api: Arc<dyn AccessCertificateApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for MtlsResource {
    type Record = MtlsRecord;

    fn type_name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn timeouts(&self) -> Timeouts {
        let ten = Duration::from_secs(10 * 60);
        Timeouts::new(ten, ten, ten)
    }

    async fn create(&self, data: &mut ResourceData<MtlsRecord>) -> Result<()> {
        let record = data.get();
        record.validate()?;
        let zone_id = api::zone_id(&record.domain_id);

        let body = AccessCertificateCreate {
            name: record.name.clone(),
            certificate: record.certificate.clone(),
            associated_hostnames: record.associated_hostnames.clone(),
        };
        let cert = self
            .api
            .create(&record.cis_id, zone_id, &body)
            .await
            .map_err(|e| e.with_operation(RESOURCE_TYPE, "create"))?;

        let id = CompositeId::new([cert.id.as_str(), zone_id, record.cis_id.as_str()]).to_string();
        info!("Created mTLS certificate {} ({})", cert.id, record.name);
        data.set_id(id);

        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData<MtlsRecord>) -> Result<()> {
        let [cert_id, zone_id, crn] = CompositeId::split::<3>(data.require_id()?)?;

        let cert = match self.api.get(&crn, &zone_id, &cert_id).await {
            Ok(cert) => cert,
            Err(e) if e.is_not_found() => {
                warn!("mTLS certificate {} no longer exists, removing it", cert_id);
                data.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "read")),
        };

        data.get_mut().apply(crn, &zone_id, cert);
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData<MtlsRecord>) -> Result<()> {
        let [cert_id, zone_id, crn] = CompositeId::split::<3>(data.require_id()?)?;

        if data.has_change(|r| &r.certificate) {
            return Err(Error::validation(format!(
                "{RESOURCE_TYPE}: certificate cannot be changed in place"
            )));
        }
        let record = data.get();
        record.validate()?;

        if !data.has_change(|r| &r.name) && !data.has_change(|r| &r.associated_hostnames) {
            debug!("mTLS certificate {} has no changes", cert_id);
            return Ok(());
        }

        let body = AccessCertificateUpdate {
            name: record.name.clone(),
            associated_hostnames: record.associated_hostnames.clone(),
        };
        self.api
            .update(&crn, &zone_id, &cert_id, &body)
            .await
            .map_err(|e| e.with_operation(RESOURCE_TYPE, "update"))?;
        info!("Updated mTLS certificate {}", cert_id);

        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData<MtlsRecord>) -> Result<()> {
        let [cert_id, zone_id, crn] = CompositeId::split::<3>(data.require_id()?)?;

        match self.api.delete(&crn, &zone_id, &cert_id).await {
            Ok(()) => info!("Deleted mTLS certificate {}", cert_id),
            Err(e) if e.is_not_found() => debug!("mTLS certificate {} already gone", cert_id),
            Err(e) => return Err(e.with_operation(RESOURCE_TYPE, "delete")),
        }

        data.clear_id();
        Ok(())
    }
}
