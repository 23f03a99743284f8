//! Plugin-based resource registry
//!
//! The registry maps resource type names (e.g. "ibm_pi_network") to their
//! handlers, so the daemon can dispatch a request without hardcoded
//! if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cloudplane_core::registry::{Request, ResourceRegistry};
//!
//! let registry = ResourceRegistry::new();
//! cloudplane_provider_power::register(&registry, &config)?;
//!
//! let request: Request = serde_json::from_str(input)?;
//! let outcome = registry.execute(request).await?;
//! ```
//!
//! ## Registration
//!
//! Each provider crate exposes a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ResourceRegistry, config: &ProviderConfig) -> Result<()> {
//!     let client = Arc::new(PowerClient::new(config)?);
//!     registry.register_resource(NetworkResource::new(client.clone(), ...));
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::resource::{DataSource, DynDataSource, DynResource, Operation, Outcome, Resource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// A single lifecycle request against one resource or data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Resource or data source type name
    pub resource: String,

    /// Operation to run; data sources only support `read`
    pub operation: Operation,

    /// Local identity (required for everything except create)
    #[serde(default)]
    pub id: Option<String>,

    /// Previously recorded state
    #[serde(default)]
    pub prior: Option<Value>,

    /// Desired configuration, or the query for a data source
    #[serde(default)]
    pub planned: Option<Value>,
}

/// Registry of resource and data source handlers
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes. Handlers are reference counted so a lookup
/// never holds the lock across an await.
#[derive(Default)]
pub struct ResourceRegistry {
    /// Registered resource handlers
    resources: RwLock<HashMap<String, Arc<dyn DynResource>>>,

    /// Registered data source handlers
    data_sources: RwLock<HashMap<String, Arc<dyn DynDataSource>>>,
}

impl ResourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource handler under its type name
    ///
    /// A handler registered twice replaces the earlier one.
    pub fn register_resource<R>(&self, resource: R)
    where
        R: Resource + 'static,
    {
        let name = Resource::type_name(&resource).to_string();
        debug!("Registering resource {}", name);
        let mut resources = self.resources.write().unwrap_or_else(PoisonError::into_inner);
        resources.insert(name, Arc::new(resource));
    }

    /// Register a data source handler under its type name
    pub fn register_data_source<D>(&self, data_source: D)
    where
        D: DataSource + 'static,
    {
        let name = DataSource::type_name(&data_source).to_string();
        debug!("Registering data source {}", name);
        let mut sources = self.data_sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.insert(name, Arc::new(data_source));
    }

    /// Look up a resource handler
    pub fn resource(&self, name: &str) -> Option<Arc<dyn DynResource>> {
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        resources.get(name).cloned()
    }

    /// Look up a data source handler
    pub fn data_source(&self, name: &str) -> Option<Arc<dyn DynDataSource>> {
        let sources = self.data_sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.get(name).cloned()
    }

    /// Dispatch a request to its handler
    ///
    /// # Parameters
    ///
    /// - `request`: Resource name, operation, identity and JSON records
    ///
    /// # Returns
    ///
    /// - `Ok(Outcome)`: Resulting identity and state (both empty after delete
    ///   or when a read finds the entity gone)
    /// - `Err(Error)`: Unknown resource type, or the handler failed
    pub async fn execute(&self, request: Request) -> Result<Outcome> {
        let Request {
            resource,
            operation,
            id,
            prior,
            planned,
        } = request;

        if let Some(handler) = self.resource(&resource) {
            info!("Running {} {}", operation, resource);
            return handler.apply(operation, id, prior, planned).await;
        }

        if let Some(handler) = self.data_source(&resource) {
            if operation != Operation::Read {
                return Err(Error::validation(format!(
                    "data source {resource} only supports read, got {operation}"
                )));
            }
            info!("Reading data source {}", resource);
            let query = planned.or(prior).unwrap_or(Value::Object(Default::default()));
            return handler.read(query).await;
        }

        Err(Error::config(format!("Unknown resource type: {resource}")))
    }

    /// List all registered resource types, sorted
    pub fn list_resources(&self) -> Vec<String> {
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = resources.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered data source types, sorted
    pub fn list_data_sources(&self) -> Vec<String> {
        let sources = self.data_sources.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a resource type is registered
    pub fn has_resource(&self, name: &str) -> bool {
        let resources = self.resources.read().unwrap_or_else(PoisonError::into_inner);
        resources.contains_key(name)
    }

    /// Check if a data source type is registered
    pub fn has_data_source(&self, name: &str) -> bool {
        let sources = self.data_sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }
}
