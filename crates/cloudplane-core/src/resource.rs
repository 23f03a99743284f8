//! Resource and data source contracts
//!
//! A provider crate implements [`Resource`] once per managed resource type.
//! Each lifecycle operation receives a [`ResourceData`] holding the local
//! identity, the prior recorded state and the planned record. Handlers read
//! fields from it, call the vendor, and write the observed values back.
//!
//! [`DynResource`] and [`DynDataSource`] erase the record type to JSON so the
//! [`ResourceRegistry`](crate::registry::ResourceRegistry) can hold every
//! handler in one map.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Per-operation time limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    /// Build from create/update/delete limits; reads keep the default
    pub fn new(create: Duration, update: Duration, delete: Duration) -> Self {
        Self {
            create,
            update,
            delete,
            ..Self::default()
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        let twenty = Duration::from_secs(20 * 60);
        Self {
            create: twenty,
            read: twenty,
            update: twenty,
            delete: twenty,
        }
    }
}

/// The record being operated on, plus its identity and prior state
#[derive(Debug, Clone)]
pub struct ResourceData<R> {
    id: Option<String>,
    prior: Option<R>,
    record: R,
    timeouts: Timeouts,
}

impl<R> ResourceData<R> {
    /// Data for a record that has not been created yet
    pub fn new(record: R) -> Self {
        Self {
            id: None,
            prior: None,
            record,
            timeouts: Timeouts::default(),
        }
    }

    /// Set the local identity
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the previously recorded state, enabling change detection
    pub fn with_prior(mut self, prior: R) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Local identity, `None` when never created or found gone
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Local identity, failing when it is absent
    pub fn require_id(&self) -> Result<&str> {
        self.id()
            .ok_or_else(|| Error::validation("resource has no ID; it was never created"))
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Forget the identity; the caller drops the resource from its state
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Planned or observed record
    pub fn get(&self) -> &R {
        &self.record
    }

    /// Mutable access for writing observed values
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.record
    }

    /// Replace the whole record
    pub fn set(&mut self, record: R) {
        self.record = record;
    }

    /// Previously recorded state, if any
    pub fn prior(&self) -> Option<&R> {
        self.prior.as_ref()
    }

    /// Whether a field differs from the prior state
    ///
    /// Always `true` when there is no prior state.
    pub fn has_change<T, F>(&self, field: F) -> bool
    where
        T: PartialEq + ?Sized,
        F: Fn(&R) -> &T,
    {
        match &self.prior {
            Some(prior) => field(prior) != field(&self.record),
            None => true,
        }
    }

    /// Old and new value of a field
    pub fn get_change<'a, T, F>(&'a self, field: F) -> (Option<&'a T>, &'a T)
    where
        T: ?Sized,
        F: Fn(&'a R) -> &'a T,
    {
        (self.prior.as_ref().map(&field), field(&self.record))
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Consume into the identity and record
    pub fn into_parts(self) -> (Option<String>, R) {
        (self.id, self.record)
    }
}

/// A managed resource type
#[async_trait]
pub trait Resource: Send + Sync {
    /// Typed configuration record for this resource
    type Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Resource type name, e.g. "ibm_pi_network"
    fn type_name(&self) -> &'static str;

    /// Time limits for each lifecycle operation
    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Create the remote entity and set the local identity
    async fn create(&self, data: &mut ResourceData<Self::Record>) -> Result<()>;

    /// Refresh every field from the remote entity
    ///
    /// Clears the identity and succeeds when the entity is gone.
    async fn read(&self, data: &mut ResourceData<Self::Record>) -> Result<()>;

    /// Push changed fields to the remote entity
    async fn update(&self, _data: &mut ResourceData<Self::Record>) -> Result<()> {
        Err(Error::validation(format!(
            "{} does not support in-place update",
            self.type_name()
        )))
    }

    /// Delete the remote entity; absence is success
    async fn delete(&self, data: &mut ResourceData<Self::Record>) -> Result<()>;
}

/// A read-only lookup
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Lookup arguments
    type Query: DeserializeOwned + Send + Sync + 'static;
    /// Lookup result
    type Record: Serialize + Send + 'static;

    fn type_name(&self) -> &'static str;

    /// Run the lookup; returns the identity and the populated record
    async fn read(&self, query: &Self::Query) -> Result<(String, Self::Record)>;
}

/// Lifecycle operation requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Identity and state after an operation; both `None` once the entity is gone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: Option<String>,
    pub state: Option<Value>,
}

/// JSON-facing view of a [`Resource`]
#[async_trait]
pub trait DynResource: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Run `operation` with JSON prior and planned records
    async fn apply(
        &self,
        operation: Operation,
        id: Option<String>,
        prior: Option<Value>,
        planned: Option<Value>,
    ) -> Result<Outcome>;
}

#[async_trait]
impl<T> DynResource for T
where
    T: Resource,
{
    fn type_name(&self) -> &'static str {
        Resource::type_name(self)
    }

    async fn apply(
        &self,
        operation: Operation,
        id: Option<String>,
        prior: Option<Value>,
        planned: Option<Value>,
    ) -> Result<Outcome> {
        let name = Resource::type_name(self);
        let prior: Option<T::Record> = prior.map(serde_json::from_value).transpose()?;
        let planned: Option<T::Record> = planned.map(serde_json::from_value).transpose()?;

        let mut data = match (operation, planned, prior) {
            (Operation::Create, Some(planned), _) => ResourceData::new(planned),
            (Operation::Update, Some(planned), Some(prior)) => {
                ResourceData::new(planned).with_prior(prior)
            }
            (Operation::Read | Operation::Delete, _, Some(prior)) => {
                ResourceData::new(prior.clone()).with_prior(prior)
            }
            (Operation::Read | Operation::Delete, Some(planned), None) => {
                ResourceData::new(planned)
            }
            (operation, _, _) => {
                return Err(Error::validation(format!(
                    "{name} {operation}: missing prior or planned record"
                )));
            }
        };
        data = data.with_timeouts(self.timeouts());

        if operation != Operation::Create {
            let id = id.ok_or_else(|| {
                Error::validation(format!("{name} {operation}: an ID is required"))
            })?;
            data.set_id(id);
        }

        match operation {
            Operation::Create => self.create(&mut data).await?,
            Operation::Read => self.read(&mut data).await?,
            Operation::Update => self.update(&mut data).await?,
            Operation::Delete => {
                self.delete(&mut data).await?;
                data.clear_id();
            }
        }

        let (id, record) = data.into_parts();
        match id {
            Some(id) => Ok(Outcome {
                id: Some(id),
                state: Some(serde_json::to_value(record)?),
            }),
            None => Ok(Outcome::default()),
        }
    }
}

/// JSON-facing view of a [`DataSource`]
#[async_trait]
pub trait DynDataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    async fn read(&self, query: Value) -> Result<Outcome>;
}

#[async_trait]
impl<T> DynDataSource for T
where
    T: DataSource,
{
    fn type_name(&self) -> &'static str {
        DataSource::type_name(self)
    }

    async fn read(&self, query: Value) -> Result<Outcome> {
        let query: T::Query = serde_json::from_value(query)?;
        let (id, record) = DataSource::read(self, &query).await?;
        Ok(Outcome {
            id: Some(id),
            state: Some(serde_json::to_value(record)?),
        })
    }
}
