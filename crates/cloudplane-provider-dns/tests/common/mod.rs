//! In-memory DNS Services used by the DNS contract tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use cloudplane_core::{Error, Result};
use cloudplane_provider_dns::api::{
    Monitor, MonitorApi, MonitorBody, PermittedNetwork, PermittedNetworkApi, PermittedNetworkCreate,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counting DNS service that also records how many calls overlap
#[derive(Clone, Default)]
pub struct FakeDns {
    networks: Arc<Mutex<HashMap<String, PermittedNetwork>>>,
    monitors: Arc<Mutex<HashMap<String, Monitor>>>,
    next_id: Arc<AtomicUsize>,

    pub calls: Arc<AtomicUsize>,
    pub updates: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,

    /// How long each permitted-network call takes
    pub latency: Duration,
}

impl FakeDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn monitor(&self, id: &str) -> Option<Monitor> {
        self.monitors.lock().unwrap().get(id).cloned()
    }

    pub fn network_count(&self) -> usize {
        self.networks.lock().unwrap().len()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Track overlap of permitted-network calls around a simulated delay
    async fn slow_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermittedNetworkApi for FakeDns {
    async fn create(
        &self,
        _instance_id: &str,
        _zone_id: &str,
        body: &PermittedNetworkCreate,
    ) -> Result<PermittedNetwork> {
        self.slow_call().await;

        let network = PermittedNetwork {
            id: self.next("pn"),
            network_type: body.network_type.clone(),
            permitted_network: body.permitted_network.clone(),
            state: Some("ACTIVE".to_string()),
            created_on: Some(Utc::now()),
            modified_on: Some(Utc::now()),
        };
        self.networks
            .lock()
            .unwrap()
            .insert(network.id.clone(), network.clone());
        Ok(network)
    }

    async fn get(&self, _instance_id: &str, _zone_id: &str, id: &str) -> Result<PermittedNetwork> {
        self.slow_call().await;
        self.networks
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("permitted network {id}")))
    }

    async fn delete(&self, _instance_id: &str, _zone_id: &str, id: &str) -> Result<()> {
        self.slow_call().await;
        self.networks
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("permitted network {id}")))
    }
}

/// Merge an update into a stored monitor; fields missing from the update keep
/// their stored value
fn merge(stored: &mut MonitorBody, update: &MonitorBody) {
    fn keep<T: Clone>(stored: &mut Option<T>, update: &Option<T>) {
        if let Some(value) = update {
            *stored = Some(value.clone());
        }
    }

    stored.name = update.name.clone();
    keep(&mut stored.description, &update.description);
    keep(&mut stored.monitor_type, &update.monitor_type);
    keep(&mut stored.port, &update.port);
    keep(&mut stored.interval, &update.interval);
    keep(&mut stored.retries, &update.retries);
    keep(&mut stored.timeout, &update.timeout);
    keep(&mut stored.method, &update.method);
    keep(&mut stored.path, &update.path);
    keep(&mut stored.allow_insecure, &update.allow_insecure);
    keep(&mut stored.expected_codes, &update.expected_codes);
    keep(&mut stored.expected_body, &update.expected_body);
    if !update.headers.is_empty() {
        stored.headers = update.headers.clone();
    }
}

#[async_trait]
impl MonitorApi for FakeDns {
    async fn create(&self, _instance_id: &str, body: &MonitorBody) -> Result<Monitor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let monitor = Monitor {
            id: self.next("mon"),
            body: MonitorBody {
                // the service assigns a port when none is given
                port: body.port.or(Some(80)),
                ..body.clone()
            },
            created_on: Some(Utc::now()),
            modified_on: Some(Utc::now()),
        };
        self.monitors
            .lock()
            .unwrap()
            .insert(monitor.id.clone(), monitor.clone());
        Ok(monitor)
    }

    async fn get(&self, _instance_id: &str, monitor_id: &str) -> Result<Monitor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.monitor(monitor_id)
            .ok_or_else(|| Error::not_found(format!("monitor {monitor_id}")))
    }

    async fn update(&self, _instance_id: &str, monitor_id: &str, body: &MonitorBody) -> Result<Monitor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.updates.fetch_add(1, Ordering::SeqCst);

        let mut monitors = self.monitors.lock().unwrap();
        let monitor = monitors
            .get_mut(monitor_id)
            .ok_or_else(|| Error::not_found(format!("monitor {monitor_id}")))?;
        merge(&mut monitor.body, body);
        monitor.modified_on = Some(Utc::now());
        Ok(monitor.clone())
    }

    async fn delete(&self, _instance_id: &str, monitor_id: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.monitors
            .lock()
            .unwrap()
            .remove(monitor_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("monitor {monitor_id}")))
    }
}
