//! Test doubles and common utilities for core contract tests
//!
//! This module provides minimal test doubles that verify the poll loop,
//! lock and registry contracts without any vendor client.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudplane_core::error::{Error, Result};
use cloudplane_core::poll::{Refresh, Refreshed};
use cloudplane_core::resource::{Resource, ResourceData};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A refresh that plays back a scripted list of states
///
/// The last state repeats once the script is exhausted. A `None` entry
/// answers with "not found".
pub struct ScriptedRemote {
    script: Vec<Option<&'static str>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedRemote {
    pub fn new(script: Vec<Option<&'static str>>) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of refreshes performed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Refresh for ScriptedRemote {
    type Snapshot = usize;

    async fn refresh(&self) -> Result<Refreshed<usize>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script[n.min(self.script.len() - 1)] {
            Some(state) => Ok(Refreshed::new(n + 1, state)),
            None => Err(Error::not_found("scripted entity")),
        }
    }
}

/// Record used by [`InMemoryResource`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub parent: String,
    pub text: String,
    #[serde(default)]
    pub note_id: Option<String>,
}

impl NoteRecord {
    pub fn new(parent: &str, text: &str) -> Self {
        Self {
            parent: parent.to_string(),
            text: text.to_string(),
            note_id: None,
        }
    }
}

/// A resource backed by a HashMap that counts every remote call
#[derive(Clone, Default)]
pub struct InMemoryResource {
    notes: Arc<Mutex<HashMap<String, String>>>,
    next_id: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remote calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of entities that exist remotely
    pub fn remote_len(&self) -> usize {
        self.notes.lock().unwrap().len()
    }

    fn call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Resource for InMemoryResource {
    type Record = NoteRecord;

    fn type_name(&self) -> &'static str {
        "test_note"
    }

    async fn create(&self, data: &mut ResourceData<NoteRecord>) -> Result<()> {
        if data.get().text.is_empty() {
            return Err(Error::validation("text is required"));
        }
        self.call();
        let id = format!("note-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.notes
            .lock()
            .unwrap()
            .insert(id.clone(), data.get().text.clone());
        data.set_id(format!("{}/{}", data.get().parent, id));
        self.read(data).await
    }

    async fn read(&self, data: &mut ResourceData<NoteRecord>) -> Result<()> {
        let [parent, note_id] = cloudplane_core::CompositeId::split::<2>(data.require_id()?)?;
        self.call();
        let text = self.notes.lock().unwrap().get(&note_id).cloned();
        match text {
            Some(text) => {
                let record = data.get_mut();
                record.parent = parent;
                record.text = text;
                record.note_id = Some(note_id);
            }
            None => data.clear_id(),
        }
        Ok(())
    }

    async fn update(&self, data: &mut ResourceData<NoteRecord>) -> Result<()> {
        if !data.has_change(|r| &r.text) {
            return Ok(());
        }
        let [_, note_id] = cloudplane_core::CompositeId::split::<2>(data.require_id()?)?;
        self.call();
        self.notes
            .lock()
            .unwrap()
            .insert(note_id, data.get().text.clone());
        self.read(data).await
    }

    async fn delete(&self, data: &mut ResourceData<NoteRecord>) -> Result<()> {
        let [_, note_id] = cloudplane_core::CompositeId::split::<2>(data.require_id()?)?;
        self.call();
        self.notes.lock().unwrap().remove(&note_id);
        Ok(())
    }
}
