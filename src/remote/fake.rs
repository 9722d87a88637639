//! In-process collaborators for coordinator tests

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::oneshot;

use super::{LayoutService, SessionStore};
use crate::types::{Configuration, LayoutResult, SessionId, SessionSummary};

/// Layout whose width encodes the unit count, so tests can tell results apart
pub fn layout_for(config: &Configuration) -> LayoutResult {
    LayoutResult {
        placed_devices: Vec::new(),
        total_width: u32::try_from(config.total_units()).unwrap_or(u32::MAX),
        total_height: 10,
        total_cost: 0,
        total_energy: 0.0,
        transformers: config.transformer,
    }
}

/// Answers immediately; can be switched into failure mode
#[derive(Default)]
pub struct InstantLayout {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl LayoutService for InstantLayout {
    async fn compute_layout(&self, config: &Configuration) -> Result<LayoutResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("layout backend unavailable"));
        }
        Ok(layout_for(config))
    }
}

/// Panics inside the request, as a buggy backend client might
pub struct PanickingLayout;

#[async_trait]
impl LayoutService for PanickingLayout {
    async fn compute_layout(&self, _config: &Configuration) -> Result<LayoutResult> {
        panic!("layout client bug");
    }
}

/// Holds every request open until the test releases it
#[derive(Default)]
pub struct GatedLayout {
    pending: Mutex<Vec<(Configuration, oneshot::Sender<Result<LayoutResult>>)>>,
}

impl GatedLayout {
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Answer the oldest open request whose configuration equals `config`
    pub fn release(&self, config: &Configuration, result: Result<LayoutResult>) {
        let mut pending = self.pending.lock().unwrap();
        let idx = pending
            .iter()
            .position(|(c, _)| c == config)
            .expect("no pending request for configuration");
        let (_, tx) = pending.remove(idx);
        let _ = tx.send(result);
    }
}

#[async_trait]
impl LayoutService for GatedLayout {
    async fn compute_layout(&self, config: &Configuration) -> Result<LayoutResult> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push((*config, tx));
        rx.await.map_err(|_| anyhow!("request abandoned"))?
    }
}

/// Session store behaving like the backend's JSON file store
#[derive(Default)]
pub struct MemorySessions {
    records: Mutex<BTreeMap<String, (Configuration, i64)>>,
    next: AtomicUsize,
    clock: AtomicUsize,
    pub fail: AtomicBool,
    /// Refuse overwrites of ids the store does not know
    pub reject_unknown_overwrite: AtomicBool,
    pub saved_ids: Mutex<Vec<Option<SessionId>>>,
}

impl MemorySessions {
    pub fn contains(&self, id: &SessionId) -> bool {
        self.records.lock().unwrap().contains_key(id.as_str())
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessions {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.check()?;
        let records = self.records.lock().unwrap();
        let mut list: Vec<SessionSummary> = records
            .iter()
            .map(|(id, (config, stamp))| SessionSummary {
                id: SessionId::new(id.clone()),
                date: format!("t{}", stamp),
                summary: format!("{} Devices", config.total_units()),
                unix_time: *stamp,
                config: Some(*config),
            })
            .collect();
        list.sort_by(|a, b| b.unix_time.cmp(&a.unix_time));
        Ok(list)
    }

    async fn save_session(&self, id: Option<&SessionId>, config: &Configuration) -> Result<SessionId> {
        self.check()?;
        self.saved_ids.lock().unwrap().push(id.cloned());
        let mut records = self.records.lock().unwrap();
        let key = match id {
            Some(id) if records.contains_key(id.as_str()) => id.as_str().to_string(),
            Some(id) if self.reject_unknown_overwrite.load(Ordering::SeqCst) => {
                return Err(anyhow!("session {} not found", id));
            }
            Some(id) => id.as_str().to_string(),
            None => format!("SAVE-{:08x}", self.next.fetch_add(1, Ordering::SeqCst) + 1),
        };
        let stamp = self.clock.fetch_add(1, Ordering::SeqCst) as i64;
        records.insert(key.clone(), (*config, stamp));
        Ok(SessionId::new(key))
    }

    async fn load_session(&self, id: &SessionId) -> Result<Configuration> {
        self.check()?;
        self.records
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|(config, _)| *config)
            .ok_or_else(|| anyhow!("Backend request failed with status 404 Not Found: Not found"))
    }

    async fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.check()?;
        self.records.lock().unwrap().remove(id.as_str());
        Ok(())
    }
}
