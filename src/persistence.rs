//! Durable mirror of the whole workspace
//!
//! Read once at startup, rewritten after every registry mutation. Failures are
//! logged and swallowed here; the core never sees a persistence error.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

use crate::tabs::WorkspaceSnapshot;

/// Key/value persistence of the serialized workspace
pub trait WorkspaceStore: Send {
    /// Last written snapshot, or None when nothing usable is stored
    fn read_all(&self) -> Option<WorkspaceSnapshot>;

    /// Replace the stored snapshot
    fn write_all(&self, snapshot: &WorkspaceSnapshot);
}

/// JSON file store with atomic replace
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/site-planner/workspace.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::WORKSPACE_FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_read(&self) -> Result<Option<WorkspaceSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read workspace from {:?}", self.path))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse workspace JSON from {:?}", self.path))?;
        Ok(Some(snapshot))
    }

    fn try_write(&self, snapshot: &WorkspaceSnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot).context("Failed to serialize workspace")?;
        write_atomic(&self.path, &json)
    }
}

impl WorkspaceStore for JsonFileStore {
    fn read_all(&self) -> Option<WorkspaceSnapshot> {
        match self.try_read() {
            Ok(Some(snapshot)) => {
                debug!(path = %self.path.display(), tabs = snapshot.tabs.len(), "Loaded workspace mirror");
                Some(snapshot)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = ?e, "Ignoring unreadable workspace mirror");
                None
            }
        }
    }

    fn write_all(&self, snapshot: &WorkspaceSnapshot) {
        if let Err(e) = self.try_write(snapshot) {
            error!(path = %self.path.display(), error = ?e, "Failed to write workspace mirror");
        }
    }
}

/// Write via a temp file in the same directory, then rename over the target
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {:?}", dir))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("workspace");
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, std::process::id()));

    let result = (|| -> Result<()> {
        let mut tmp = fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create temp file {:?}", tmp_path))?;
        tmp.write_all(data)
            .with_context(|| format!("Failed to write temp file {:?}", tmp_path))?;
        tmp.sync_all().context("Failed to flush temp file")?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move {:?} over {:?}", tmp_path, path))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Process-local store; nothing survives exit
///
/// Clones share the same slot so callers can inspect what was written.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<WorkspaceSnapshot>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: WorkspaceSnapshot) -> Self {
        let store = Self::default();
        if let Ok(mut slot) = store.slot.lock() {
            *slot = Some(snapshot);
        }
        store
    }

    /// Number of `write_all` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|n| *n).unwrap_or(0)
    }
}

impl WorkspaceStore for MemoryStore {
    fn read_all(&self) -> Option<WorkspaceSnapshot> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn write_all(&self, snapshot: &WorkspaceSnapshot) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(snapshot.clone());
        }
        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
    }
}
