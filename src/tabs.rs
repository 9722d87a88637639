//! Workspace tab registry
//!
//! Sole owner of the tab list and the active-tab pointer. Every mutation is
//! mirrored to the durable store before the call returns.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::constants::tabs::{DEFAULT_NAME_PREFIX, FIRST_TAB_ID, SNAPSHOT_FORMAT_VERSION};
use crate::persistence::WorkspaceStore;
use crate::types::{Configuration, LayoutResult, SessionId, TabId};

/// One independent design workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: Configuration,
    /// Last layout received for `config`; absent until computed
    #[serde(default)]
    pub layout: Option<LayoutResult>,
    /// Remote session this tab was last saved to or loaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<SessionId>,
    /// Stamp of the last configuration change (session-only)
    #[serde(skip)]
    pub(crate) revision: u64,
}

impl Tab {
    pub fn new(id: TabId) -> Self {
        Self {
            id,
            name: default_name(id),
            config: Configuration::default(),
            layout: None,
            server_id: None,
            revision: 0,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_saved(&self) -> bool {
        self.server_id.is_some()
    }
}

pub fn default_name(id: TabId) -> String {
    format!("{} {}", DEFAULT_NAME_PREFIX, id)
}

/// Name given to a tab once it is tied to a remote session
pub fn saved_name(id: &SessionId) -> String {
    format!("Saved ({})", id)
}

/// Serialized form of the whole workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub active_tab_id: TabId,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

fn default_format_version() -> u32 {
    SNAPSHOT_FORMAT_VERSION
}

impl WorkspaceSnapshot {
    pub fn new(tabs: Vec<Tab>, active_tab_id: TabId) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            active_tab_id,
            tabs,
        }
    }
}

/// A configuration that changed and now needs a fresh layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigChange {
    pub tab_id: TabId,
    pub revision: u64,
    pub config: Configuration,
}

/// What happened to a layout result offered to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutApply {
    Applied,
    /// Originating tab was closed
    UnknownTab,
    /// Tab configuration changed after the request was issued
    Stale { current_revision: u64 },
}

pub struct TabRegistry {
    tabs: Vec<Tab>,
    active_id: TabId,
    next_id: TabId,
    revision_counter: u64,
    store: Box<dyn WorkspaceStore>,
}

impl TabRegistry {
    /// Build from the store's last snapshot, or a single fresh tab
    pub fn restore(store: Box<dyn WorkspaceStore>) -> Self {
        let (tabs, active_id) = match store.read_all() {
            Some(snapshot) => normalize(snapshot),
            None => (vec![Tab::new(FIRST_TAB_ID)], FIRST_TAB_ID),
        };
        // normalize keeps every id below TabId::MAX
        let next_id = tabs
            .iter()
            .map(|t| t.id)
            .max()
            .map_or(FIRST_TAB_ID, |id| id.saturating_add(1));
        info!(tabs = tabs.len(), active = active_id, "Workspace restored");

        Self {
            tabs,
            active_id,
            next_id,
            revision_counter: 0,
            store,
        }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Active id, falling back to the first tab if the pointer went stale
    pub fn active_id(&self) -> TabId {
        if self.contains(self.active_id) {
            self.active_id
        } else {
            self.tabs[0].id
        }
    }

    pub fn active(&self) -> &Tab {
        let id = self.active_id();
        self.tabs.iter().find(|t| t.id == id).unwrap_or(&self.tabs[0])
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.get(id).is_some()
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot::new(self.tabs.clone(), self.active_id())
    }

    /// Create an empty tab and make it active
    ///
    /// Returns None once the id space is used up; ids are never recycled.
    pub fn add_tab(&mut self) -> Option<TabId> {
        let id = self.next_id;
        let Some(after) = id.checked_add(1) else {
            warn!(next = id, "No tab ids left, not adding a tab");
            return None;
        };
        self.next_id = after;
        self.tabs.push(Tab::new(id));
        self.active_id = id;
        info!(tab = id, "Tab added");
        self.persist();
        Some(id)
    }

    /// Remove a tab; the last remaining tab is never removed
    pub fn close_tab(&mut self, id: TabId) -> bool {
        if self.tabs.len() <= 1 {
            debug!(tab = id, "Ignoring close of the last tab");
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            debug!(tab = id, "Ignoring close of unknown tab");
            return false;
        };

        self.tabs.remove(idx);
        if self.active_id == id {
            self.active_id = self.tabs[0].id;
        }
        info!(tab = id, active = self.active_id, "Tab closed");
        self.persist();
        true
    }

    /// Set a tab's display name; blank names are ignored
    pub fn rename_tab(&mut self, id: TabId, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            debug!(tab = id, "Ignoring blank tab name");
            return false;
        }
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.tabs[idx].name = name.to_string();
        info!(tab = id, name = %name, "Tab renamed");
        self.persist();
        true
    }

    pub fn switch_active(&mut self, id: TabId) -> bool {
        if !self.contains(id) {
            debug!(tab = id, "Ignoring switch to unknown tab");
            return false;
        }
        self.active_id = id;
        self.persist();
        true
    }

    /// Transform the active tab's configuration
    ///
    /// Returns the change when the configuration actually moved; an unchanged
    /// result (rejected edit) leaves the registry and the mirror untouched.
    pub fn set_active_config<F>(&mut self, mutator: F) -> Option<ConfigChange>
    where
        F: FnOnce(&Configuration) -> Configuration,
    {
        let id = self.active_id();
        let idx = self.index_of(id)?;
        let next = mutator(&self.tabs[idx].config);
        if next == self.tabs[idx].config {
            return None;
        }
        Some(self.commit_config(idx, next))
    }

    /// Replace a tab's configuration wholesale and tie it to a session
    pub fn load_config(&mut self, id: TabId, config: Configuration, server_id: SessionId) -> Option<ConfigChange> {
        let idx = self.index_of(id)?;
        self.tabs[idx].name = saved_name(&server_id);
        self.tabs[idx].server_id = Some(server_id);
        Some(self.commit_config(idx, config))
    }

    /// Record the session a tab was saved under
    pub fn assign_session(&mut self, id: TabId, server_id: SessionId) -> bool {
        let Some(idx) = self.index_of(id) else {
            warn!(tab = id, session = %server_id, "Saved tab no longer exists");
            return false;
        };
        self.tabs[idx].name = saved_name(&server_id);
        self.tabs[idx].server_id = Some(server_id);
        self.persist();
        true
    }

    /// Store a layout computed for `revision` of tab `id`
    ///
    /// Only lands if the tab still exists and its configuration has not
    /// changed since the request was issued.
    pub fn apply_layout(&mut self, id: TabId, revision: u64, layout: Option<LayoutResult>) -> LayoutApply {
        let Some(idx) = self.index_of(id) else {
            return LayoutApply::UnknownTab;
        };
        let current_revision = self.tabs[idx].revision;
        if current_revision != revision {
            return LayoutApply::Stale { current_revision };
        }
        self.tabs[idx].layout = layout;
        self.persist();
        LayoutApply::Applied
    }

    fn commit_config(&mut self, idx: usize, config: Configuration) -> ConfigChange {
        self.revision_counter += 1;
        let tab = &mut self.tabs[idx];
        tab.config = config;
        tab.revision = self.revision_counter;
        let change = ConfigChange {
            tab_id: tab.id,
            revision: tab.revision,
            config,
        };
        self.persist();
        change
    }

    fn index_of(&self, id: TabId) -> Option<usize> {
        self.tabs.iter().position(|t| t.id == id)
    }

    fn persist(&self) {
        self.store.write_all(&self.snapshot());
    }
}

/// Repair a snapshot into a valid tab list + active id
fn normalize(snapshot: WorkspaceSnapshot) -> (Vec<Tab>, TabId) {
    if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
        warn!(
            version = snapshot.format_version,
            supported = SNAPSHOT_FORMAT_VERSION,
            "Workspace mirror written by a newer version, reading best-effort"
        );
    }

    let mut seen = HashSet::new();
    let mut tabs: Vec<Tab> = snapshot
        .tabs
        .into_iter()
        .filter(|t| {
            if t.id == 0 || t.id == TabId::MAX {
                warn!(tab = t.id, "Dropping tab with unusable id from workspace mirror");
                return false;
            }
            seen.insert(t.id)
        })
        .map(|mut t| {
            if t.name.trim().is_empty() {
                t.name = default_name(t.id);
            }
            t.revision = 0;
            t
        })
        .collect();

    if tabs.is_empty() {
        warn!("Workspace mirror had no usable tabs, starting fresh");
        tabs.push(Tab::new(FIRST_TAB_ID));
    }

    let active_id = if tabs.iter().any(|t| t.id == snapshot.active_tab_id) {
        snapshot.active_tab_id
    } else {
        tabs[0].id
    };
    (tabs, active_id)
}
