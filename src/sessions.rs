//! Saving, loading and listing designs in the remote session store
//!
//! A tab is either unsaved (no server id) or saved. Saving an unsaved tab
//! always creates. Saving a saved tab is ambiguous and stops at
//! [`SaveOutcome::NeedsResolution`] until the caller picks overwrite or
//! save-as-new. The session list is a remote-owned cache and is only ever
//! replaced wholesale.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::remote::SessionStore;
use crate::tabs::{ConfigChange, TabRegistry};
use crate::types::{SessionId, SessionSummary};

/// Caller's answer to an ambiguous save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResolution {
    /// Replace the record the tab is tied to
    Overwrite,
    /// Mint a fresh record and re-point the tab at it
    SaveAsNew,
}

/// What a plain save would do for the active tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveGate {
    Create,
    Ambiguous { current: SessionId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(SessionId),
    NeedsResolution { current: SessionId },
    Failed,
}

impl SaveOutcome {
    pub fn saved_id(&self) -> Option<&SessionId> {
        match self {
            SaveOutcome::Saved(id) => Some(id),
            _ => None,
        }
    }
}

pub struct SessionCoordinator {
    store: Arc<dyn SessionStore>,
    sessions: Vec<SessionSummary>,
    last_failure: Option<String>,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            sessions: Vec::new(),
            last_failure: None,
        }
    }

    pub fn sessions(&self) -> &[SessionSummary] {
        &self.sessions
    }

    /// Failure message from the most recent operation, cleared on read
    pub fn take_failure(&mut self) -> Option<String> {
        self.last_failure.take()
    }

    pub fn gate(tabs: &TabRegistry) -> SaveGate {
        match &tabs.active().server_id {
            Some(current) => SaveGate::Ambiguous {
                current: current.clone(),
            },
            None => SaveGate::Create,
        }
    }

    /// Plain save of the active tab; never guesses for a saved tab
    pub async fn save(&mut self, tabs: &mut TabRegistry) -> SaveOutcome {
        match Self::gate(tabs) {
            SaveGate::Create => self.perform_save(tabs, None).await,
            SaveGate::Ambiguous { current } => {
                debug!(tab = tabs.active_id(), session = %current, "Save needs overwrite/new decision");
                SaveOutcome::NeedsResolution { current }
            }
        }
    }

    /// Save the active tab with an explicit decision
    ///
    /// Overwrite on an unsaved tab has nothing to overwrite and creates.
    pub async fn save_resolved(&mut self, tabs: &mut TabRegistry, resolution: SaveResolution) -> SaveOutcome {
        let target = match resolution {
            SaveResolution::Overwrite => tabs.active().server_id.clone(),
            SaveResolution::SaveAsNew => None,
        };
        self.perform_save(tabs, target).await
    }

    async fn perform_save(&mut self, tabs: &mut TabRegistry, target: Option<SessionId>) -> SaveOutcome {
        let tab_id = tabs.active_id();
        let config = tabs.active().config;

        let saved_id = match self.store.save_session(target.as_ref(), &config).await {
            Ok(id) => id,
            Err(e) => {
                warn!(tab = tab_id, session = ?target, error = ?e, "Save failed");
                self.last_failure = Some(format!("Save failed: {e:#}"));
                return SaveOutcome::Failed;
            }
        };

        if let Some(sent) = &target {
            if *sent != saved_id {
                info!(sent = %sent, minted = %saved_id, "Store created a new record for overwrite");
            }
        }
        info!(tab = tab_id, session = %saved_id, units = config.total_units(), "Design saved");
        tabs.assign_session(tab_id, saved_id.clone());
        self.refresh().await;
        SaveOutcome::Saved(saved_id)
    }

    /// Replace the active tab's configuration with a stored one
    pub async fn load(&mut self, tabs: &mut TabRegistry, id: &SessionId) -> Option<ConfigChange> {
        let tab_id = tabs.active_id();
        match self.store.load_session(id).await {
            Ok(config) => {
                info!(tab = tab_id, session = %id, "Design loaded");
                tabs.load_config(tab_id, config, id.clone())
            }
            Err(e) => {
                warn!(tab = tab_id, session = %id, error = ?e, "Load failed");
                self.last_failure = Some(format!("Load failed: {e:#}"));
                None
            }
        }
    }

    /// Remove a stored record; tabs pointing at it keep their server id
    pub async fn delete(&mut self, id: &SessionId) -> bool {
        match self.store.delete_session(id).await {
            Ok(()) => {
                info!(session = %id, "Session deleted");
                self.refresh().await;
                true
            }
            Err(e) => {
                warn!(session = %id, error = ?e, "Delete failed");
                self.last_failure = Some(format!("Delete failed: {e:#}"));
                false
            }
        }
    }

    /// Replace the cached list with the store's current listing
    pub async fn refresh(&mut self) -> bool {
        match self.store.list_sessions().await {
            Ok(sessions) => {
                debug!(count = sessions.len(), "Session list refreshed");
                self.sessions = sessions;
                true
            }
            Err(e) => {
                warn!(error = ?e, "Failed to refresh session list");
                self.last_failure = Some(format!("Could not list saved designs: {e:#}"));
                false
            }
        }
    }
}
