//! Single owner of the workspace state handed to the front end
//!
//! Wires edits through the validator into the registry, schedules layout
//! recomputation for every configuration that moved, and routes session
//! operations through the coordinator. Every failure ends up in
//! [`Workbench::last_failure`]; nothing here returns an error to the caller.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::layout_sync::{LayoutSync, LayoutUpdate};
use crate::persistence::WorkspaceStore;
use crate::remote::{LayoutService, SessionStore};
use crate::sessions::{SaveGate, SaveOutcome, SaveResolution, SessionCoordinator};
use crate::tabs::{ConfigChange, Tab, TabRegistry};
use crate::types::{Configuration, DeviceType, LayoutResult, SessionId, SessionSummary, TabId};
use crate::validator::{validate_edit, Edit, Validation};

/// What an edit did to the active tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Configuration moved; a layout recompute is scheduled
    Changed,
    /// Accepted, but the configuration already had these counts
    Unchanged,
    /// Transformer count below the battery minimum
    BelowMinimum { required: u64 },
    /// Count larger than the supported maximum
    OutOfRange { max: u32 },
}

impl EditOutcome {
    pub fn is_changed(self) -> bool {
        self == EditOutcome::Changed
    }
}

pub struct Workbench {
    tabs: TabRegistry,
    layout: LayoutSync,
    sessions: SessionCoordinator,
    last_failure: Option<String>,
}

impl Workbench {
    /// Restore the workspace from `store` and attach the remote collaborators
    pub fn new(
        store: Box<dyn WorkspaceStore>,
        layout_service: Arc<dyn LayoutService>,
        session_store: Arc<dyn SessionStore>,
        debounce: Duration,
    ) -> Self {
        Self {
            tabs: TabRegistry::restore(store),
            layout: LayoutSync::new(layout_service, debounce),
            sessions: SessionCoordinator::new(session_store),
            last_failure: None,
        }
    }

    /// Startup work that needs the network: the initial session listing
    ///
    /// A failure is recorded like any other; the caller decides whether it matters.
    pub async fn bootstrap(&mut self) -> bool {
        self.refresh_sessions().await
    }

    // Queries

    pub fn tabs(&self) -> &[Tab] {
        self.tabs.tabs()
    }

    pub fn active_tab_id(&self) -> TabId {
        self.tabs.active_id()
    }

    pub fn active_tab(&self) -> &Tab {
        self.tabs.active()
    }

    pub fn active_config(&self) -> &Configuration {
        &self.tabs.active().config
    }

    pub fn active_layout(&self) -> Option<&LayoutResult> {
        self.tabs.active().layout.as_ref()
    }

    pub fn sessions(&self) -> &[SessionSummary] {
        self.sessions.sessions()
    }

    /// Most recent failure for the status indicator
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn clear_failure(&mut self) {
        self.last_failure = None;
    }

    /// What a plain save of the active tab would do
    pub fn save_gate(&self) -> SaveGate {
        SessionCoordinator::gate(&self.tabs)
    }

    // Tab lifecycle

    pub fn add_tab(&mut self) -> Option<TabId> {
        self.tabs.add_tab()
    }

    /// Close a tab and disarm its pending layout timer
    pub fn close_tab(&mut self, id: TabId) -> bool {
        if !self.tabs.close_tab(id) {
            return false;
        }
        self.layout.cancel(id);
        true
    }

    pub fn rename_tab(&mut self, id: TabId, name: &str) -> bool {
        self.tabs.rename_tab(id, name)
    }

    pub fn switch_tab(&mut self, id: TabId) -> bool {
        self.tabs.switch_active(id)
    }

    // Configuration edits

    /// Set an absolute count on the active tab
    pub fn set_device_count(&mut self, device: DeviceType, count: i64) -> EditOutcome {
        self.edit(device, Edit::Set(count))
    }

    /// Add a signed delta to a count on the active tab
    pub fn adjust_device_count(&mut self, device: DeviceType, delta: i64) -> EditOutcome {
        self.edit(device, Edit::Adjust(delta))
    }

    fn edit(&mut self, device: DeviceType, edit: Edit) -> EditOutcome {
        let next = match validate_edit(self.active_config(), device, edit) {
            Validation::Accepted(next) => next,
            Validation::Rejected { required, .. } => return EditOutcome::BelowMinimum { required },
            Validation::OutOfRange { max, .. } => return EditOutcome::OutOfRange { max },
        };
        match self.tabs.set_active_config(|_| next) {
            Some(change) => {
                debug!(tab = change.tab_id, device = %device, edit = ?edit, "Configuration edited");
                self.layout.schedule(change);
                EditOutcome::Changed
            }
            None => EditOutcome::Unchanged,
        }
    }

    /// Recompute the active tab's layout from its current configuration
    pub fn refresh_layout(&mut self) {
        let tab = self.tabs.active();
        self.layout.schedule(ConfigChange {
            tab_id: tab.id,
            revision: tab.revision(),
            config: tab.config,
        });
    }

    // Layout events

    /// Apply every layout event that is already available
    pub fn pump_layout_events(&mut self) -> Vec<LayoutUpdate> {
        let mut updates = Vec::new();
        while let Some(event) = self.layout.try_next() {
            let update = LayoutSync::reconcile(&mut self.tabs, event);
            updates.push(self.absorb(update));
        }
        updates
    }

    /// Wait for the next layout event; None once nothing is outstanding
    pub async fn next_layout_update(&mut self) -> Option<LayoutUpdate> {
        let event = self.layout.next().await?;
        let update = LayoutSync::reconcile(&mut self.tabs, event);
        Some(self.absorb(update))
    }

    /// Run every armed timer and in-flight request to completion
    pub async fn wait_for_layouts(&mut self) -> Vec<LayoutUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_layout_update().await {
            updates.push(update);
        }
        updates
    }

    fn absorb(&mut self, update: LayoutUpdate) -> LayoutUpdate {
        if let LayoutUpdate::Failed { message, .. } = &update {
            self.last_failure = Some(format!("Layout calculation failed: {}", message));
        }
        update
    }

    // Sessions

    pub async fn save(&mut self) -> SaveOutcome {
        let outcome = self.sessions.save(&mut self.tabs).await;
        self.collect_session_failure();
        outcome
    }

    pub async fn save_resolved(&mut self, resolution: SaveResolution) -> SaveOutcome {
        let outcome = self.sessions.save_resolved(&mut self.tabs, resolution).await;
        self.collect_session_failure();
        outcome
    }

    /// Load a stored design into the active tab and recompute its layout
    pub async fn load_session(&mut self, id: &SessionId) -> bool {
        let change = self.sessions.load(&mut self.tabs, id).await;
        self.collect_session_failure();
        match change {
            Some(change) => {
                self.layout.schedule(change);
                true
            }
            None => false,
        }
    }

    pub async fn delete_session(&mut self, id: &SessionId) -> bool {
        let deleted = self.sessions.delete(id).await;
        self.collect_session_failure();
        deleted
    }

    pub async fn refresh_sessions(&mut self) -> bool {
        let refreshed = self.sessions.refresh().await;
        self.collect_session_failure();
        refreshed
    }

    fn collect_session_failure(&mut self) {
        if let Some(message) = self.sessions.take_failure() {
            info!(status = %message, "Recorded failure for status indicator");
            self.last_failure = Some(message);
        }
    }
}
