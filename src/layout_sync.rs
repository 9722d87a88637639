//! Debounced layout recomputation
//!
//! Each configuration change arms a per-tab timer. Re-arming cancels the
//! previous timer, so only the configuration present at the end of a quiet
//! period is sent. Once a timer fires the request runs detached: it cannot be
//! cancelled, but its answer is tagged with the tab id and the edit revision it
//! was computed for, and [`LayoutSync::reconcile`] drops it if either no longer
//! matches the registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::remote::LayoutService;
use crate::tabs::{ConfigChange, LayoutApply, TabRegistry};
use crate::types::{LayoutResult, TabId};

/// Answer for one fired timer
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEvent {
    pub tab_id: TabId,
    pub revision: u64,
    pub outcome: LayoutOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOutcome {
    Computed(LayoutResult),
    /// Configuration had no units; resolved locally
    Cleared,
    Failed(String),
}

/// What reconciliation did with an event
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutUpdate {
    Applied { tab_id: TabId },
    Cleared { tab_id: TabId },
    /// Tab was closed while the request was in flight
    DroppedClosedTab { tab_id: TabId },
    /// Tab was edited again while the request was in flight
    DroppedStale { tab_id: TabId, revision: u64 },
    Failed { tab_id: TabId, message: String },
}

struct ArmedTimer {
    revision: u64,
    /// Set by whichever side gets there first: the firing timer or a cancel
    claimed: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct LayoutSync {
    service: Arc<dyn LayoutService>,
    debounce: Duration,
    timers: HashMap<TabId, ArmedTimer>,
    /// Armed timers plus requests whose event has not been received yet
    outstanding: usize,
    tx: mpsc::UnboundedSender<LayoutEvent>,
    rx: mpsc::UnboundedReceiver<LayoutEvent>,
}

impl LayoutSync {
    pub fn new(service: Arc<dyn LayoutService>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            service,
            debounce,
            timers: HashMap::new(),
            outstanding: 0,
            tx,
            rx,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Timers armed or requests in flight whose event is still to come
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Arm (or re-arm) the timer for the changed tab
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&mut self, change: ConfigChange) {
        self.cancel(change.tab_id);

        let claimed = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(fire_after(
            self.debounce,
            change,
            claimed.clone(),
            self.service.clone(),
            self.tx.clone(),
        ));

        debug!(tab = change.tab_id, revision = change.revision, "Layout timer armed");
        self.timers.insert(
            change.tab_id,
            ArmedTimer {
                revision: change.revision,
                claimed,
                handle,
            },
        );
        self.outstanding += 1;
    }

    /// Disarm a tab's pending timer; a request already sent is left alone
    pub fn cancel(&mut self, tab_id: TabId) -> bool {
        let Some(timer) = self.timers.remove(&tab_id) else {
            return false;
        };
        if timer.claimed.swap(true, Ordering::SeqCst) {
            // Already fired; its event is on the way
            return false;
        }
        timer.handle.abort();
        self.outstanding = self.outstanding.saturating_sub(1);
        debug!(tab = tab_id, revision = timer.revision, "Layout timer cancelled");
        true
    }

    /// Next event if one is ready
    pub fn try_next(&mut self) -> Option<LayoutEvent> {
        let event = self.rx.try_recv().ok()?;
        self.received(&event);
        Some(event)
    }

    /// Wait for the next event; returns None when nothing is outstanding
    pub async fn next(&mut self) -> Option<LayoutEvent> {
        if self.outstanding == 0 {
            return None;
        }
        let event = self.rx.recv().await?;
        self.received(&event);
        Some(event)
    }

    fn received(&mut self, event: &LayoutEvent) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self
            .timers
            .get(&event.tab_id)
            .is_some_and(|t| t.revision == event.revision)
        {
            self.timers.remove(&event.tab_id);
        }
    }

    /// Write an event onto its originating tab, if still appropriate
    pub fn reconcile(tabs: &mut TabRegistry, event: LayoutEvent) -> LayoutUpdate {
        let LayoutEvent {
            tab_id,
            revision,
            outcome,
        } = event;

        let (layout, cleared) = match outcome {
            LayoutOutcome::Failed(message) => {
                return LayoutUpdate::Failed { tab_id, message };
            }
            LayoutOutcome::Computed(layout) => (Some(layout), false),
            LayoutOutcome::Cleared => (None, true),
        };

        match tabs.apply_layout(tab_id, revision, layout) {
            LayoutApply::Applied if cleared => {
                debug!(tab = tab_id, revision, "Layout cleared for empty configuration");
                LayoutUpdate::Cleared { tab_id }
            }
            LayoutApply::Applied => {
                info!(tab = tab_id, revision, "Layout applied");
                LayoutUpdate::Applied { tab_id }
            }
            LayoutApply::UnknownTab => {
                debug!(tab = tab_id, revision, "Dropping layout for closed tab");
                LayoutUpdate::DroppedClosedTab { tab_id }
            }
            LayoutApply::Stale { current_revision } => {
                debug!(tab = tab_id, revision, current_revision, "Dropping stale layout");
                LayoutUpdate::DroppedStale { tab_id, revision }
            }
        }
    }
}

impl Drop for LayoutSync {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            if !timer.claimed.swap(true, Ordering::SeqCst) {
                timer.handle.abort();
            }
        }
    }
}

/// Owed event for a fired timer
///
/// Dropping it unsent (the request task panicked or was torn down) reports a
/// failure, so `outstanding` always comes back down.
struct PendingEvent {
    tab_id: TabId,
    revision: u64,
    tx: Option<mpsc::UnboundedSender<LayoutEvent>>,
}

impl PendingEvent {
    fn send(mut self, outcome: LayoutOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(LayoutEvent {
                tab_id: self.tab_id,
                revision: self.revision,
                outcome,
            });
        }
    }
}

impl Drop for PendingEvent {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!(tab = self.tab_id, revision = self.revision, "Layout request ended without an answer");
            let _ = tx.send(LayoutEvent {
                tab_id: self.tab_id,
                revision: self.revision,
                outcome: LayoutOutcome::Failed("layout request ended without an answer".to_string()),
            });
        }
    }
}

async fn fire_after(
    debounce: Duration,
    change: ConfigChange,
    claimed: Arc<AtomicBool>,
    service: Arc<dyn LayoutService>,
    tx: mpsc::UnboundedSender<LayoutEvent>,
) {
    tokio::time::sleep(debounce).await;
    if claimed.swap(true, Ordering::SeqCst) {
        return;
    }

    let ConfigChange {
        tab_id,
        revision,
        config,
    } = change;
    let pending = PendingEvent {
        tab_id,
        revision,
        tx: Some(tx),
    };

    if config.is_empty() {
        pending.send(LayoutOutcome::Cleared);
        return;
    }

    debug!(tab = tab_id, revision, units = config.total_units(), "Dispatching layout request");
    // Detached: a later edit may re-arm the timer but never aborts this request
    tokio::spawn(async move {
        let outcome = match service.compute_layout(&config).await {
            Ok(layout) => LayoutOutcome::Computed(layout),
            Err(e) => {
                warn!(tab = tab_id, revision, error = ?e, "Layout computation failed");
                LayoutOutcome::Failed(format!("{e:#}"))
            }
        };
        pending.send(outcome);
    });
}
