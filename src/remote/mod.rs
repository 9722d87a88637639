//! Remote collaborators: layout computation and the session store
//!
//! Both are consumed through object-safe traits so the coordinators can be
//! driven by the HTTP backend in production and by in-process fakes in tests.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Configuration, LayoutResult, SessionId, SessionSummary};

mod http;
#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpBackend;

/// Opaque placement/costing function; idempotent, may fail
#[async_trait]
pub trait LayoutService: Send + Sync {
    async fn compute_layout(&self, config: &Configuration) -> Result<LayoutResult>;
}

/// Remote store of named configurations
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Create when `id` is None (or unknown to the store), replace in place otherwise
    async fn save_session(&self, id: Option<&SessionId>, config: &Configuration) -> Result<SessionId>;

    async fn load_session(&self, id: &SessionId) -> Result<Configuration>;

    /// Deleting an already-deleted id is not an error
    async fn delete_session(&self, id: &SessionId) -> Result<()>;
}
