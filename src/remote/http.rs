//! REST client for the layout/session backend

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{LayoutService, SessionStore};
use crate::constants::api;
use crate::types::{Configuration, LayoutResult, SessionId, SessionSummary};

/// Body of `/calculate` and `/save`
#[derive(Debug, Serialize)]
struct LayoutRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    configs: &'a Configuration,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    id: String,
}

#[derive(Clone)]
pub struct HttpBackend {
    api_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            api_url: api_url.trim().to_string(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        format!("{base}/{suffix}")
    }

    async fn request_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.request_text(request).await?;
        serde_json::from_str(&body).context("Backend response was malformed JSON")
    }

    async fn request_text(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await.context("Backend request failed")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Backend response read failed")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Backend request failed with status {status}: {}",
                body.trim()
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl LayoutService for HttpBackend {
    async fn compute_layout(&self, config: &Configuration) -> Result<LayoutResult> {
        debug!(units = config.total_units(), "POST calculate");
        let request = self
            .client
            .post(self.endpoint(api::CALCULATE_PATH))
            .json(&LayoutRequest { id: None, configs: config });
        self.request_json(request).await
    }
}

#[async_trait]
impl SessionStore for HttpBackend {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let request = self.client.get(self.endpoint(api::SESSIONS_PATH));
        // An empty store answers `null`
        let sessions: Option<Vec<SessionSummary>> = self.request_json(request).await?;
        Ok(sessions.unwrap_or_default())
    }

    async fn save_session(&self, id: Option<&SessionId>, config: &Configuration) -> Result<SessionId> {
        debug!(session = ?id, "POST save");
        let request = self.client.post(self.endpoint(api::SAVE_PATH)).json(&LayoutRequest {
            id: id.map(SessionId::as_str),
            configs: config,
        });
        let response: SaveResponse = self.request_json(request).await?;
        if response.id.trim().is_empty() {
            return Err(anyhow!("Backend save returned an empty session id"));
        }
        Ok(SessionId::new(response.id))
    }

    async fn load_session(&self, id: &SessionId) -> Result<Configuration> {
        let request = self
            .client
            .get(self.endpoint(api::LOAD_PATH))
            .query(&[("id", id.as_str())]);
        self.request_json(request)
            .await
            .with_context(|| format!("Failed to load session {id}"))
    }

    async fn delete_session(&self, id: &SessionId) -> Result<()> {
        let request = self
            .client
            .delete(self.endpoint(api::DELETE_PATH))
            .query(&[("id", id.as_str())]);
        self.request_text(request)
            .await
            .with_context(|| format!("Failed to delete session {id}"))?;
        Ok(())
    }
}
