//! `ServerApi` over the Arctic server's REST routes.

use crate::api::ServerApi;
use crate::error::{Error, Result};
use crate::model::{
    Agent, Command, Config, FileDiff, FormatterStatus, LspStatus, McpStatus, MessageWithParts,
    PathInfo, ProviderAuthMethod, ProviderConfig, ProviderList, Pty, Session, SessionStatus, Todo,
    VcsInfo,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4096";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Error bodies are cut to this many characters before surfacing.
const ERROR_BODY_MAX: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct BypassResponse {
    #[serde(default)]
    enabled: bool,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `route` and decode the body. A JSON `null` body decodes to `None`.
    async fn get<T: DeserializeOwned>(&self, route: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, route);
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                route: route.to_string(),
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_MAX).collect(),
            });
        }
        let bytes = response.bytes().await?;
        trace!(route, len = bytes.len(), "response");
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn required<T: DeserializeOwned>(&self, route: &'static str) -> Result<T> {
        self.get(route).await?.ok_or(Error::MissingData(route))
    }

    async fn or_default<T: DeserializeOwned + Default>(&self, route: &str) -> Result<T> {
        Ok(self.get(route).await?.unwrap_or_default())
    }
}

#[async_trait]
impl ServerApi for HttpApi {
    async fn provider_config(&self) -> Result<ProviderConfig> {
        self.required("/config/providers").await
    }

    async fn provider_list(&self) -> Result<ProviderList> {
        self.required("/provider").await
    }

    async fn agents(&self) -> Result<Vec<Agent>> {
        self.or_default("/agent").await
    }

    async fn config(&self) -> Result<Config> {
        self.required("/config").await
    }

    async fn sessions(&self) -> Result<Vec<Session>> {
        self.or_default("/session").await
    }

    async fn commands(&self) -> Result<Vec<Command>> {
        self.or_default("/command").await
    }

    async fn lsp_status(&self) -> Result<Vec<LspStatus>> {
        self.required("/lsp").await
    }

    async fn mcp_status(&self) -> Result<HashMap<String, McpStatus>> {
        self.required("/mcp").await
    }

    async fn formatter_status(&self) -> Result<Vec<FormatterStatus>> {
        self.required("/formatter").await
    }

    async fn session_statuses(&self) -> Result<HashMap<String, SessionStatus>> {
        self.required("/session/status").await
    }

    async fn provider_auth(&self) -> Result<HashMap<String, Vec<ProviderAuthMethod>>> {
        self.or_default("/provider/auth").await
    }

    async fn vcs(&self) -> Result<Option<VcsInfo>> {
        self.get("/vcs").await
    }

    async fn path(&self) -> Result<PathInfo> {
        self.required("/path").await
    }

    async fn ptys(&self) -> Result<Vec<Pty>> {
        self.or_default("/pty").await
    }

    async fn permission_bypass(&self) -> Result<bool> {
        let response: Option<BypassResponse> = self.get("/permission/bypass").await?;
        Ok(response.is_some_and(|r| r.enabled))
    }

    async fn session(&self, session_id: &str) -> Result<Session> {
        self.get(&format!("/session/{session_id}"))
            .await?
            .ok_or(Error::MissingData("/session/{id}"))
    }

    async fn session_messages(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageWithParts>> {
        self.get(&format!("/session/{session_id}/message?limit={limit}"))
            .await?
            .ok_or(Error::MissingData("/session/{id}/message"))
    }

    async fn session_todos(&self, session_id: &str) -> Result<Vec<Todo>> {
        self.or_default(&format!("/session/{session_id}/todo")).await
    }

    async fn session_diff(&self, session_id: &str) -> Result<Vec<FileDiff>> {
        self.or_default(&format!("/session/{session_id}/diff")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let api = HttpApi::with_client(reqwest::Client::new(), "http://localhost:4096/");
        assert_eq!(api.base_url(), "http://localhost:4096");
    }

    #[test]
    fn status_error_message() {
        let err = Error::Status {
            route: "/session".into(),
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "/session returned 500: boom");
    }

    #[tokio::test]
    async fn unreachable_server_is_http_error() {
        // port 9 (discard) on localhost is not expected to speak HTTP
        let api = HttpApi::new("http://127.0.0.1:9").unwrap();
        let err = api.sessions().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)), "unexpected error: {err}");
    }
}
