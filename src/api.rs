//! Snapshot fetch contract the store is filled from.
//!
//! One method per server route the client reads. Implementations may fail;
//! callers decide whether a failure is fatal (bootstrap phase 1), propagated
//! (session sync) or dropped (follow-up refetches).

use crate::error::Result;
use crate::model::{
    Agent, Command, Config, FileDiff, FormatterStatus, LspStatus, McpStatus, MessageWithParts,
    PathInfo, ProviderAuthMethod, ProviderConfig, ProviderList, Pty, Session, SessionStatus, Todo,
    VcsInfo,
};
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait ServerApi: Send + Sync {
    /// Configured providers and their default models.
    async fn provider_config(&self) -> Result<ProviderConfig>;
    /// Every known provider, connected or not.
    async fn provider_list(&self) -> Result<ProviderList>;
    async fn agents(&self) -> Result<Vec<Agent>>;
    async fn config(&self) -> Result<Config>;

    async fn sessions(&self) -> Result<Vec<Session>>;
    async fn commands(&self) -> Result<Vec<Command>>;
    async fn lsp_status(&self) -> Result<Vec<LspStatus>>;
    async fn mcp_status(&self) -> Result<HashMap<String, McpStatus>>;
    async fn formatter_status(&self) -> Result<Vec<FormatterStatus>>;
    /// Status of every session the server considers active. Sessions it
    /// omits are idle.
    async fn session_statuses(&self) -> Result<HashMap<String, SessionStatus>>;
    async fn provider_auth(&self) -> Result<HashMap<String, Vec<ProviderAuthMethod>>>;
    async fn vcs(&self) -> Result<Option<VcsInfo>>;
    async fn path(&self) -> Result<PathInfo>;
    async fn ptys(&self) -> Result<Vec<Pty>>;
    async fn permission_bypass(&self) -> Result<bool>;

    async fn session(&self, session_id: &str) -> Result<Session>;
    /// Most recent `limit` messages with their parts, oldest first.
    async fn session_messages(&self, session_id: &str, limit: usize)
    -> Result<Vec<MessageWithParts>>;
    async fn session_todos(&self, session_id: &str) -> Result<Vec<Todo>>;
    async fn session_diff(&self, session_id: &str) -> Result<Vec<FileDiff>>;
}
