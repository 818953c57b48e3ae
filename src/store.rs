//! Client-side mirror of server state.
//!
//! `SyncStore` owns every entity collection. Keyed collections (sessions,
//! messages, parts, permissions) stay sorted by id so lookups go through
//! [`binary::search`]. Mutation happens only through the dispatcher
//! ([`SyncStore::apply`]), bootstrap and session sync; every mutation records a
//! [`Change`] that the owning client drains and broadcasts to readers.

use crate::binary;
use crate::model::{
    ActivityStatus, Agent, Benchmark, Command, Config, FileDiff, FormatterStatus, LspStatus,
    McpStatus, Message, MessageWithParts, Millis, ModelRef, Part, PathInfo, Permission, Provider,
    ProviderAuthMethod, ProviderConfig, ProviderList, Pty, PtyStatus, Role, Session,
    SessionStatus, Todo, VcsInfo,
};
use crate::work_time::WorkTime;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Per-session cap on retained messages. Oldest are evicted first.
pub const MESSAGE_LIMIT: usize = 100;

/// Store readiness. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    #[default]
    Loading,
    Partial,
    Complete,
}

/// Slice of the store touched by a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Status(StoreStatus),
    Providers,
    Agents,
    Commands,
    Config,
    Sessions,
    SessionStatus(String),
    WorkTime(String),
    Permissions(String),
    PermissionBypass,
    Todos(String),
    Diff(String),
    Messages(String),
    Parts(String),
    Lsp,
    Mcp,
    Formatter,
    Vcs,
    Path,
    Pty,
}

/// Everything fetched for one session by a full sync.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    /// Id the sync was requested for. Everything below is stored under it.
    pub session_id: String,
    pub session: Session,
    pub messages: Vec<MessageWithParts>,
    pub todos: Vec<Todo>,
    pub diff: Vec<FileDiff>,
}

/// Token usage of the most recent assistant reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextUsage {
    pub tokens: u64,
    /// Share of the model's context window, when the limit is known.
    pub percentage: Option<u64>,
}

/// Where a session sits within a benchmark fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchmarkSlot {
    /// Parent with no children yet.
    Empty,
    /// The parent itself, or a session the parent does not list.
    Parent { slots: usize },
    Child {
        index: usize,
        slots: usize,
        model: ModelRef,
        applied: bool,
    },
}

#[derive(Debug, Default)]
pub struct SyncStore {
    pub(crate) status: StoreStatus,
    pub(crate) provider: Vec<Provider>,
    pub(crate) provider_default: HashMap<String, String>,
    pub(crate) provider_next: ProviderList,
    pub(crate) provider_auth: HashMap<String, Vec<ProviderAuthMethod>>,
    pub(crate) agent: Vec<Agent>,
    pub(crate) command: Vec<Command>,
    pub(crate) permission: HashMap<String, Vec<Permission>>,
    pub(crate) permission_bypass_enabled: bool,
    pub(crate) config: Config,
    pub(crate) session: Vec<Session>,
    pub(crate) session_status: HashMap<String, SessionStatus>,
    pub(crate) session_diff: HashMap<String, Vec<FileDiff>>,
    pub(crate) session_work_time: HashMap<String, WorkTime>,
    pub(crate) todo: HashMap<String, Vec<Todo>>,
    pub(crate) message: HashMap<String, Vec<Message>>,
    pub(crate) part: HashMap<String, Vec<Part>>,
    pub(crate) lsp: Vec<LspStatus>,
    pub(crate) mcp: HashMap<String, McpStatus>,
    pub(crate) formatter: Vec<FormatterStatus>,
    pub(crate) vcs: Option<VcsInfo>,
    pub(crate) path: PathInfo,
    pub(crate) pty: Vec<Pty>,
    synced: HashSet<String>,
    changes: Vec<Change>,
}

impl SyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Drain changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    // -----------------------------------------------------------------------
    // Readiness
    // -----------------------------------------------------------------------

    pub fn status(&self) -> StoreStatus {
        self.status
    }

    /// True once the critical bootstrap data is loaded.
    pub fn ready(&self) -> bool {
        self.status != StoreStatus::Loading
    }

    /// Move readiness forward. Requests to move backwards are ignored.
    pub(crate) fn advance(&mut self, status: StoreStatus) {
        if status <= self.status {
            return;
        }
        info!(from = ?self.status, to = ?status, "store status");
        self.status = status;
        self.record(Change::Status(status));
    }

    // -----------------------------------------------------------------------
    // Keyed lookups
    // -----------------------------------------------------------------------

    pub fn sessions(&self) -> &[Session] {
        &self.session
    }

    /// O(log n) lookup by session id.
    pub fn session(&self, session_id: &str) -> Option<&Session> {
        let m = binary::search(&self.session, session_id, |s| s.id.as_str());
        m.found.then(|| &self.session[m.index])
    }

    pub fn messages(&self, session_id: &str) -> &[Message] {
        self.message.get(session_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn message(&self, session_id: &str, message_id: &str) -> Option<&Message> {
        let messages = self.messages(session_id);
        let m = binary::search(messages, message_id, |m| m.id.as_str());
        m.found.then(|| &messages[m.index])
    }

    pub fn parts(&self, message_id: &str) -> &[Part] {
        self.part.get(message_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn permissions(&self, session_id: &str) -> &[Permission] {
        self.permission.get(session_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn todos(&self, session_id: &str) -> &[Todo] {
        self.todo.get(session_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn diff(&self, session_id: &str) -> &[FileDiff] {
        self.session_diff.get(session_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Event-driven status as last reported by the server.
    pub fn session_status(&self, session_id: &str) -> Option<&SessionStatus> {
        self.session_status.get(session_id)
    }

    pub fn session_statuses(&self) -> &HashMap<String, SessionStatus> {
        &self.session_status
    }

    pub fn work_time(&self, session_id: &str) -> Option<&WorkTime> {
        self.session_work_time.get(session_id)
    }

    /// Busy time including any interval still running at `now`.
    pub fn work_time_ms(&self, session_id: &str, now: Millis) -> u64 {
        self.work_time(session_id)
            .map(|wt| wt.elapsed_ms(now))
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn providers(&self) -> &[Provider] {
        &self.provider
    }

    pub fn provider_defaults(&self) -> &HashMap<String, String> {
        &self.provider_default
    }

    pub fn provider_list(&self) -> &ProviderList {
        &self.provider_next
    }

    pub fn provider_auth(&self) -> &HashMap<String, Vec<ProviderAuthMethod>> {
        &self.provider_auth
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agent
    }

    pub fn commands(&self) -> &[Command] {
        &self.command
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn permission_bypass_enabled(&self) -> bool {
        self.permission_bypass_enabled
    }

    pub fn lsp(&self) -> &[LspStatus] {
        &self.lsp
    }

    pub fn mcp(&self) -> &HashMap<String, McpStatus> {
        &self.mcp
    }

    pub fn formatters(&self) -> &[FormatterStatus] {
        &self.formatter
    }

    pub fn vcs(&self) -> Option<&VcsInfo> {
        self.vcs.as_ref()
    }

    pub fn path(&self) -> &PathInfo {
        &self.path
    }

    pub fn ptys(&self) -> &[Pty] {
        &self.pty
    }

    pub fn running_ptys(&self) -> impl Iterator<Item = &Pty> {
        self.pty.iter().filter(|p| p.status == PtyStatus::Running)
    }

    // -----------------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------------

    /// Status derived from the session record and its last message. Used
    /// where no `session.status` event has been seen yet.
    pub fn derived_status(&self, session_id: &str) -> ActivityStatus {
        let Some(session) = self.session(session_id) else {
            return ActivityStatus::Idle;
        };
        if session.time.compacting.is_some() {
            return ActivityStatus::Compacting;
        }
        match self.messages(session_id).last() {
            None => ActivityStatus::Idle,
            Some(last) if last.role == Role::User => ActivityStatus::Working,
            Some(last) if last.time.completed.is_some() => ActivityStatus::Idle,
            Some(_) => ActivityStatus::Working,
        }
    }

    pub fn pending_permissions(&self, session_id: &str) -> usize {
        self.permissions(session_id).len()
    }

    pub fn context_usage(&self, session_id: &str) -> Option<ContextUsage> {
        let last = self
            .messages(session_id)
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.tokens.output > 0)?;
        let tokens = last.tokens.total();
        let limit = last
            .provider_id
            .as_deref()
            .zip(last.model_id.as_deref())
            .and_then(|(provider_id, model_id)| {
                self.provider
                    .iter()
                    .find(|p| p.id == provider_id)
                    .and_then(|p| p.models.get(model_id))
            })
            .map(|model| model.limit.context)
            .filter(|limit| *limit > 0);
        let percentage = limit.map(|limit| (tokens * 100 + limit / 2) / limit);
        Some(ContextUsage { tokens, percentage })
    }

    pub fn benchmark_slot(&self, session_id: &str) -> Option<BenchmarkSlot> {
        let current = self.session(session_id)?;
        let parent = match current.benchmark.as_ref()? {
            Benchmark::Parent { .. } => current,
            Benchmark::Child { parent_id } => self.session(parent_id)?,
        };
        let Some(Benchmark::Parent {
            children,
            applied_session_id,
        }) = parent.benchmark.as_ref()
        else {
            return None;
        };
        if children.is_empty() {
            return Some(BenchmarkSlot::Empty);
        }
        let slots = children.len();
        let slot = match children.iter().position(|c| c.session_id == current.id) {
            Some(index) => BenchmarkSlot::Child {
                index,
                slots,
                model: children[index].model.clone(),
                applied: applied_session_id.as_deref() == Some(current.id.as_str()),
            },
            None => BenchmarkSlot::Parent { slots },
        };
        Some(slot)
    }

    // -----------------------------------------------------------------------
    // Collection mutation
    // -----------------------------------------------------------------------

    pub(crate) fn upsert_session(&mut self, session: Session) {
        debug!(session_id = %session.id, "upsert session");
        binary::upsert(&mut self.session, session, |s| s.id.as_str());
        self.record(Change::Sessions);
    }

    pub(crate) fn remove_session(&mut self, session_id: &str) {
        if binary::remove(&mut self.session, session_id, |s| s.id.as_str()).is_some() {
            debug!(%session_id, "session removed");
            self.record(Change::Sessions);
        }
    }

    /// Insert or overwrite a message. New messages beyond [`MESSAGE_LIMIT`]
    /// push out the oldest one.
    pub(crate) fn upsert_message(&mut self, message: Message) {
        let session_id = message.session_id.clone();
        let messages = self.message.entry(session_id.clone()).or_default();
        let inserted = binary::upsert(messages, message, |m| m.id.as_str());
        if inserted && messages.len() > MESSAGE_LIMIT {
            let evicted = messages.remove(0);
            debug!(%session_id, message_id = %evicted.id, "message evicted");
        }
        self.record(Change::Messages(session_id));
    }

    pub(crate) fn remove_message(&mut self, session_id: &str, message_id: &str) {
        let Some(messages) = self.message.get_mut(session_id) else {
            return;
        };
        if binary::remove(messages, message_id, |m| m.id.as_str()).is_some() {
            self.record(Change::Messages(session_id.to_string()));
        }
    }

    pub(crate) fn upsert_part(&mut self, part: Part) {
        let message_id = part.message_id.clone();
        let parts = self.part.entry(message_id.clone()).or_default();
        binary::upsert(parts, part, |p| p.id.as_str());
        self.record(Change::Parts(message_id));
    }

    pub(crate) fn remove_part(&mut self, message_id: &str, part_id: &str) {
        let Some(parts) = self.part.get_mut(message_id) else {
            return;
        };
        if binary::remove(parts, part_id, |p| p.id.as_str()).is_some() {
            self.record(Change::Parts(message_id.to_string()));
        }
    }

    pub(crate) fn upsert_permission(&mut self, permission: Permission) {
        let session_id = permission.session_id.clone();
        let permissions = self.permission.entry(session_id.clone()).or_default();
        binary::upsert(permissions, permission, |p| p.id.as_str());
        self.record(Change::Permissions(session_id));
    }

    pub(crate) fn remove_permission(&mut self, session_id: &str, permission_id: &str) {
        let Some(permissions) = self.permission.get_mut(session_id) else {
            return;
        };
        if binary::remove(permissions, permission_id, |p| p.id.as_str()).is_some() {
            self.record(Change::Permissions(session_id.to_string()));
        }
    }

    // -----------------------------------------------------------------------
    // Wholesale replacement
    // -----------------------------------------------------------------------

    pub(crate) fn set_provider_config(&mut self, config: ProviderConfig) {
        self.provider = config.providers;
        self.provider_default = config.default;
        self.record(Change::Providers);
    }

    pub(crate) fn set_provider_list(&mut self, list: ProviderList) {
        self.provider_next = list;
        self.record(Change::Providers);
    }

    pub(crate) fn set_provider_auth(&mut self, auth: HashMap<String, Vec<ProviderAuthMethod>>) {
        self.provider_auth = auth;
        self.record(Change::Providers);
    }

    pub(crate) fn set_agents(&mut self, agents: Vec<Agent>) {
        self.agent = agents;
        self.record(Change::Agents);
    }

    pub(crate) fn set_commands(&mut self, commands: Vec<Command>) {
        self.command = commands;
        self.record(Change::Commands);
    }

    pub(crate) fn set_config(&mut self, config: Config) {
        self.config = config;
        self.record(Change::Config);
    }

    /// Replace the session collection, sorting by id.
    pub(crate) fn set_sessions(&mut self, mut sessions: Vec<Session>) {
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions.dedup_by(|a, b| a.id == b.id);
        self.session = sessions;
        self.record(Change::Sessions);
    }

    pub(crate) fn set_todos(&mut self, session_id: &str, todos: Vec<Todo>) {
        self.todo.insert(session_id.to_string(), todos);
        self.record(Change::Todos(session_id.to_string()));
    }

    pub(crate) fn set_diff(&mut self, session_id: &str, diff: Vec<FileDiff>) {
        self.session_diff.insert(session_id.to_string(), diff);
        self.record(Change::Diff(session_id.to_string()));
    }

    pub(crate) fn set_permission_bypass(&mut self, enabled: bool) {
        self.permission_bypass_enabled = enabled;
        self.record(Change::PermissionBypass);
    }

    pub(crate) fn set_lsp(&mut self, lsp: Vec<LspStatus>) {
        self.lsp = lsp;
        self.record(Change::Lsp);
    }

    pub(crate) fn set_mcp(&mut self, mcp: HashMap<String, McpStatus>) {
        self.mcp = mcp;
        self.record(Change::Mcp);
    }

    pub(crate) fn set_formatters(&mut self, formatter: Vec<FormatterStatus>) {
        self.formatter = formatter;
        self.record(Change::Formatter);
    }

    pub(crate) fn set_vcs(&mut self, vcs: Option<VcsInfo>) {
        self.vcs = vcs;
        self.record(Change::Vcs);
    }

    pub(crate) fn set_path(&mut self, path: PathInfo) {
        self.path = path;
        self.record(Change::Path);
    }

    pub(crate) fn set_ptys(&mut self, pty: Vec<Pty>) {
        self.pty = pty;
        self.record(Change::Pty);
    }

    // -----------------------------------------------------------------------
    // Full session sync
    // -----------------------------------------------------------------------

    pub fn is_synced(&self, session_id: &str) -> bool {
        self.synced.contains(session_id)
    }

    /// Apply a full session fetch in one batch and remember it as synced.
    pub(crate) fn apply_session_detail(&mut self, detail: SessionDetail) {
        let SessionDetail {
            session_id,
            session,
            messages,
            todos,
            diff,
        } = detail;
        self.upsert_session(session);
        self.set_todos(&session_id, todos);

        let mut infos = Vec::with_capacity(messages.len());
        for MessageWithParts { info, mut parts } in messages {
            parts.sort_by(|a, b| a.id.cmp(&b.id));
            self.part.insert(info.id.clone(), parts);
            self.record(Change::Parts(info.id.clone()));
            infos.push(info);
        }
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        self.message.insert(session_id.clone(), infos);
        self.record(Change::Messages(session_id.clone()));

        self.set_diff(&session_id, diff);
        self.synced.insert(session_id);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{
        BenchmarkChild, MessageTime, Model, ModelLimit, SessionTime, TokenUsage,
    };
    use serde_json::Map;

    pub(crate) fn session(id: &str) -> Session {
        Session {
            id: id.into(),
            project_id: "proj".into(),
            directory: "/repo".into(),
            parent_id: None,
            title: format!("session {id}"),
            time: SessionTime::default(),
            benchmark: None,
            extra: Map::new(),
        }
    }

    pub(crate) fn message(session_id: &str, id: &str, role: Role) -> Message {
        Message {
            id: id.into(),
            session_id: session_id.into(),
            role,
            time: MessageTime::default(),
            tokens: TokenUsage::default(),
            provider_id: None,
            model_id: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn status_never_regresses() {
        let mut store = SyncStore::new();
        assert!(!store.ready());
        store.advance(StoreStatus::Complete);
        store.advance(StoreStatus::Partial);
        store.advance(StoreStatus::Loading);
        assert_eq!(store.status(), StoreStatus::Complete);
        assert!(store.ready());
        assert_eq!(
            store.take_changes(),
            vec![Change::Status(StoreStatus::Complete)]
        );
    }

    #[test]
    fn set_sessions_sorts_by_id() {
        let mut store = SyncStore::new();
        store.set_sessions(vec![session("c"), session("a"), session("b")]);
        let ids: Vec<_> = store.sessions().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(store.session("b").map(|s| s.id.as_str()), Some("b"));
        assert!(store.session("z").is_none());
    }

    #[test]
    fn derived_status_follows_last_message() {
        let mut store = SyncStore::new();
        assert_eq!(store.derived_status("s1"), ActivityStatus::Idle);

        store.upsert_session(session("s1"));
        assert_eq!(store.derived_status("s1"), ActivityStatus::Idle);

        store.upsert_message(message("s1", "m1", Role::User));
        assert_eq!(store.derived_status("s1"), ActivityStatus::Working);

        let mut reply = message("s1", "m2", Role::Assistant);
        store.upsert_message(reply.clone());
        assert_eq!(store.derived_status("s1"), ActivityStatus::Working);

        reply.time.completed = Some(50);
        store.upsert_message(reply);
        assert_eq!(store.derived_status("s1"), ActivityStatus::Idle);

        let mut compacting = session("s1");
        compacting.time.compacting = Some(60);
        store.upsert_session(compacting);
        assert_eq!(store.derived_status("s1"), ActivityStatus::Compacting);
    }

    #[test]
    fn context_usage_uses_model_limit() {
        let mut store = SyncStore::new();
        let mut models = HashMap::new();
        models.insert(
            "sonnet".to_string(),
            Model {
                id: "sonnet".into(),
                name: "Sonnet".into(),
                limit: ModelLimit {
                    context: 200_000,
                    output: 8_000,
                },
                extra: Map::new(),
            },
        );
        store.set_provider_config(ProviderConfig {
            providers: vec![Provider {
                id: "anthropic".into(),
                name: "Anthropic".into(),
                models,
                extra: Map::new(),
            }],
            default: HashMap::new(),
        });

        let mut reply = message("s1", "m1", Role::Assistant);
        reply.provider_id = Some("anthropic".into());
        reply.model_id = Some("sonnet".into());
        reply.tokens.input = 49_000;
        reply.tokens.output = 1_000;
        store.upsert_message(reply);
        // trailing user message does not count
        store.upsert_message(message("s1", "m2", Role::User));

        let usage = store.context_usage("s1").unwrap();
        assert_eq!(usage.tokens, 50_000);
        assert_eq!(usage.percentage, Some(25));
    }

    #[test]
    fn context_usage_without_known_model() {
        let mut store = SyncStore::new();
        let mut reply = message("s1", "m1", Role::Assistant);
        reply.tokens.output = 10;
        store.upsert_message(reply);
        assert_eq!(
            store.context_usage("s1"),
            Some(ContextUsage {
                tokens: 10,
                percentage: None
            })
        );
        assert!(store.context_usage("missing").is_none());
    }

    #[test]
    fn benchmark_slot_for_child() {
        let mut store = SyncStore::new();
        let model = ModelRef {
            provider_id: "openai".into(),
            model_id: "gpt".into(),
        };
        let mut parent = session("p");
        parent.benchmark = Some(Benchmark::Parent {
            children: vec![
                BenchmarkChild {
                    session_id: "c1".into(),
                    model: model.clone(),
                },
                BenchmarkChild {
                    session_id: "c2".into(),
                    model: model.clone(),
                },
            ],
            applied_session_id: Some("c2".into()),
        });
        let mut child = session("c2");
        child.benchmark = Some(Benchmark::Child {
            parent_id: "p".into(),
        });
        store.set_sessions(vec![parent, child]);

        assert_eq!(
            store.benchmark_slot("c2"),
            Some(BenchmarkSlot::Child {
                index: 1,
                slots: 2,
                model,
                applied: true,
            })
        );
        assert_eq!(
            store.benchmark_slot("p"),
            Some(BenchmarkSlot::Parent { slots: 2 })
        );
        assert!(store.benchmark_slot("missing").is_none());
    }

    #[test]
    fn session_detail_replaces_lists() {
        let mut store = SyncStore::new();
        store.upsert_message(message("s1", "old", Role::User));

        store.apply_session_detail(SessionDetail {
            session_id: "s1".into(),
            session: session("s1"),
            messages: vec![
                MessageWithParts {
                    info: message("s1", "m2", Role::Assistant),
                    parts: Vec::new(),
                },
                MessageWithParts {
                    info: message("s1", "m1", Role::User),
                    parts: Vec::new(),
                },
            ],
            todos: Vec::new(),
            diff: Vec::new(),
        });

        let ids: Vec<_> = store.messages("s1").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2"]);
        assert!(store.is_synced("s1"));
        assert!(store.session("s1").is_some());
        assert!(store.message("s1", "old").is_none());
    }

    #[test]
    fn session_detail_keyed_by_requested_id() {
        let mut store = SyncStore::new();
        store.apply_session_detail(SessionDetail {
            session_id: "s1".into(),
            session: session("S1"),
            messages: vec![MessageWithParts {
                info: message("S1", "m1", Role::User),
                parts: Vec::new(),
            }],
            todos: Vec::new(),
            diff: Vec::new(),
        });

        assert!(store.is_synced("s1"));
        assert!(!store.is_synced("S1"));
        assert_eq!(store.messages("s1").len(), 1);
        assert!(store.session("S1").is_some());
    }
}
