//! Entity types mirrored from the Arctic server.
//!
//! Field names follow the server's JSON (`sessionID`, `providerID`, ...).
//! Read-mostly snapshot types keep unrecognised fields in an `extra` map so a
//! newer server does not lose data on its way through the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTime {
    pub created: Millis,
    pub updated: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compacting: Option<Millis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "modelID")]
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkChild {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub model: ModelRef,
}

/// Benchmark fan-out descriptor. A parent runs the same task against several
/// models, each in its own child session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Benchmark {
    Parent {
        #[serde(default)]
        children: Vec<BenchmarkChild>,
        #[serde(
            rename = "appliedSessionID",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        applied_session_id: Option<String>,
    },
    Child {
        #[serde(rename = "parentID")]
        parent_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(rename = "projectID", default)]
    pub project_id: String,
    #[serde(default)]
    pub directory: String,
    #[serde(rename = "parentID", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub time: SessionTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<Benchmark>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server-reported execution status of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Busy,
    Retry {
        attempt: u32,
        message: String,
        next: Millis,
    },
}

impl SessionStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// True when both statuses are the same kind, ignoring retry details.
    pub fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Status derived from the session record and its last message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Idle,
    Working,
    Compacting,
}

// ---------------------------------------------------------------------------
// Messages and parts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageTime {
    pub created: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<Millis>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTokens {
    #[serde(default)]
    pub read: u64,
    #[serde(default)]
    pub write: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub reasoning: u64,
    #[serde(default)]
    pub cache: CacheTokens,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input + self.output + self.reasoning + self.cache.read + self.cache.write
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub role: Role,
    #[serde(default)]
    pub time: MessageTime,
    #[serde(default)]
    pub tokens: TokenUsage,
    #[serde(rename = "providerID", default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(rename = "modelID", default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolState {
    pub status: ToolStatus,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Part payloads this client understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PartData {
    Text {
        #[serde(default)]
        text: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Reasoning {
        #[serde(default)]
        text: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Tool {
        #[serde(rename = "callID")]
        call_id: String,
        tool: String,
        state: ToolState,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    StepStart {
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    StepFinish {
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

/// Part payload. Kinds without a typed shape (files, snapshots, patches, ...)
/// and known kinds that fail to decode are kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartPayload {
    Known(PartData),
    Other {
        #[serde(rename = "type")]
        kind: String,
        #[serde(flatten)]
        data: Map<String, Value>,
    },
}

impl PartPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Known(PartData::Text {
            text: text.into(),
            extra: Map::new(),
        })
    }

    /// Wire name of the part kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::Known(PartData::Text { .. }) => "text",
            Self::Known(PartData::Reasoning { .. }) => "reasoning",
            Self::Known(PartData::Tool { .. }) => "tool",
            Self::Known(PartData::StepStart { .. }) => "step-start",
            Self::Known(PartData::StepFinish { .. }) => "step-finish",
            Self::Other { kind, .. } => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    #[serde(rename = "sessionID", default)]
    pub session_id: String,
    #[serde(rename = "messageID")]
    pub message_id: String,
    #[serde(flatten)]
    pub payload: PartPayload,
}

/// A message together with its parts, as returned by the messages route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWithParts {
    pub info: Message,
    #[serde(default)]
    pub parts: Vec<Part>,
}

// ---------------------------------------------------------------------------
// Permissions, todos, diffs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionTime {
    pub created: Millis,
}

/// A pending approval request. Only pending permissions are ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "messageID")]
    pub message_id: String,
    #[serde(rename = "callID", default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub time: PermissionTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub content: String,
    pub status: String,
    #[serde(default)]
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub file: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

// ---------------------------------------------------------------------------
// Pty
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PtyStatus {
    Running,
    Exited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pty {
    pub id: String,
    pub title: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: String,
    pub status: PtyStatus,
}

// ---------------------------------------------------------------------------
// Read-mostly snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimit {
    #[serde(default)]
    pub context: u64,
    #[serde(default)]
    pub output: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub limit: ModelLimit,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub models: HashMap<String, Model>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Configured providers plus the default model per provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub default: HashMap<String, String>,
}

/// Every known provider, including ones the user has not connected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderList {
    #[serde(default)]
    pub all: Vec<Provider>,
    #[serde(default)]
    pub default: HashMap<String, String>,
    #[serde(default)]
    pub connected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAuthMethod {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub template: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server configuration document. Treated as opaque by the store.
pub type Config = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LspStatus {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub root: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatterStatus {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsInfo {
    pub branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub worktree: String,
    #[serde(default)]
    pub directory: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_parses_server_shape() {
        let json = r#"{
            "id": "ses_1",
            "projectID": "p1",
            "directory": "/repo",
            "title": "fix login",
            "version": "1.0.0",
            "time": {"created": 10, "updated": 20, "compacting": 30},
            "benchmark": {
                "type": "parent",
                "children": [{"sessionID": "ses_2", "model": {"providerID": "anthropic", "modelID": "sonnet"}}],
                "appliedSessionID": "ses_2"
            }
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.project_id, "p1");
        assert_eq!(session.time.compacting, Some(30));
        assert_eq!(session.extra.get("version"), Some(&Value::from("1.0.0")));
        match session.benchmark {
            Some(Benchmark::Parent {
                children,
                applied_session_id,
            }) => {
                assert_eq!(children.len(), 1);
                assert_eq!(applied_session_id.as_deref(), Some("ses_2"));
            }
            other => panic!("expected parent benchmark, got {other:?}"),
        }
    }

    #[test]
    fn session_status_variants() {
        let busy: SessionStatus = serde_json::from_str(r#"{"type":"busy"}"#).unwrap();
        assert_eq!(busy, SessionStatus::Busy);
        let retry: SessionStatus =
            serde_json::from_str(r#"{"type":"retry","attempt":2,"message":"rate limited","next":99}"#)
                .unwrap();
        assert!(retry.same_kind(&SessionStatus::Retry {
            attempt: 0,
            message: String::new(),
            next: 0
        }));
        assert!(!retry.is_idle());
    }

    #[test]
    fn unknown_part_kind_is_other() {
        let json = r#"{"id":"prt_1","sessionID":"s","messageID":"m","type":"snapshot","snapshot":"abc"}"#;
        let part: Part = serde_json::from_str(json).unwrap();
        assert_eq!(part.payload.kind(), "snapshot");
        match &part.payload {
            PartPayload::Other { data, .. } => assert_eq!(data["snapshot"], "abc"),
            other => panic!("expected other part, got {other:?}"),
        }
    }

    #[test]
    fn file_part_survives_reserialization() {
        let original = serde_json::json!({
            "id": "prt_1",
            "sessionID": "s",
            "messageID": "m",
            "type": "file",
            "mime": "image/png",
            "url": "data:image/png;base64,AAAA",
            "filename": "shot.png",
        });
        let part: Part = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(part.payload.kind(), "file");
        assert_eq!(serde_json::to_value(&part).unwrap(), original);
    }

    #[test]
    fn text_part_keeps_unmodelled_fields() {
        let original = serde_json::json!({
            "id": "prt_2",
            "sessionID": "s",
            "messageID": "m",
            "type": "text",
            "text": "hi",
            "synthetic": true,
            "time": {"start": 1, "end": 2},
        });
        let part: Part = serde_json::from_value(original.clone()).unwrap();
        match &part.payload {
            PartPayload::Known(PartData::Text { text, extra }) => {
                assert_eq!(text, "hi");
                assert_eq!(extra["synthetic"], true);
            }
            other => panic!("expected text part, got {other:?}"),
        }
        assert_eq!(serde_json::to_value(&part).unwrap(), original);
    }

    #[test]
    fn tool_part_parses() {
        let json = r#"{
            "id":"prt_2","sessionID":"s","messageID":"m","type":"tool",
            "callID":"c1","tool":"bash",
            "state":{"status":"completed","input":{"command":"ls"},"output":"a\nb","metadata":{"exit":0}}
        }"#;
        let part: Part = serde_json::from_str(json).unwrap();
        match part.payload {
            PartPayload::Known(PartData::Tool { tool, state, .. }) => {
                assert_eq!(tool, "bash");
                assert_eq!(state.status, ToolStatus::Completed);
                assert_eq!(state.output.as_deref(), Some("a\nb"));
                assert_eq!(state.extra["metadata"]["exit"], 0);
            }
            other => panic!("expected tool part, got {other:?}"),
        }
    }

    #[test]
    fn token_total_sums_all_buckets() {
        let tokens = TokenUsage {
            input: 1,
            output: 2,
            reasoning: 3,
            cache: CacheTokens { read: 4, write: 5 },
        };
        assert_eq!(tokens.total(), 15);
    }
}
