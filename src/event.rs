//! Server event union
//!
//! Events arrive as `{"type": "<kind>", "properties": {...}}`. Each kind maps
//! to one variant; the dispatcher matches on them exhaustively. Kinds this
//! client does not know are skipped by [`Event::parse`] rather than treated as
//! errors, since the server may be newer than the client.

use crate::model::{FileDiff, Message, Part, Permission, Pty, Session, SessionStatus, Todo};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "properties")]
pub enum Event {
    #[serde(rename = "permission.updated")]
    PermissionUpdated(Permission),
    #[serde(rename = "permission.replied")]
    PermissionReplied {
        #[serde(rename = "sessionID")]
        session_id: String,
        #[serde(rename = "permissionID")]
        permission_id: String,
        #[serde(default)]
        response: String,
    },
    #[serde(rename = "permission.bypass.updated")]
    PermissionBypassUpdated { enabled: bool },
    #[serde(rename = "todo.updated")]
    TodoUpdated {
        #[serde(rename = "sessionID")]
        session_id: String,
        todos: Vec<Todo>,
    },
    #[serde(rename = "session.diff")]
    SessionDiff {
        #[serde(rename = "sessionID")]
        session_id: String,
        diff: Vec<FileDiff>,
    },
    #[serde(rename = "session.deleted")]
    SessionDeleted { info: Session },
    #[serde(rename = "session.updated")]
    SessionUpdated { info: Session },
    #[serde(rename = "session.status")]
    SessionStatus {
        #[serde(rename = "sessionID")]
        session_id: String,
        status: SessionStatus,
    },
    #[serde(rename = "message.updated")]
    MessageUpdated { info: Message },
    #[serde(rename = "message.removed")]
    MessageRemoved {
        #[serde(rename = "sessionID")]
        session_id: String,
        #[serde(rename = "messageID")]
        message_id: String,
    },
    #[serde(rename = "message.part.updated")]
    PartUpdated { part: Part },
    #[serde(rename = "message.part.removed")]
    PartRemoved {
        #[serde(rename = "sessionID", default)]
        session_id: String,
        #[serde(rename = "messageID")]
        message_id: String,
        #[serde(rename = "partID")]
        part_id: String,
    },
    #[serde(rename = "lsp.updated")]
    LspUpdated {},
    #[serde(rename = "vcs.branch.updated")]
    VcsBranchUpdated { branch: String },
    #[serde(rename = "pty.created")]
    PtyCreated { info: Pty },
    #[serde(rename = "pty.updated")]
    PtyUpdated { info: Pty },
    #[serde(rename = "pty.exited")]
    PtyExited {
        id: String,
        #[serde(rename = "exitCode", default)]
        exit_code: Option<i32>,
    },
    #[serde(rename = "pty.deleted")]
    PtyDeleted { id: String },
    #[serde(rename = "server.connected")]
    ServerConnected {},
}

/// Envelope used to peek at the kind before committing to a variant.
#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: Value,
}

impl Event {
    /// Every kind this client understands.
    pub const KINDS: &'static [&'static str] = &[
        "permission.updated",
        "permission.replied",
        "permission.bypass.updated",
        "todo.updated",
        "session.diff",
        "session.deleted",
        "session.updated",
        "session.status",
        "message.updated",
        "message.removed",
        "message.part.updated",
        "message.part.removed",
        "lsp.updated",
        "vcs.branch.updated",
        "pty.created",
        "pty.updated",
        "pty.exited",
        "pty.deleted",
        "server.connected",
    ];

    /// Decode one JSON event. Returns `Ok(None)` for kinds this client does
    /// not handle.
    pub fn parse(json: &str) -> Result<Option<Event>, serde_json::Error> {
        let raw: RawEvent = serde_json::from_str(json)?;
        if !Self::KINDS.contains(&raw.kind.as_str()) {
            return Ok(None);
        }
        let properties = match raw.properties {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let envelope = serde_json::json!({ "type": raw.kind, "properties": properties });
        serde_json::from_value(envelope).map(Some)
    }

    /// Wire name of this event's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PermissionUpdated(_) => "permission.updated",
            Self::PermissionReplied { .. } => "permission.replied",
            Self::PermissionBypassUpdated { .. } => "permission.bypass.updated",
            Self::TodoUpdated { .. } => "todo.updated",
            Self::SessionDiff { .. } => "session.diff",
            Self::SessionDeleted { .. } => "session.deleted",
            Self::SessionUpdated { .. } => "session.updated",
            Self::SessionStatus { .. } => "session.status",
            Self::MessageUpdated { .. } => "message.updated",
            Self::MessageRemoved { .. } => "message.removed",
            Self::PartUpdated { .. } => "message.part.updated",
            Self::PartRemoved { .. } => "message.part.removed",
            Self::LspUpdated {} => "lsp.updated",
            Self::VcsBranchUpdated { .. } => "vcs.branch.updated",
            Self::PtyCreated { .. } => "pty.created",
            Self::PtyUpdated { .. } => "pty.updated",
            Self::PtyExited { .. } => "pty.exited",
            Self::PtyDeleted { .. } => "pty.deleted",
            Self::ServerConnected {} => "server.connected",
        }
    }

    /// Session the event is scoped to, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::PermissionUpdated(p) => Some(&p.session_id),
            Self::PermissionReplied { session_id, .. }
            | Self::TodoUpdated { session_id, .. }
            | Self::SessionDiff { session_id, .. }
            | Self::SessionStatus { session_id, .. }
            | Self::MessageRemoved { session_id, .. } => Some(session_id),
            Self::SessionDeleted { info } | Self::SessionUpdated { info } => Some(&info.id),
            Self::MessageUpdated { info } => Some(&info.session_id),
            Self::PartUpdated { part } => Some(&part.session_id),
            Self::PartRemoved { session_id, .. } => Some(session_id),
            Self::PermissionBypassUpdated { .. }
            | Self::LspUpdated {}
            | Self::VcsBranchUpdated { .. }
            | Self::PtyCreated { .. }
            | Self::PtyUpdated { .. }
            | Self::PtyExited { .. }
            | Self::PtyDeleted { .. }
            | Self::ServerConnected {} => None,
        }
    }
}
