//! Event dispatcher
//!
//! Applies one server event at a time to the store. Every branch is a
//! synchronous mutation; kinds that need fresh data from the server return a
//! [`FollowUp`] that the caller fetches and feeds back as one batch.

use crate::event::Event;
use crate::model::{Millis, PtyStatus, SessionStatus};
use crate::store::{Change, SyncStore};
use std::collections::HashMap;
use tracing::{debug, info, trace};

/// Fetch the dispatcher needs after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// Refetch LSP status and replace it wholesale.
    RefreshLsp,
    /// Refetch every session status and repair local drift.
    ReconcileStatuses,
}

impl SyncStore {
    /// Apply a single event. `now` drives work-time accounting.
    pub fn apply(&mut self, event: Event, now: Millis) -> Option<FollowUp> {
        trace!(kind = event.kind(), session_id = ?event.session_id(), "apply event");
        match event {
            Event::PermissionUpdated(permission) => {
                debug!(session_id = %permission.session_id, permission_id = %permission.id, "permission updated");
                self.upsert_permission(permission);
            }
            Event::PermissionReplied {
                session_id,
                permission_id,
                ..
            } => {
                debug!(%session_id, %permission_id, "permission replied");
                self.remove_permission(&session_id, &permission_id);
            }
            Event::PermissionBypassUpdated { enabled } => {
                info!(enabled, "permission bypass updated");
                self.set_permission_bypass(enabled);
            }
            Event::TodoUpdated { session_id, todos } => self.set_todos(&session_id, todos),
            Event::SessionDiff { session_id, diff } => self.set_diff(&session_id, diff),
            Event::SessionDeleted { info } => self.remove_session(&info.id),
            Event::SessionUpdated { info } => self.upsert_session(info),
            Event::SessionStatus { session_id, status } => {
                debug!(%session_id, ?status, "session status");
                self.set_session_status(&session_id, status, now);
            }
            Event::MessageUpdated { info } => self.upsert_message(info),
            Event::MessageRemoved {
                session_id,
                message_id,
            } => self.remove_message(&session_id, &message_id),
            Event::PartUpdated { part } => self.upsert_part(part),
            Event::PartRemoved {
                message_id,
                part_id,
                ..
            } => self.remove_part(&message_id, &part_id),
            Event::LspUpdated {} => return Some(FollowUp::RefreshLsp),
            Event::VcsBranchUpdated { branch } => {
                self.set_vcs(Some(crate::model::VcsInfo { branch }));
            }
            Event::PtyCreated { info } => {
                self.pty.push(info);
                self.record(Change::Pty);
            }
            Event::PtyUpdated { info } => {
                if let Some(existing) = self.pty.iter_mut().find(|p| p.id == info.id) {
                    *existing = info;
                    self.record(Change::Pty);
                }
            }
            Event::PtyExited { id, .. } => {
                if let Some(existing) = self.pty.iter_mut().find(|p| p.id == id) {
                    existing.status = PtyStatus::Exited;
                    self.record(Change::Pty);
                }
            }
            Event::PtyDeleted { id } => {
                if let Some(pos) = self.pty.iter().position(|p| p.id == id) {
                    self.pty.remove(pos);
                    self.record(Change::Pty);
                }
            }
            Event::ServerConnected {} => {
                info!("server connected, reconciling session status");
                return Some(FollowUp::ReconcileStatuses);
            }
        }
        None
    }

    /// Overwrite a session's status and run the work-time state machine.
    pub(crate) fn set_session_status(
        &mut self,
        session_id: &str,
        status: SessionStatus,
        now: Millis,
    ) {
        let timer = self
            .session_work_time
            .entry(session_id.to_string())
            .or_default();
        let timer_changed = timer.observe(&status, now);
        self.session_status.insert(session_id.to_string(), status);
        self.record(Change::SessionStatus(session_id.to_string()));
        if timer_changed {
            self.record(Change::WorkTime(session_id.to_string()));
        }
    }

    /// Repair local status drift against the server's authoritative map.
    /// Used for the bootstrap snapshot and again on every reconnect.
    ///
    /// Sessions the server reports with a different (or unknown) status are
    /// overwritten. Sessions we hold as non-idle that the server omits are
    /// forced idle with their timer folded, so a missed event during a
    /// disconnect cannot leave a session stuck busy.
    pub fn reconcile_statuses(&mut self, server: HashMap<String, SessionStatus>, now: Millis) {
        let mut repaired = 0usize;
        for (session_id, status) in &server {
            let differs = self
                .session_status
                .get(session_id)
                .is_none_or(|current| !current.same_kind(status));
            if differs {
                self.set_session_status(session_id, status.clone(), now);
                repaired += 1;
            }
        }

        let stale: Vec<String> = self
            .session_status
            .iter()
            .filter(|(id, status)| !status.is_idle() && !server.contains_key(*id))
            .map(|(id, _)| id.clone())
            .collect();
        for session_id in stale {
            debug!(%session_id, "forcing idle after reconnect");
            self.set_session_status(&session_id, SessionStatus::Idle, now);
            repaired += 1;
        }

        info!(repaired, "session status reconciled");
    }
}
