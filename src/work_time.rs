//! Per-session wall-clock accounting of time spent busy.

use crate::model::{Millis, SessionStatus};
use serde::{Deserialize, Serialize};

/// Accumulated busy time for one session.
///
/// `current_start` is set exactly while the session is busy. Stopping folds
/// the elapsed interval into `total_ms`, which never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_start: Option<Millis>,
    pub total_ms: u64,
}

impl WorkTime {
    pub fn is_running(&self) -> bool {
        self.current_start.is_some()
    }

    /// Start the timer unless one is already running. Returns true if started.
    pub fn start(&mut self, now: Millis) -> bool {
        if self.current_start.is_some() {
            return false;
        }
        self.current_start = Some(now);
        true
    }

    /// Stop a running timer and fold the elapsed time. Returns true if stopped.
    pub fn stop(&mut self, now: Millis) -> bool {
        let Some(start) = self.current_start.take() else {
            return false;
        };
        // clock skew must not shrink the total
        let elapsed = u64::try_from(now.saturating_sub(start)).unwrap_or(0);
        self.total_ms += elapsed;
        true
    }

    /// Drive the timer from a status transition. Returns true if it changed.
    pub fn observe(&mut self, status: &SessionStatus, now: Millis) -> bool {
        match status {
            SessionStatus::Busy => self.start(now),
            SessionStatus::Idle => self.stop(now),
            SessionStatus::Retry { .. } => false,
        }
    }

    /// Total including the interval still running at `now`.
    pub fn elapsed_ms(&self, now: Millis) -> u64 {
        let running = self
            .current_start
            .map(|start| u64::try_from(now.saturating_sub(start)).unwrap_or(0))
            .unwrap_or(0);
        self.total_ms + running
    }
}
