//! Persistence for user settings and small pieces of client state.
//!
//! - **Settings** (`settings.json`): permission bypass, telemetry opt-out,
//!   device id, last heartbeat date.
//! - **Feedback** (`feedback-state.json`): whether the feedback prompt was shown.
//!
//! Both live in the platform state directory (`~/.local/state/arctic/` on
//! Linux, the data directory elsewhere). Stores are constructed explicitly by
//! the entry point and passed to whoever needs them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "arctic";
const SETTINGS_FILE: &str = "settings.json";
const FEEDBACK_FILE: &str = "feedback-state.json";

/// Sessions a user must have before the feedback prompt is offered.
pub const MIN_SESSIONS_FOR_FEEDBACK: usize = 2;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_bypass_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_date: Option<String>,
    /// Keys written by other tools, carried through saves untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lazily loaded, write-through settings file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    cache: Option<Settings>,
}

impl SettingsStore {
    /// Settings in the platform state directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(state_dir()?.join(SETTINGS_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&mut self) -> &mut Settings {
        let path = &self.path;
        self.cache.get_or_insert_with(|| load_json_from(path))
    }

    fn update(&mut self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        f(self.load());
        let settings = self.load().clone();
        save_json_to(&settings, &self.path)
    }

    pub fn permission_bypass_enabled(&mut self) -> bool {
        self.load().permission_bypass_enabled.unwrap_or(false)
    }

    pub fn set_permission_bypass_enabled(&mut self, enabled: bool) -> Result<()> {
        self.update(|s| s.permission_bypass_enabled = Some(enabled))
    }

    pub fn telemetry_enabled(&mut self) -> bool {
        self.load().telemetry_enabled.unwrap_or(true)
    }

    pub fn set_telemetry_enabled(&mut self, enabled: bool) -> Result<()> {
        self.update(|s| s.telemetry_enabled = Some(enabled))
    }

    /// Stable per-install identifier, generated and persisted on first use.
    pub fn device_id(&mut self) -> Result<String> {
        if let Some(id) = self.load().device_id.clone() {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        debug!(%id, "generated device id");
        self.update(|s| s.device_id = Some(id.clone()))?;
        Ok(id)
    }

    pub fn last_heartbeat_date(&mut self) -> Option<String> {
        self.load().last_heartbeat_date.clone()
    }

    pub fn set_last_heartbeat_date(&mut self, date: &str) -> Result<()> {
        self.update(|s| s.last_heartbeat_date = Some(date.to_string()))
    }

    /// True at most once per `today` while telemetry is enabled. Records the
    /// date when it returns true.
    pub fn claim_heartbeat(&mut self, today: &str) -> Result<bool> {
        if !self.telemetry_enabled() || self.last_heartbeat_date().as_deref() == Some(today) {
            return Ok(false);
        }
        self.set_last_heartbeat_date(today)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackState {
    #[serde(default)]
    feedback_shown: bool,
}

#[derive(Debug, Clone)]
pub struct FeedbackStore {
    path: PathBuf,
}

impl FeedbackStore {
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(state_dir()?.join(FEEDBACK_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Offer feedback once the user has enough sessions and has not been
    /// asked before.
    pub fn should_show_feedback(&self, session_count: usize) -> bool {
        let state: FeedbackState = load_json_from(&self.path);
        !state.feedback_shown && session_count >= MIN_SESSIONS_FOR_FEEDBACK
    }

    pub fn mark_feedback_shown(&self) -> Result<()> {
        save_json_to(&FeedbackState { feedback_shown: true }, &self.path)
    }

}

// ---------------------------------------------------------------------------
// Directory helpers
// ---------------------------------------------------------------------------

/// Arctic state directory (e.g. `~/.local/state/arctic/`).
pub fn state_dir() -> Result<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_dir)
        .map(|p| p.join(APP_DIR))
        .ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "state dir not found",
            ))
        })
}

// ---------------------------------------------------------------------------
// Path-parameterised helpers
// ---------------------------------------------------------------------------

/// Missing or invalid files read as defaults.
fn load_json_from<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
        Err(_) => T::default(),
    }
}

fn save_json_to<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

/// Write bytes to a file atomically: write to a temp file in the same
/// directory, then rename over the target.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn settings_defaults() {
        let dir = TempDir::new().unwrap();
        let mut store = SettingsStore::at(dir.path().join(SETTINGS_FILE));
        assert!(!store.permission_bypass_enabled());
        assert!(store.telemetry_enabled());
        assert!(store.last_heartbeat_date().is_none());
    }

    #[test]
    fn settings_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let mut store = SettingsStore::at(&path);
        store.set_permission_bypass_enabled(true).unwrap();
        store.set_telemetry_enabled(false).unwrap();
        store.set_last_heartbeat_date("2026-10-19").unwrap();

        let mut reopened = SettingsStore::at(&path);
        assert!(reopened.permission_bypass_enabled());
        assert!(!reopened.telemetry_enabled());
        assert_eq!(reopened.last_heartbeat_date().as_deref(), Some("2026-10-19"));

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"permissionBypassEnabled\": true"));
    }

    #[test]
    fn device_id_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let first = SettingsStore::at(&path).device_id().unwrap();
        let second = SettingsStore::at(&path).device_id().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 36);
    }

    #[test]
    fn heartbeat_claimed_once_per_day() {
        let dir = TempDir::new().unwrap();
        let mut store = SettingsStore::at(dir.path().join(SETTINGS_FILE));

        assert!(store.claim_heartbeat("2026-10-19").unwrap());
        assert!(!store.claim_heartbeat("2026-10-19").unwrap());
        assert!(store.claim_heartbeat("2026-10-20").unwrap());

        store.set_telemetry_enabled(false).unwrap();
        assert!(!store.claim_heartbeat("2026-10-21").unwrap());
        assert_eq!(store.last_heartbeat_date().as_deref(), Some("2026-10-20"));
    }

    #[test]
    fn invalid_settings_file_reads_as_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "not valid json!!!").unwrap();

        let mut store = SettingsStore::at(&path);
        assert!(!store.permission_bypass_enabled());
        assert!(store.telemetry_enabled());
    }

    #[test]
    fn settings_extra_fields_survive_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"permissionBypassEnabled":true,"theme":"dark"}"#).unwrap();

        let mut store = SettingsStore::at(&path);
        assert!(store.permission_bypass_enabled());

        store.set_telemetry_enabled(false).unwrap();
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["telemetryEnabled"], false);
        assert_eq!(saved["permissionBypassEnabled"], true);
    }

    #[test]
    fn feedback_after_two_sessions() {
        let dir = TempDir::new().unwrap();
        let feedback = FeedbackStore::at(dir.path().join(FEEDBACK_FILE));

        assert!(!feedback.should_show_feedback(0));
        assert!(!feedback.should_show_feedback(1));
        assert!(feedback.should_show_feedback(2));
        assert!(feedback.should_show_feedback(5));
    }

    #[test]
    fn feedback_not_shown_twice() {
        let dir = TempDir::new().unwrap();
        let feedback = FeedbackStore::at(dir.path().join(FEEDBACK_FILE));
        assert!(feedback.should_show_feedback(2));

        feedback.mark_feedback_shown().unwrap();
        assert!(!feedback.should_show_feedback(5));
        assert!(!feedback.should_show_feedback(100));
    }
}
