//! `sessions.json` persistence.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabdeck_core::{PENDING_SESSION_PREFIX, Session, WindowId};

use crate::error::StoreError;

pub const STORAGE_FILE: &str = "sessions.json";

/// User preferences persisted next to the sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// `"Auto" | "iTerm2" | "Ghostty" | "Kitty" | "Terminal"`.
    #[serde(default = "default_terminal")]
    pub preferred_terminal: String,
    /// Preferences owned by other tools (`theme`, expansion state, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_terminal() -> String {
    "Auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preferred_terminal: default_terminal(),
            extra: serde_json::Map::new(),
        }
    }
}

/// On-disk layout. Unknown top-level keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageData {
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Session records plus settings, bound to a data directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
    data: StorageData,
}

impl SessionStore {
    /// Load `<dir>/sessions.json`; a missing file is an empty store.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let path = dir.join(STORAGE_FILE);
        let data = match fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| StoreError::json(&path, e))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StorageData::default(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        tracing::debug!(path = %path.display(), sessions = data.sessions.len(), "store loaded");
        Ok(Self { dir, data })
    }

    /// In-memory store, for tests and dry runs.
    pub fn from_data(dir: impl Into<PathBuf>, data: StorageData) -> Self {
        Self {
            dir: dir.into(),
            data,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(STORAGE_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write pretty JSON through a temp file and rename, so readers never
    /// see a half-written file.
    pub fn save(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let path = self.path();
        let tmp = self.dir.join(format!("{STORAGE_FILE}.tmp"));
        let content =
            serde_json::to_string_pretty(&self.data).map_err(|e| StoreError::json(&path, e))?;
        fs::write(&tmp, content).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        tracing::debug!(path = %path.display(), sessions = self.data.sessions.len(), "store saved");
        Ok(())
    }

    pub fn sessions(&self) -> &[Session] {
        &self.data.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut Vec<Session> {
        &mut self.data.sessions
    }

    pub fn set_sessions(&mut self, sessions: Vec<Session>) {
        self.data.sessions = sessions;
    }

    pub fn take_sessions(&mut self) -> Vec<Session> {
        std::mem::take(&mut self.data.sessions)
    }

    pub fn settings(&self) -> &Settings {
        &self.data.settings
    }

    pub fn set_preferred_terminal(&mut self, terminal: impl Into<String>) {
        self.data.settings.preferred_terminal = terminal.into();
    }

    /// Resolve `query` to a session index.
    ///
    /// Exact matches on deck id, session id or name win; otherwise a unique
    /// prefix of the deck id or session id.
    pub fn find_index(&self, query: &str) -> Result<usize, StoreError> {
        let sessions = &self.data.sessions;
        if let Some(i) = sessions
            .iter()
            .position(|s| s.id == query || s.session_id == query)
        {
            return Ok(i);
        }
        let named: Vec<usize> = positions(sessions, |s| s.name == query);
        if let [i] = named.as_slice() {
            return Ok(*i);
        }
        let prefixed = if named.is_empty() {
            positions(sessions, |s| {
                !query.is_empty() && (s.id.starts_with(query) || s.session_id.starts_with(query))
            })
        } else {
            named
        };
        match prefixed.as_slice() {
            [] => Err(StoreError::SessionNotFound(query.to_string())),
            [i] => Ok(*i),
            many => Err(StoreError::AmbiguousSession {
                query: query.to_string(),
                count: many.len(),
            }),
        }
    }

    pub fn find(&self, query: &str) -> Result<&Session, StoreError> {
        let i = self.find_index(query)?;
        Ok(&self.data.sessions[i])
    }

    pub fn find_mut(&mut self, query: &str) -> Result<&mut Session, StoreError> {
        let i = self.find_index(query)?;
        Ok(&mut self.data.sessions[i])
    }

    /// Set a human-chosen name; locks it against title resync.
    pub fn rename(&mut self, query: &str, name: impl Into<String>) -> Result<&Session, StoreError> {
        let session = self.find_mut(query)?;
        session.name = name.into();
        session.name_locked = true;
        Ok(&*session)
    }

    /// Flip the pinned flag.
    pub fn toggle_pin(&mut self, query: &str) -> Result<&Session, StoreError> {
        let session = self.find_mut(query)?;
        session.pinned = !session.pinned;
        Ok(&*session)
    }

    /// Forget a session record. The agent's transcript is left alone.
    pub fn delete(&mut self, query: &str) -> Result<Session, StoreError> {
        let i = self.find_index(query)?;
        Ok(self.data.sessions.remove(i))
    }

    /// Insert a placeholder for a freshly launched agent whose real session id
    /// is not known until it writes a transcript. Sorted first.
    pub fn insert_pending(
        &mut self,
        project_path: impl Into<String>,
        name: Option<String>,
        window: Option<WindowId>,
        now: DateTime<Utc>,
    ) -> &Session {
        let suffix = window.map_or_else(|| now.timestamp_millis().to_string(), |w| w.to_string());
        let mut session = Session::new(format!("{PENDING_SESSION_PREFIX}{suffix}"), project_path);
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            session.name = name;
            session.name_locked = true;
        }
        session.window_id = window;
        session.order = self.data.sessions.iter().map(|s| s.order).min().unwrap_or(0).min(0) - 1;
        session.created_at = now;
        session.last_accessed_at = now;

        self.data.sessions.retain(|s| s.session_id != session.session_id);
        self.data.sessions.push(session);
        let last = self.data.sessions.len() - 1;
        &self.data.sessions[last]
    }
}

fn positions(sessions: &[Session], pred: impl Fn(&Session) -> bool) -> Vec<usize> {
    sessions
        .iter()
        .enumerate()
        .filter(|(_, s)| pred(s))
        .map(|(i, _)| i)
        .collect()
}
