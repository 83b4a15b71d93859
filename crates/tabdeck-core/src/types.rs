use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::UnknownStatus;

/// Session id prefix for placeholders created before the program has
/// written a transcript (and therefore before the real id is known).
pub const PENDING_SESSION_PREFIX: &str = "pending-";

// ─── Status ───────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No open window hosts this session.
    #[default]
    Idle,
    /// A window hosts the session and the program is waiting for input.
    Waiting,
    /// A window hosts the session and its title shows the busy spinner.
    Running,
}

impl SessionStatus {
    pub const ALL: [Self; 3] = [Self::Idle, Self::Waiting, Self::Running];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Running => "running",
        }
    }

    /// Single-glyph indicator for list views.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Running => "●",
            Self::Waiting => "◎",
            Self::Idle => "○",
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "waiting" => Ok(Self::Waiting),
            "running" => Ok(Self::Running),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

// ─── Window id ────────────────────────────────────────────────────

/// Terminal window identifier, scoped to the running terminal instance.
///
/// Always positive: raw id `0` is the "no window" sentinel and is represented
/// as `Option::<WindowId>::None` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WindowId(u32);

impl WindowId {
    /// Returns `None` for non-positive or out-of-range raw ids.
    pub fn new(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().filter(|v| *v > 0).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Accepts the legacy `0` sentinel (and negative junk) as "no window".
fn deserialize_window_id<'de, D>(deserializer: D) -> Result<Option<WindowId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(WindowId::new))
}

fn is_false(v: &bool) -> bool {
    !*v
}

// ─── Session ──────────────────────────────────────────────────────

/// A tracked agent session.
///
/// Owned by the persistence layer; reconciliation only touches `status`,
/// `window_id` and (when not locked) `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Deck-local record id (stable across renames).
    pub id: String,
    /// Human-facing display name.
    pub name: String,
    /// Set once a human chose `name`; reconciliation never overwrites it.
    #[serde(rename = "renamed", default, skip_serializing_if = "is_false")]
    pub name_locked: bool,
    pub project_path: String,
    /// The program's own conversation id, as passed to `--resume`.
    #[serde(rename = "claude_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_accessed_at: DateTime<Utc>,
    /// Last window bound to this session. A back-reference only.
    #[serde(
        rename = "kitty_window_id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_window_id"
    )]
    pub window_id: Option<WindowId>,
    /// Fields other tools keep in the same record (`group_path`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    #[serde(skip)]
    pub status: SessionStatus,
    #[serde(skip)]
    pub transcript_path: Option<PathBuf>,
    #[serde(skip)]
    pub git_branch: Option<String>,
}

impl Session {
    /// Minimal record: `id` mirrors `session_id`, `name` is the folder name.
    pub fn new(session_id: impl Into<String>, project_path: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let project_path = project_path.into();
        let name = folder_name(&project_path).to_string();
        Self {
            id: session_id.clone(),
            name,
            name_locked: false,
            project_path,
            session_id,
            order: 0,
            pinned: false,
            created_at: DateTime::<Utc>::default(),
            last_accessed_at: DateTime::<Utc>::default(),
            window_id: None,
            extra: serde_json::Map::new(),
            status: SessionStatus::Idle,
            transcript_path: None,
            git_branch: None,
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: WindowId) -> Self {
        self.window_id = Some(window);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn locked(mut self) -> Self {
        self.name_locked = true;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.session_id.starts_with(PENDING_SESSION_PREFIX)
    }

    /// Last component of `project_path`.
    pub fn folder_name(&self) -> &str {
        folder_name(&self.project_path)
    }
}

fn folder_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(path)
}

// ─── Window snapshot ──────────────────────────────────────────────

/// One open terminal window, as seen in a single listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSnapshot {
    pub window_id: WindowId,
    pub title: String,
    pub command_line: String,
    pub working_directory: String,
    /// Session id embedded after the resume flag on the command line.
    pub explicit_session_id: Option<String>,
    /// Title carries the busy spinner.
    pub busy: bool,
}

// ─── Match tier ───────────────────────────────────────────────────

/// Which matcher tier bound a session to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// The session's previously stored window id.
    StoredHandle,
    /// The window's command line resumes exactly this session.
    ExplicitSessionId,
    /// Only the working directory lines up (ambiguous).
    WorkingDirectory,
}

impl MatchTier {
    /// Strong matches are trusted for renames and window persistence.
    pub fn is_strong(self) -> bool {
        !matches!(self, Self::WorkingDirectory)
    }
}

// ─── Status update ────────────────────────────────────────────────

/// Computed result for one session in one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub session_id: String,
    pub status: SessionStatus,
    pub old_status: SessionStatus,
    /// Cleaned window title to adopt as the display name, if any.
    pub name: Option<String>,
    pub old_name: String,
    /// Window id the session should hold after this pass.
    pub window_id: Option<WindowId>,
    pub old_window_id: Option<WindowId>,
    /// Tier of the window match, `None` when nothing matched.
    pub tier: Option<MatchTier>,
}

impl StatusUpdate {
    pub fn is_strong(&self) -> bool {
        self.tier.is_some_and(MatchTier::is_strong)
    }

    pub fn status_changed(&self) -> bool {
        self.status != self.old_status
    }

    pub fn window_changed(&self) -> bool {
        self.window_id != self.old_window_id
    }

    pub fn is_change(&self) -> bool {
        self.status_changed() || self.window_changed() || self.name.is_some()
    }
}
