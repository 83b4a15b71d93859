//! Transcript discovery.
//!
//! The agent writes one `<session-uuid>.jsonl` transcript per conversation
//! under `<projects-dir>/<encoded-project-path>/`. Each conversation that has
//! actual user/assistant content becomes a [`Session`].

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Deserialize;
use tabdeck_core::Session;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::paths::{decode_project_dir, encode_path};

/// Only the head of a transcript is inspected.
pub const TRANSCRIPT_HEAD_BYTES: u64 = 20 * 1024;

/// Fields of interest from one transcript line.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptLine {
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    git_branch: Option<String>,
    #[serde(default)]
    message: Option<TranscriptMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct TranscriptMessage {
    #[serde(default)]
    role: Option<String>,
}

/// What the head of a transcript tells us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptInfo {
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    /// At least one user or assistant message.
    pub has_content: bool,
}

/// Scan the head of `reader` line by line. A line that does not parse (most
/// often one cut off by the size limit) is searched for the raw
/// `"cwd":"`, `"gitBranch":"` and `"role":` fragments instead.
pub fn read_transcript_info(reader: impl Read) -> TranscriptInfo {
    let mut head = Vec::new();
    if let Err(e) = reader.take(TRANSCRIPT_HEAD_BYTES).read_to_end(&mut head) {
        debug!(error = %e, "transcript read stopped early");
    }
    let head = String::from_utf8_lossy(&head);

    let mut info = TranscriptInfo::default();
    for line in head.lines() {
        let (cwd, git_branch, role) = match serde_json::from_str::<TranscriptLine>(line) {
            Ok(parsed) => (
                parsed.cwd,
                parsed.git_branch,
                parsed.message.and_then(|m| m.role),
            ),
            Err(_) => (
                raw_string_field(line, "cwd"),
                raw_string_field(line, "gitBranch"),
                raw_string_field(line, "role"),
            ),
        };
        if info.cwd.is_none() {
            info.cwd = cwd.filter(|c| !c.is_empty());
        }
        if info.git_branch.is_none() {
            info.git_branch = git_branch.filter(|b| !b.is_empty());
        }
        if let Some(role) = role {
            info.has_content |= role == "user" || role == "assistant";
        }
        if info.cwd.is_some() && info.git_branch.is_some() && info.has_content {
            break;
        }
    }
    info
}

/// First `"<key>":"<value>"` in `line`, unescaped. `None` if the value is
/// not terminated within the line.
fn raw_string_field(line: &str, key: &str) -> Option<String> {
    let marker = format!("\"{key}\":\"");
    let start = line.find(&marker)? + marker.len();
    let mut value = String::new();
    let mut chars = line[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(value),
            '\\' => match chars.next()? {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                other => value.push(other),
            },
            c => value.push(c),
        }
    }
    None
}

/// Transcript file stems are UUIDs (8-4-4-4-12 hex digits). Anything else
/// (`.history.jsonl`, agent side files) is not a conversation.
pub fn is_session_uuid(s: &str) -> bool {
    // Hyphenated form only; `try_parse` also takes simple and braced ids.
    s.len() == HYPHENATED_UUID_LEN && Uuid::try_parse(s).is_ok()
}

const HYPHENATED_UUID_LEN: usize = 36;

/// Record id: first 8 characters of the session id plus the encoded path.
pub fn deck_id(session_id: &str, project_path: &str) -> String {
    let short: String = session_id.chars().take(8).collect();
    format!("{short}-{}", encode_path(project_path))
}

/// `<folder> <Mon D HH:MM>`, e.g. `app Mar 1 09:30`.
pub fn default_session_name<Tz>(project_path: &str, when: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let base = Path::new(project_path)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != ".")
        .unwrap_or("root");
    format!("{base} {}", when.format("%b %-d %H:%M"))
}

pub fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Scan `projects_dir` for conversations. A missing directory yields none.
pub fn discover_sessions(projects_dir: &Path) -> Result<Vec<Session>, StoreError> {
    let entries = match fs::read_dir(projects_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %projects_dir.display(), "projects directory missing");
            return Ok(Vec::new());
        }
        Err(e) => return Err(StoreError::io(projects_dir, e)),
    };

    let mut sessions = Vec::new();
    for entry in entries.flatten() {
        let project_dir = entry.path();
        if !project_dir.is_dir() {
            continue;
        }
        let Some(encoded) = project_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let fallback_path = decode_project_dir(encoded);
        for transcript in transcripts_in(&project_dir) {
            if let Some(session) = session_from_transcript(&transcript, &fallback_path) {
                sessions.push(session);
            }
        }
    }
    debug!(dir = %projects_dir.display(), count = sessions.len(), "sessions discovered");
    Ok(sessions)
}

fn transcripts_in(project_dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(project_dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect(),
        Err(e) => {
            warn!(dir = %project_dir.display(), error = %e, "failed to read project directory");
            Vec::new()
        }
    }
}

/// Build a session from one transcript, or `None` if it is not a
/// conversation.
pub fn session_from_transcript(path: &Path, fallback_project: &str) -> Option<Session> {
    let session_id = path.file_stem()?.to_str()?;
    if !is_session_uuid(session_id) {
        return None;
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to open transcript");
            return None;
        }
    };
    let mtime = file
        .metadata()
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mtime = DateTime::<Utc>::from(mtime);

    let info = read_transcript_info(file);
    if !info.has_content {
        return None;
    }

    let project_path = info.cwd.unwrap_or_else(|| fallback_project.to_string());
    let mut session = Session::new(session_id, project_path);
    session.id = deck_id(session_id, &session.project_path);
    session.name = default_session_name(&session.project_path, mtime.with_timezone(&Local));
    session.created_at = mtime;
    session.last_accessed_at = mtime;
    session.transcript_path = Some(path.to_path_buf());
    session.git_branch = info.git_branch;
    Some(session)
}
