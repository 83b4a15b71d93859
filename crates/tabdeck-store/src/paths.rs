//! Default on-disk locations.

use std::path::PathBuf;

use crate::error::StoreError;

/// Directory holding `sessions.json`, relative to `$HOME`.
pub const DATA_DIR_NAME: &str = ".claude-sessions";

pub fn home_dir() -> Result<PathBuf, StoreError> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or(StoreError::NoHomeDir)
}

/// `$HOME/.claude-sessions`
pub fn default_data_dir() -> Result<PathBuf, StoreError> {
    Ok(home_dir()?.join(DATA_DIR_NAME))
}

/// `$HOME/.claude/projects`, where the agent writes its transcripts.
pub fn default_projects_dir() -> Result<PathBuf, StoreError> {
    Ok(home_dir()?.join(".claude").join("projects"))
}

/// Encode a path the way the agent names per-project directories.
/// Example: `/Users/me/app` -> `-Users-me-app`
pub fn encode_path(path: &str) -> String {
    path.replace('/', "-")
}

/// Best-effort inverse of [`encode_path`]. Lossy: hyphens in the original
/// path come back as separators.
pub fn decode_project_dir(encoded: &str) -> String {
    if encoded.is_empty() {
        return String::new();
    }
    let mut parts = encoded.split('-');
    parts.next();
    format!("/{}", parts.collect::<Vec<_>>().join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_replaces_slashes() {
        assert_eq!(encode_path("/Users/me/app"), "-Users-me-app");
        assert_eq!(encode_path("/"), "-");
    }

    #[test]
    fn decode_is_lossy_inverse() {
        assert_eq!(decode_project_dir("-Users-me-app"), "/Users/me/app");
        assert_eq!(decode_project_dir("-Users-me-my-app"), "/Users/me/my/app");
        assert_eq!(decode_project_dir(""), "");
        assert_eq!(decode_project_dir("-"), "/");
    }
}
