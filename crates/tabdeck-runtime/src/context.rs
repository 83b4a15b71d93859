//! Shared command setup (store, discovery, kitty wiring) and display helpers.

use std::path::PathBuf;

use anyhow::Context as _;
use tabdeck_core::{
    ApplyOutcome, Reconciler, Reconciliation, Session, apply_updates, prune_closed_pending,
};
use tabdeck_kitty::{KittyExecutor, KittyWindowSource, Terminal, TerminalController};
use tabdeck_store::{
    SessionStore, default_data_dir, default_projects_dir, discover_sessions, merge_sessions,
};

use crate::cli::Cli;

/// Everything a command needs: the loaded store, where transcripts live, and
/// how to reach the terminal.
pub struct DeckContext {
    pub store: SessionStore,
    pub projects_dir: PathBuf,
    executor: KittyExecutor,
    terminal_override: Option<Terminal>,
}

impl DeckContext {
    pub fn load(args: &Cli) -> anyhow::Result<Self> {
        let data_dir = match &args.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        let projects_dir = match &args.projects_dir {
            Some(dir) => dir.clone(),
            None => default_projects_dir()?,
        };
        let store = SessionStore::open(&data_dir)
            .with_context(|| format!("loading sessions from {}", data_dir.display()))?;

        let mut executor = KittyExecutor::new(args.kitty_bin.as_str());
        if let Some(address) = &args.kitty_socket {
            executor = executor.with_listen_on(address.as_str());
        }

        tracing::debug!(
            data_dir = %data_dir.display(),
            projects_dir = %projects_dir.display(),
            sessions = store.sessions().len(),
            "context loaded"
        );
        Ok(Self {
            store,
            projects_dir,
            executor,
            terminal_override: args.terminal.as_deref().map(Terminal::parse),
        })
    }

    /// Merge the transcripts currently on disk into the store. Returns
    /// whether anything worth saving changed.
    pub fn refresh(&mut self) -> anyhow::Result<bool> {
        let discovered = discover_sessions(&self.projects_dir)?;
        let merged = merge_sessions(self.store.take_sessions(), discovered);
        self.store.set_sessions(merged.sessions);
        Ok(merged.changed)
    }

    pub fn reconciler(&self) -> Reconciler<KittyWindowSource<KittyExecutor>> {
        Reconciler::new(KittyWindowSource::new(self.executor.clone()))
    }

    /// `--terminal` wins over the saved preference.
    pub fn preferred_terminal(&self) -> Terminal {
        self.terminal_override
            .unwrap_or_else(|| Terminal::parse(&self.store.settings().preferred_terminal))
    }

    /// Resolves `Auto` once, here.
    pub fn controller(&self) -> TerminalController<KittyExecutor> {
        TerminalController::new(self.executor.clone(), self.preferred_terminal())
    }
}

/// Apply a finished pass to the owned sessions. Placeholders whose window
/// closed are pruned, unless the window listing failed.
pub fn apply_pass(sessions: &mut Vec<Session>, pass: &Reconciliation) -> ApplyOutcome {
    let mut outcome = apply_updates(sessions, &pass.updates);
    if pass.degraded.is_none() && prune_closed_pending(sessions, &pass.live_windows) {
        outcome.changed = true;
        outcome.needs_persist = true;
    }
    outcome
}

/// Return the last two path segments, collapsing $HOME to `~`.
///
/// ```text
/// "/Users/me/src/org/app" -> "org/app"
/// "/Users/me/app"         -> "~/app"
/// ```
pub fn short_path(path: &str) -> String {
    let home = std::env::var("HOME").unwrap_or_default();
    let collapsed = match path.strip_prefix(home.as_str()) {
        Some(rest) if !home.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
            format!("~{rest}")
        }
        _ => path.to_string(),
    };

    let trimmed = collapsed.trim_end_matches('/');
    let segments: Vec<&str> = trimmed
        .rsplit('/')
        .take(2)
        .filter(|s| !s.is_empty())
        .collect();

    match segments.len() {
        0 => collapsed,
        1 => segments[0].to_string(),
        _ => format!("{}/{}", segments[1], segments[0]),
    }
}

/// Relative-time helper: seconds -> human string.
pub fn relative_time(seconds: i64) -> String {
    let s = seconds.unsigned_abs();
    if s < 60 {
        "just now".to_string()
    } else if s < 3600 {
        format!("{}m", s / 60)
    } else if s < 86400 {
        format!("{}h", s / 3600)
    } else if s < 86400 * 30 {
        format!("{}d", s / 86400)
    } else {
        format!("{}w", s / (86400 * 7))
    }
}

/// Resolve --color flag to bool.
pub fn resolve_color(color: &str) -> bool {
    use std::io::IsTerminal;
    match color {
        "always" => true,
        "never" => false,
        _ => std::io::stdout().is_terminal(),
    }
}

/// Right-truncate to `max` characters, appending `…` if truncated.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}\u{2026}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabdeck_core::{SessionStatus, StatusUpdate, WindowId};

    #[test]
    fn short_path_basic() {
        assert_eq!(short_path("/some/deep/nested/repo/subdir"), "repo/subdir");
    }

    #[test]
    fn short_path_single_segment() {
        assert_eq!(short_path("/only"), "only");
        assert_eq!(short_path("/"), "/");
    }

    #[test]
    fn short_path_home_collapse() {
        let home = std::env::var("HOME").unwrap_or_default();
        if home.is_empty() || home == "/" {
            return;
        }
        assert_eq!(short_path(&format!("{home}/app")), "~/app");
        assert_eq!(short_path(&format!("{home}/src/app")), "src/app");
    }

    #[test]
    fn relative_time_buckets() {
        assert_eq!(relative_time(5), "just now");
        assert_eq!(relative_time(-30), "just now");
        assert_eq!(relative_time(125), "2m");
        assert_eq!(relative_time(7200), "2h");
        assert_eq!(relative_time(86400 * 3), "3d");
        assert_eq!(relative_time(86400 * 70), "10w");
    }

    #[test]
    fn resolve_color_explicit() {
        assert!(resolve_color("always"));
        assert!(!resolve_color("never"));
    }

    #[test]
    fn truncate_long_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 5), "abcd\u{2026}");
    }

    fn update(sid: &str, status: SessionStatus, window: Option<WindowId>) -> StatusUpdate {
        StatusUpdate {
            session_id: sid.into(),
            status,
            old_status: SessionStatus::Idle,
            name: None,
            old_name: String::new(),
            window_id: window,
            old_window_id: None,
            tier: None,
        }
    }

    #[test]
    fn apply_pass_prunes_closed_placeholders() {
        let w = WindowId::new(4).expect("id");
        let mut sessions = vec![
            Session::new("pending-4", "/p").with_window(w),
            Session::new("abc", "/p"),
        ];
        let pass = Reconciliation {
            updates: vec![update("abc", SessionStatus::Idle, None)],
            ..Reconciliation::default()
        };
        let outcome = apply_pass(&mut sessions, &pass);
        assert!(outcome.needs_persist);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "abc");
    }

    #[test]
    fn apply_pass_keeps_placeholders_when_degraded() {
        let w = WindowId::new(4).expect("id");
        let mut sessions = vec![Session::new("pending-4", "/p").with_window(w)];
        let pass = Reconciliation {
            degraded: Some(tabdeck_core::SnapshotError::Unavailable("no kitty".into())),
            ..Reconciliation::default()
        };
        let outcome = apply_pass(&mut sessions, &pass);
        assert!(!outcome.needs_persist);
        assert_eq!(sessions.len(), 1);
    }
}
