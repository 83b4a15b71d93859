//! Session-to-window matcher.
//!
//! Tiers, first hit wins:
//!
//! 1. stored window id (unless already claimed this pass, or the window now
//!    resumes a different session)
//! 2. window whose command line resumes exactly this session id
//! 3. window without an explicit session id whose working directory is the
//!    project path or below it (weak); only for sessions backed by a
//!    transcript, so placeholders never pick up a stranger's window
//!
//! A successful match adds the window to `claimed`; claimed windows are
//! invisible to every later tier and session in the same pass.

use std::collections::HashSet;

use crate::types::{MatchTier, Session, SessionStatus, WindowId, WindowSnapshot};

/// A window bound to a session for the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMatch<'a> {
    pub window: &'a WindowSnapshot,
    pub tier: MatchTier,
}

impl WindowMatch<'_> {
    /// A matched window is never idle: busy title → running, else waiting.
    pub fn status(&self) -> SessionStatus {
        if self.window.busy {
            SessionStatus::Running
        } else {
            SessionStatus::Waiting
        }
    }

    pub fn is_strong(&self) -> bool {
        self.tier.is_strong()
    }
}

/// Visiting order for the working-directory tier: busy windows first,
/// provider order otherwise.
pub fn busy_first_order(windows: &[WindowSnapshot]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..windows.len()).collect();
    order.sort_by_key(|&i| !windows[i].busy);
    order
}

/// Find the best unclaimed window for `session`.
///
/// `dir_order` is the visiting order for the working-directory tier
/// (see [`busy_first_order`]); it must index into `windows`.
pub fn match_session<'a>(
    session: &Session,
    windows: &'a [WindowSnapshot],
    dir_order: &[usize],
    claimed: &mut HashSet<WindowId>,
) -> Option<WindowMatch<'a>> {
    let found = match_stored_handle(session, windows, claimed)
        .or_else(|| match_explicit_id(session, windows, claimed))
        .or_else(|| match_working_directory(session, windows, dir_order, claimed))?;
    claimed.insert(found.window.window_id);
    Some(found)
}

fn match_stored_handle<'a>(
    session: &Session,
    windows: &'a [WindowSnapshot],
    claimed: &HashSet<WindowId>,
) -> Option<WindowMatch<'a>> {
    let stored = session.window_id?;
    let window = windows.iter().find(|w| w.window_id == stored)?;
    if claimed.contains(&window.window_id) {
        return None;
    }
    if window
        .explicit_session_id
        .as_deref()
        .is_some_and(|id| id != session.session_id)
    {
        // Window was reused to resume another session; that session's own
        // explicit-id match will pick it up.
        return None;
    }
    Some(WindowMatch {
        window,
        tier: MatchTier::StoredHandle,
    })
}

fn match_explicit_id<'a>(
    session: &Session,
    windows: &'a [WindowSnapshot],
    claimed: &HashSet<WindowId>,
) -> Option<WindowMatch<'a>> {
    windows
        .iter()
        .filter(|w| !claimed.contains(&w.window_id))
        .find(|w| w.explicit_session_id.as_deref() == Some(session.session_id.as_str()))
        .map(|window| WindowMatch {
            window,
            tier: MatchTier::ExplicitSessionId,
        })
}

fn match_working_directory<'a>(
    session: &Session,
    windows: &'a [WindowSnapshot],
    dir_order: &[usize],
    claimed: &HashSet<WindowId>,
) -> Option<WindowMatch<'a>> {
    session.transcript_path.as_ref()?;
    dir_order
        .iter()
        .filter_map(|&i| windows.get(i))
        .filter(|w| w.explicit_session_id.is_none())
        .filter(|w| !claimed.contains(&w.window_id))
        .find(|w| path_contains(&session.project_path, &w.working_directory))
        .map(|window| WindowMatch {
            window,
            tier: MatchTier::WorkingDirectory,
        })
}

/// `path` equals `root` or lies below it on a `/` boundary.
///
/// An empty `root` matches nothing.
pub fn path_contains(root: &str, path: &str) -> bool {
    if root.is_empty() || path.is_empty() {
        return false;
    }
    let root = strip_trailing_slash(root);
    let path = strip_trailing_slash(path);
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn strip_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(id: u32, title: &str, resume: Option<&str>, cwd: &str) -> WindowSnapshot {
        WindowSnapshot {
            window_id: WindowId::new(i64::from(id)).expect("id"),
            title: title.to_string(),
            command_line: resume.map_or_else(
                || "claude".to_string(),
                |id| format!("zsh -i -c claude --resume {id}"),
            ),
            working_directory: cwd.to_string(),
            explicit_session_id: resume.map(str::to_string),
            busy: crate::title::is_busy(title),
        }
    }

    fn wid(id: u32) -> WindowId {
        WindowId::new(i64::from(id)).expect("id")
    }

    /// A discovered session; the directory tier needs a transcript.
    fn transcribed(sid: &str, project: &str) -> Session {
        let mut session = Session::new(sid, project);
        session.transcript_path = Some(format!("/t/{sid}.jsonl").into());
        session
    }

    fn run(session: &Session, windows: &[WindowSnapshot]) -> Option<(WindowId, MatchTier)> {
        let order = busy_first_order(windows);
        let mut claimed = HashSet::new();
        match_session(session, windows, &order, &mut claimed)
            .map(|m| (m.window.window_id, m.tier))
    }

    #[test]
    fn stored_handle_wins_over_explicit_id() {
        let session = Session::new("abc", "/p").with_window(wid(3));
        let windows = [
            window(1, "other", Some("abc"), "/p"),
            window(3, "mine", None, "/elsewhere"),
        ];
        assert_eq!(run(&session, &windows), Some((wid(3), MatchTier::StoredHandle)));
    }

    #[test]
    fn stored_handle_with_same_explicit_id_matches() {
        let session = Session::new("abc", "/p").with_window(wid(3));
        let windows = [window(3, "mine", Some("abc"), "/p")];
        assert_eq!(run(&session, &windows), Some((wid(3), MatchTier::StoredHandle)));
    }

    #[test]
    fn repurposed_stored_handle_falls_through() {
        let session = Session::new("abc", "/p").with_window(wid(7));
        let windows = [window(7, "⠂ other", Some("xyz"), "/p")];
        assert_eq!(run(&session, &windows), None);
    }

    #[test]
    fn repurposed_stored_handle_falls_through_to_directory() {
        let session = transcribed("abc", "/p").with_window(wid(7));
        let windows = [
            window(7, "other", Some("xyz"), "/p"),
            window(8, "plain", None, "/p/sub"),
        ];
        assert_eq!(
            run(&session, &windows),
            Some((wid(8), MatchTier::WorkingDirectory))
        );
    }

    #[test]
    fn claimed_stored_handle_is_stale() {
        let session = Session::new("abc", "/p").with_window(wid(7));
        let windows = [window(7, "t", None, "/p")];
        let order = busy_first_order(&windows);
        let mut claimed = HashSet::from([wid(7)]);
        assert!(match_session(&session, &windows, &order, &mut claimed).is_none());
    }

    #[test]
    fn explicit_id_takes_first_in_provider_order() {
        let session = Session::new("abc", "/p");
        let windows = [
            window(1, "first", Some("abc"), "/a"),
            window(2, "⠂ second", Some("abc"), "/b"),
        ];
        assert_eq!(
            run(&session, &windows),
            Some((wid(1), MatchTier::ExplicitSessionId))
        );
    }

    #[test]
    fn directory_tier_skips_windows_with_explicit_ids() {
        let session = transcribed("abc", "/p");
        let windows = [window(1, "t", Some("other"), "/p")];
        assert_eq!(run(&session, &windows), None);
    }

    #[test]
    fn placeholder_ignores_foreign_window_in_same_directory() {
        let placeholder = Session::new("pending-9", "/p").with_name("feature");
        let windows = [window(2, "⠂ someone else", None, "/p")];
        assert_eq!(run(&placeholder, &windows), None);

        let discovered = transcribed("abc", "/p");
        assert_eq!(
            run(&discovered, &windows),
            Some((wid(2), MatchTier::WorkingDirectory))
        );
    }

    #[test]
    fn directory_tier_prefers_busy_window() {
        let session = transcribed("abc", "/p");
        let windows = [window(1, "quiet", None, "/p"), window(2, "⠄ busy", None, "/p")];
        assert_eq!(
            run(&session, &windows),
            Some((wid(2), MatchTier::WorkingDirectory))
        );
    }

    #[test]
    fn match_claims_window() {
        let session = transcribed("abc", "/p");
        let windows = [window(1, "t", None, "/p")];
        let order = busy_first_order(&windows);
        let mut claimed = HashSet::new();
        let m = match_session(&session, &windows, &order, &mut claimed).expect("match");
        assert!(!m.is_strong());
        assert!(claimed.contains(&wid(1)));

        let other = transcribed("def", "/p");
        assert!(match_session(&other, &windows, &order, &mut claimed).is_none());
    }

    #[test]
    fn status_from_title() {
        let busy = window(1, "⠂ building", None, "/p");
        let quiet = window(2, "idle-title", None, "/p");
        let unsaved = window(3, "✳ edits", None, "/p");
        fn m(window: &WindowSnapshot) -> WindowMatch<'_> {
            WindowMatch {
                window,
                tier: MatchTier::StoredHandle,
            }
        }
        assert_eq!(m(&busy).status(), SessionStatus::Running);
        assert_eq!(m(&quiet).status(), SessionStatus::Waiting);
        assert_eq!(m(&unsaved).status(), SessionStatus::Waiting);
    }

    #[test]
    fn busy_first_order_is_stable() {
        let windows = [
            window(1, "a", None, "/"),
            window(2, "⠂ b", None, "/"),
            window(3, "c", None, "/"),
            window(4, "⠄ d", None, "/"),
        ];
        assert_eq!(busy_first_order(&windows), vec![1, 3, 0, 2]);
    }

    #[test]
    fn path_contains_boundaries() {
        assert!(path_contains("/p", "/p"));
        assert!(path_contains("/p", "/p/sub/dir"));
        assert!(path_contains("/p/", "/p/sub"));
        assert!(path_contains("/p", "/p/"));
        assert!(!path_contains("/p", "/pp"));
        assert!(!path_contains("/p/sub", "/p"));
        assert!(!path_contains("", "/p"));
        assert!(!path_contains("/p", ""));
        assert!(path_contains("/", "/anything"));
    }
}
