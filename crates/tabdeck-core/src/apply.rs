//! Writing reconciliation results back into session records.
//!
//! Everything here mutates sessions in place and must run on the task that
//! owns them, never concurrently with another apply or a user edit.

use std::collections::{HashMap, HashSet};

use crate::types::{Session, StatusUpdate, WindowId};

/// What [`apply_updates`] touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Anything visible changed (status, name or window).
    pub changed: bool,
    /// A persisted field changed; the caller should save.
    pub needs_persist: bool,
}

impl ApplyOutcome {
    fn persisted(&mut self) {
        self.changed = true;
        self.needs_persist = true;
    }
}

/// Apply one pass of updates to `sessions`.
///
/// Sessions without an update keep their fields, except that a window id now
/// claimed by a different session is cleared.
pub fn apply_updates(sessions: &mut [Session], updates: &[StatusUpdate]) -> ApplyOutcome {
    let by_session: HashMap<&str, &StatusUpdate> = updates
        .iter()
        .map(|u| (u.session_id.as_str(), u))
        .collect();
    let claims: HashMap<WindowId, &str> = updates
        .iter()
        .filter_map(|u| u.window_id.map(|w| (w, u.session_id.as_str())))
        .collect();

    let mut outcome = ApplyOutcome::default();
    for session in sessions.iter_mut() {
        match by_session.get(session.session_id.as_str()) {
            Some(update) => apply_one(session, update, &mut outcome),
            None => {
                let Some(held) = session.window_id else {
                    continue;
                };
                if claims
                    .get(&held)
                    .is_some_and(|owner| *owner != session.session_id)
                {
                    tracing::debug!(
                        session = %session.session_id,
                        window = %held,
                        "clearing window now held by another session"
                    );
                    session.window_id = None;
                    outcome.persisted();
                }
            }
        }
    }
    outcome
}

fn apply_one(session: &mut Session, update: &StatusUpdate, outcome: &mut ApplyOutcome) {
    if session.status != update.status {
        session.status = update.status;
        outcome.changed = true;
    }

    // A user rename may have landed between compute and apply.
    let rename = update
        .name
        .as_deref()
        .filter(|n| !n.is_empty() && !session.name_locked && session.name != *n);
    if let Some(name) = rename {
        session.name = name.to_string();
        outcome.persisted();
    }

    if session.window_id != update.window_id {
        session.window_id = update.window_id;
        outcome.persisted();
    }
}

/// Bind `window` to the session `claimer`, taking it away from any other
/// session that holds it. Returns whether another session was modified.
///
/// `None` is a no-op.
pub fn claim_window(sessions: &mut [Session], claimer: &str, window: Option<WindowId>) -> bool {
    let Some(window) = window else {
        return false;
    };

    let mut modified_others = false;
    for session in sessions.iter_mut() {
        if session.session_id == claimer {
            session.window_id = Some(window);
        } else if session.window_id == Some(window) {
            session.window_id = None;
            modified_others = true;
        }
    }
    modified_others
}

/// Drop placeholder sessions whose window is gone. Returns whether any were
/// removed.
///
/// A placeholder without a window id is kept: its window has not been
/// recorded yet.
pub fn prune_closed_pending(sessions: &mut Vec<Session>, live: &HashSet<WindowId>) -> bool {
    let before = sessions.len();
    sessions.retain(|s| {
        let closed = s.is_pending() && s.window_id.is_some_and(|w| !live.contains(&w));
        if closed {
            tracing::info!(session = %s.session_id, "removing placeholder for closed window");
        }
        !closed
    });
    sessions.len() != before
}
