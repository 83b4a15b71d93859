//! Merging freshly discovered sessions into the stored records.

use std::collections::{HashMap, HashSet};

use tabdeck_core::Session;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Merged records, ascending by `order`.
    pub sessions: Vec<Session>,
    /// Something worth persisting changed (records added, adopted, dropped
    /// or renumbered).
    pub changed: bool,
}

fn key(s: &Session) -> (&str, &str) {
    (s.session_id.as_str(), normalize(&s.project_path))
}

fn normalize(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Combine `stored` records with `discovered` transcripts.
///
/// - Stored records that are rediscovered keep their metadata; transcript
///   path, last access and branch are refreshed.
/// - A new session adopts a pending placeholder from the same project
///   directory (name, lock, window, order), most recent session first.
/// - Remaining new sessions are ordered above everything stored, most
///   recent first.
/// - Stored non-placeholder records with no transcript are dropped;
///   unadopted placeholders are kept.
/// - Zero or duplicate orders are renumbered 1.. by recency.
pub fn merge_sessions(stored: Vec<Session>, discovered: Vec<Session>) -> MergeOutcome {
    let stored_count = stored.len();
    let mut changed = false;

    let mut by_key: HashMap<(String, String), Session> = HashMap::with_capacity(stored_count);
    let mut pending: Vec<Session> = Vec::new();
    for s in stored {
        if s.is_pending() {
            pending.push(s);
        } else {
            let (sid, path) = key(&s);
            by_key.insert((sid.to_string(), path.to_string()), s);
        }
    }
    // New records go strictly below every existing order, and never on 0.
    let top = by_key
        .values()
        .chain(&pending)
        .map(|s| s.order)
        .min()
        .unwrap_or(0)
        .min(0);

    let mut result: Vec<Session> = Vec::with_capacity(discovered.len() + pending.len());
    let mut fresh: Vec<Session> = Vec::new();
    for d in discovered {
        let (sid, path) = key(&d);
        match by_key.remove(&(sid.to_string(), path.to_string())) {
            Some(mut s) => {
                s.transcript_path = d.transcript_path;
                s.last_accessed_at = d.last_accessed_at;
                s.git_branch = d.git_branch;
                result.push(s);
            }
            None => fresh.push(d),
        }
    }

    if !by_key.is_empty() {
        tracing::debug!(count = by_key.len(), "dropping sessions whose transcripts are gone");
        changed = true;
    }

    fresh.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
    let mut unadopted = Vec::with_capacity(fresh.len());
    for mut s in fresh {
        changed = true;
        match pending
            .iter()
            .position(|p| normalize(&p.project_path) == normalize(&s.project_path))
        {
            Some(i) => {
                let placeholder = pending.remove(i);
                tracing::info!(
                    placeholder = %placeholder.session_id,
                    session = %s.session_id,
                    "placeholder adopted by discovered session"
                );
                s.name = placeholder.name;
                s.name_locked = placeholder.name_locked;
                s.window_id = placeholder.window_id;
                s.status = placeholder.status;
                s.order = placeholder.order;
                s.pinned = placeholder.pinned;
                s.extra = placeholder.extra;
                result.push(s);
            }
            None => unadopted.push(s),
        }
    }
    let n = i64::try_from(unadopted.len()).unwrap_or(i64::MAX);
    for (i, mut s) in (0_i64..).zip(unadopted) {
        s.order = top - n + i;
        result.push(s);
    }
    result.extend(pending);

    changed |= renumber_if_needed(&mut result);
    result.sort_by_key(|s| s.order);

    if result.len() != stored_count {
        changed = true;
    }
    MergeOutcome {
        sessions: result,
        changed,
    }
}

/// Legacy records carry order 0 or share orders; give everything a unique
/// 1.. order by recency. Returns whether any order changed.
fn renumber_if_needed(sessions: &mut [Session]) -> bool {
    let mut seen = HashSet::with_capacity(sessions.len());
    let clean = sessions.iter().all(|s| s.order != 0 && seen.insert(s.order));
    if clean {
        return false;
    }
    sessions.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
    let mut any = false;
    for (order, s) in (1_i64..).zip(sessions.iter_mut()) {
        any |= s.order != order;
        s.order = order;
    }
    any
}
