//! Reconciliation engine.
//!
//! Computes one [`StatusUpdate`] per session from a window snapshot without
//! mutating anything; [`crate::apply`] writes the results back later on the
//! thread that owns the session records.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::SnapshotError;
use crate::matcher::{WindowMatch, busy_first_order, match_session};
use crate::title::strip_indicator;
use crate::types::{MatchTier, Session, SessionStatus, StatusUpdate, WindowId, WindowSnapshot};

/// Source of open terminal windows. Implementations shell out to the
/// terminal and may block.
pub trait WindowSnapshotProvider: Send + Sync {
    fn list_windows(&self) -> Result<Vec<WindowSnapshot>, SnapshotError>;
}

impl<T: WindowSnapshotProvider + ?Sized> WindowSnapshotProvider for &T {
    fn list_windows(&self) -> Result<Vec<WindowSnapshot>, SnapshotError> {
        (**self).list_windows()
    }
}

impl<T: WindowSnapshotProvider + ?Sized> WindowSnapshotProvider for std::sync::Arc<T> {
    fn list_windows(&self) -> Result<Vec<WindowSnapshot>, SnapshotError> {
        (**self).list_windows()
    }
}

/// Per-session "last active" signal used only to order matching.
pub trait ActivitySource {
    fn last_active(&self, session: &Session) -> Option<DateTime<Utc>>;
}

impl<F> ActivitySource for F
where
    F: Fn(&Session) -> Option<DateTime<Utc>>,
{
    fn last_active(&self, session: &Session) -> Option<DateTime<Utc>> {
        self(session)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileMode {
    /// Weak (directory-only) matches drive status only.
    #[default]
    Normal,
    /// Weak matches may also set the window id and the name. Used on cold
    /// start, when directory matches are the best information available.
    Aggressive,
}

impl ReconcileMode {
    /// Whether a match of `tier` is recorded as the session's window and
    /// may drive a rename.
    pub fn propagates(self, tier: MatchTier) -> bool {
        tier.is_strong() || self == Self::Aggressive
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// One update per input session, in matching (recency) order.
    pub updates: Vec<StatusUpdate>,
    /// Every window id present in the snapshot.
    pub live_windows: HashSet<WindowId>,
    pub names_changed: bool,
    pub any_changed: bool,
    /// Set when the snapshot could not be taken and the pass ran against
    /// zero windows.
    pub degraded: Option<SnapshotError>,
}

/// Takes a window snapshot and reconciles sessions against it.
#[derive(Debug, Clone)]
pub struct Reconciler<P> {
    provider: P,
}

impl<P: WindowSnapshotProvider> Reconciler<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run one pass. Blocking (queries the terminal); never fails: an
    /// unreachable terminal counts as zero open windows.
    pub fn reconcile<A: ActivitySource + ?Sized>(
        &self,
        sessions: &[Session],
        activity: &A,
        mode: ReconcileMode,
    ) -> Reconciliation {
        let (windows, degraded) = match self.provider.list_windows() {
            Ok(windows) => (windows, None),
            Err(e) => {
                tracing::warn!(error = %e, "window listing failed, treating as zero windows");
                (Vec::new(), Some(e))
            }
        };

        let mut result = compute(sessions, &windows, activity, mode);
        result.degraded = degraded;

        tracing::debug!(
            sessions = sessions.len(),
            windows = windows.len(),
            ?mode,
            names_changed = result.names_changed,
            any_changed = result.any_changed,
            "reconciled"
        );
        result
    }
}

/// Pure reconciliation against an already-taken snapshot.
pub fn compute<A: ActivitySource + ?Sized>(
    sessions: &[Session],
    windows: &[WindowSnapshot],
    activity: &A,
    mode: ReconcileMode,
) -> Reconciliation {
    let live_windows: HashSet<WindowId> = windows.iter().map(|w| w.window_id).collect();
    let dir_order = busy_first_order(windows);
    let mut claimed = HashSet::new();

    let matched: Vec<(&Session, Option<WindowMatch<'_>>)> = recency_order(sessions, activity)
        .into_iter()
        .map(|idx| {
            let session = &sessions[idx];
            (
                session,
                match_session(session, windows, &dir_order, &mut claimed),
            )
        })
        .collect();

    // Window ids recorded on some session this pass. Propagated matches are
    // registered first so they always beat a carried-over id.
    let mut taken: HashSet<WindowId> = matched
        .iter()
        .filter_map(|(_, found)| found.as_ref())
        .filter(|m| mode.propagates(m.tier))
        .map(|m| m.window.window_id)
        .collect();

    let mut result = Reconciliation {
        updates: Vec::with_capacity(matched.len()),
        live_windows,
        ..Reconciliation::default()
    };

    for (session, found) in matched {
        let propagated = found.filter(|m| mode.propagates(m.tier));

        let window_id = match propagated {
            Some(m) => Some(m.window.window_id),
            None => carry_prior_window(session, windows, &mut taken),
        };

        let name = propagated
            .filter(|_| !session.name_locked)
            .map(|m| strip_indicator(&m.window.title))
            .filter(|clean| !clean.is_empty() && *clean != session.name)
            .map(str::to_string);

        let update = StatusUpdate {
            session_id: session.session_id.clone(),
            status: found.map_or(SessionStatus::Idle, |m| m.status()),
            old_status: session.status,
            name,
            old_name: session.name.clone(),
            window_id,
            old_window_id: session.window_id,
            tier: found.map(|m| m.tier),
        };

        tracing::trace!(
            session = %update.session_id,
            tier = ?update.tier,
            window = ?update.window_id,
            status = %update.status,
            "session matched"
        );

        result.names_changed |= update.name.is_some();
        result.any_changed |= update.is_change();
        result.updates.push(update);
    }

    result
}

/// Keep the session's previous window id unless it is demonstrably stale:
/// recorded on another session this pass, or now resuming another session.
fn carry_prior_window(
    session: &Session,
    windows: &[WindowSnapshot],
    taken: &mut HashSet<WindowId>,
) -> Option<WindowId> {
    let prior = session.window_id?;
    let repurposed = windows.iter().any(|w| {
        w.window_id == prior
            && w
                .explicit_session_id
                .as_deref()
                .is_some_and(|id| id != session.session_id)
    });
    if repurposed || !taken.insert(prior) {
        return None;
    }
    Some(prior)
}

/// Session indices, most recently active first; sessions without a signal
/// last, ties in input order.
fn recency_order<A: ActivitySource + ?Sized>(sessions: &[Session], activity: &A) -> Vec<usize> {
    let stamps: Vec<Option<DateTime<Utc>>> =
        sessions.iter().map(|s| activity.last_active(s)).collect();
    let mut order: Vec<usize> = (0..sessions.len()).collect();
    order.sort_by(|&a, &b| stamps[b].cmp(&stamps[a]));
    order
}
