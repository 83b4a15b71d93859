//! tabdeck-core: session status reconciliation.
//!
//! Matches tracked agent sessions against a snapshot of open terminal windows
//! and computes, per session, a status, a window binding and an optional
//! display-name resync. Window enumeration is injected through
//! [`WindowSnapshotProvider`]; everything else here is pure.

pub mod apply;
pub mod error;
pub mod matcher;
pub mod reconcile;
pub mod title;
pub mod types;

pub use apply::{ApplyOutcome, apply_updates, claim_window, prune_closed_pending};
pub use error::{SnapshotError, UnknownStatus};
pub use matcher::{WindowMatch, busy_first_order, match_session, path_contains};
pub use reconcile::{
    ActivitySource, ReconcileMode, Reconciler, Reconciliation, WindowSnapshotProvider, compute,
};
pub use title::{TitleIndicator, classify_indicator, has_indicator, is_busy, strip_indicator};
pub use types::{
    MatchTier, PENDING_SESSION_PREFIX, Session, SessionStatus, StatusUpdate, WindowId,
    WindowSnapshot,
};
