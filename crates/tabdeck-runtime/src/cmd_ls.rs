//! `tabdeck ls`: one aggressive reconcile pass, then a table or JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabdeck_core::{ReconcileMode, Session, SessionStatus, WindowId};
use tabdeck_store::TranscriptActivity;

use crate::context::{DeckContext, apply_pass, relative_time, short_path, truncate};

const NAME_WIDTH: usize = 32;
const PATH_WIDTH: usize = 28;

/// Entry point for `tabdeck ls`.
pub async fn cmd_ls(mut ctx: DeckContext, json: bool, use_color: bool) -> anyhow::Result<()> {
    sync_once(&mut ctx, ReconcileMode::Aggressive).await?;

    if json {
        let rows: Vec<SessionRow<'_>> = ctx.store.sessions().iter().map(SessionRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        let output = format_table(ctx.store.sessions(), Utc::now(), use_color);
        if output.is_empty() {
            println!("(no sessions)");
        } else {
            print!("{output}");
        }
    }
    Ok(())
}

/// Discover, reconcile once, apply and save if needed. The window listing
/// runs on the blocking pool.
pub async fn sync_once(ctx: &mut DeckContext, mode: ReconcileMode) -> anyhow::Result<()> {
    let mut persist = ctx.refresh()?;

    let reconciler = ctx.reconciler();
    let snapshot = ctx.store.sessions().to_vec();
    let pass = tokio::task::spawn_blocking(move || {
        reconciler.reconcile(&snapshot, &TranscriptActivity, mode)
    })
    .await?;

    let outcome = apply_pass(ctx.store.sessions_mut(), &pass);
    persist |= outcome.needs_persist;
    if persist {
        ctx.store.save()?;
    }
    Ok(())
}

/// JSON view of a session, including the runtime-only fields.
#[derive(Debug, Serialize)]
pub struct SessionRow<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub status: SessionStatus,
    pub project_path: &'a str,
    pub session_id: &'a str,
    pub window_id: Option<WindowId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<&'a str>,
    pub last_accessed_at: DateTime<Utc>,
    pub renamed: bool,
    pub pinned: bool,
    pub pending: bool,
}

impl<'a> From<&'a Session> for SessionRow<'a> {
    fn from(s: &'a Session) -> Self {
        Self {
            id: &s.id,
            name: &s.name,
            status: s.status,
            project_path: &s.project_path,
            session_id: &s.session_id,
            window_id: s.window_id,
            git_branch: s.git_branch.as_deref(),
            last_accessed_at: s.last_accessed_at,
            renamed: s.name_locked,
            pinned: s.pinned,
            pending: s.is_pending(),
        }
    }
}

fn status_cell(status: SessionStatus, use_color: bool) -> String {
    let symbol = status.symbol();
    if !use_color {
        return symbol.to_string();
    }
    match status {
        SessionStatus::Running => format!("\x1b[32m{symbol}\x1b[0m"),
        SessionStatus::Waiting => format!("\x1b[1;33m{symbol}\x1b[0m"),
        SessionStatus::Idle => format!("\x1b[2m{symbol}\x1b[0m"),
    }
}

/// One line per session in store order:
/// `<symbol> <name>  <path>  <age>  <window> [branch]`.
pub fn format_table(sessions: &[Session], now: DateTime<Utc>, use_color: bool) -> String {
    let mut out = String::new();
    for s in sessions {
        let name = truncate(&s.name, NAME_WIDTH);
        let path = truncate(&short_path(&s.project_path), PATH_WIDTH);
        let age = if s.is_pending() {
            "new".to_string()
        } else {
            relative_time((now - s.last_accessed_at).num_seconds())
        };
        let window = s
            .window_id
            .map_or_else(|| "-".to_string(), |w| format!("#{w}"));
        let branch = s.git_branch.as_deref().map_or_else(String::new, |b| {
            if use_color {
                format!("  \x1b[36m[{b}]\x1b[0m")
            } else {
                format!("  [{b}]")
            }
        });
        let status = status_cell(s.status, use_color);

        if use_color {
            out.push_str(&format!(
                "{status} \x1b[1m{name:<NAME_WIDTH$}\x1b[0m  {path:<PATH_WIDTH$}  \x1b[2m{age:>8}\x1b[0m  {window:>5}{branch}\n"
            ));
        } else {
            out.push_str(&format!(
                "{status} {name:<NAME_WIDTH$}  {path:<PATH_WIDTH$}  {age:>8}  {window:>5}{branch}\n"
            ));
        }
    }
    out
}
