//! Session commands: open, new, close, rename, rm, terminal.
//!
//! Each runs on the main task, which owns the store for the command's
//! lifetime; window ids returned by the controller are claimed immediately.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use chrono::Utc;
use tabdeck_core::{SessionStatus, claim_window};
use tabdeck_kitty::{Terminal, WindowController};
use tabdeck_store::SessionStore;

use crate::context::DeckContext;

/// `tabdeck open <query>`
pub fn cmd_open(ctx: &mut DeckContext, query: &str) -> anyhow::Result<()> {
    ctx.refresh()?;
    let controller = ctx.controller();
    let name = open_session(&mut ctx.store, &controller, query)?;
    ctx.store.save()?;
    println!("opened {name}");
    Ok(())
}

/// Focus or resume, then bind the reported window. Returns the session name.
pub fn open_session(
    store: &mut SessionStore,
    controller: &impl WindowController,
    query: &str,
) -> anyhow::Result<String> {
    let session = store.find(query)?;
    if session.is_pending() {
        bail!("{} has not started a conversation yet", session.name);
    }
    let session_id = session.session_id.clone();
    let name = session.name.clone();
    let window = controller.open_session(
        &session.project_path,
        &session.session_id,
        session.window_id,
        Some(session.name.as_str()),
    )?;

    if window.is_some() {
        claim_window(store.sessions_mut(), &session_id, window);
    }
    let session = store.find_mut(&session_id)?;
    session.status = SessionStatus::Waiting;
    session.last_accessed_at = Utc::now();
    tracing::info!(session = %session_id, ?window, "session opened");
    Ok(name)
}

/// `tabdeck new <path> [--title T]`
pub fn cmd_new(ctx: &mut DeckContext, path: &Path, title: Option<&str>) -> anyhow::Result<()> {
    let project = resolve_project_dir(path)?;
    let controller = ctx.controller();
    let id = new_session(&mut ctx.store, &controller, &project, title)?;
    ctx.store.save()?;
    println!("started {id} in {project}");
    Ok(())
}

/// Launch a fresh agent and record a placeholder bound to its window.
/// Returns the placeholder's session id.
pub fn new_session(
    store: &mut SessionStore,
    controller: &impl WindowController,
    project: &str,
    title: Option<&str>,
) -> anyhow::Result<String> {
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    let window = controller.new_session(project, title)?;
    let session_id = store
        .insert_pending(project, title.map(str::to_string), window, Utc::now())
        .session_id
        .clone();
    if claim_window(store.sessions_mut(), &session_id, window) {
        tracing::debug!(session = %session_id, ?window, "window taken over from another session");
    }
    tracing::info!(session = %session_id, ?window, "session started");
    Ok(session_id)
}

fn resolve_project_dir(path: &Path) -> anyhow::Result<String> {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving current directory")?
            .join(path)
    };
    let resolved = absolute
        .canonicalize()
        .with_context(|| format!("{} does not exist", absolute.display()))?;
    if !resolved.is_dir() {
        bail!("{} is not a directory", resolved.display());
    }
    resolved
        .to_str()
        .map(str::to_string)
        .with_context(|| format!("{} is not valid UTF-8", resolved.display()))
}

/// `tabdeck close <query>`
pub fn cmd_close(ctx: &mut DeckContext, query: &str) -> anyhow::Result<()> {
    let controller = ctx.controller();
    let closed = close_session(&mut ctx.store, &controller, query)?;
    if closed {
        ctx.store.save()?;
        println!("closed");
    } else {
        println!("no open window");
    }
    Ok(())
}

/// Close the bound window and clear the handle. A window that is already
/// gone only logs. Returns false when nothing was bound.
pub fn close_session(
    store: &mut SessionStore,
    controller: &impl WindowController,
    query: &str,
) -> anyhow::Result<bool> {
    let session = store.find_mut(query)?;
    let Some(window) = session.window_id.take() else {
        return Ok(false);
    };
    session.status = SessionStatus::Idle;
    if let Err(e) = controller.close(window) {
        tracing::warn!(%window, error = %e, "close-window failed");
    }
    Ok(true)
}

/// `tabdeck rename <query> <name>`
pub fn cmd_rename(ctx: &mut DeckContext, query: &str, name: &str) -> anyhow::Result<()> {
    let controller = ctx.controller();
    rename_session(&mut ctx.store, &controller, query, name)?;
    ctx.store.save()?;
    println!("renamed to {}", name.trim());
    Ok(())
}

/// Set and lock the name; mirror it into the tab title when a window is bound.
pub fn rename_session(
    store: &mut SessionStore,
    controller: &impl WindowController,
    query: &str,
    name: &str,
) -> anyhow::Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }
    let Some(window) = store.rename(query, name)?.window_id else {
        return Ok(());
    };
    if let Err(e) = controller.set_title(window, name) {
        tracing::warn!(%window, error = %e, "set-tab-title failed");
    }
    Ok(())
}

/// `tabdeck pin <query>`
pub fn cmd_pin(ctx: &mut DeckContext, query: &str) -> anyhow::Result<()> {
    let session = ctx.store.toggle_pin(query)?;
    let verb = if session.pinned { "pinned" } else { "unpinned" };
    println!("{verb} {}", session.name);
    ctx.store.save()?;
    Ok(())
}

/// `tabdeck rm <query>`
pub fn cmd_rm(ctx: &mut DeckContext, query: &str) -> anyhow::Result<()> {
    let removed = ctx.store.delete(query)?;
    ctx.store.save()?;
    println!("removed {}", removed.name);
    Ok(())
}

/// `tabdeck terminal [NAME]`
pub fn cmd_terminal(ctx: &mut DeckContext, name: Option<&str>) -> anyhow::Result<()> {
    match name {
        None => {
            let preferred = ctx.preferred_terminal();
            let effective = ctx.controller().terminal();
            if preferred == effective {
                println!("{preferred}");
            } else {
                println!("{preferred} (using {effective})");
            }
        }
        Some(name) => {
            let terminal = parse_terminal(name)?;
            ctx.store.set_preferred_terminal(terminal.as_str());
            ctx.store.save()?;
            println!("preferred terminal set to {terminal}");
        }
    }
    Ok(())
}

/// Strict variant of [`Terminal::parse`]: typos are errors, not `Auto`.
fn parse_terminal(name: &str) -> anyhow::Result<Terminal> {
    let terminal = Terminal::parse(name);
    if terminal == Terminal::Auto && !name.trim().eq_ignore_ascii_case("auto") {
        let known: Vec<&str> = Terminal::ALL.iter().map(|t| t.as_str()).collect();
        bail!("unknown terminal {name:?}; expected one of {}", known.join(", "));
    }
    Ok(terminal)
}
