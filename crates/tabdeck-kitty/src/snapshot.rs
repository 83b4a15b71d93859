//! Bridge the `kitty @ ls` tree into flat [`WindowSnapshot`]s.

use tabdeck_core::{SnapshotError, WindowId, WindowSnapshot, WindowSnapshotProvider};
use tabdeck_core::{has_indicator, is_busy};

use crate::executor::KittyCommandRunner;
use crate::window_info::{KittyOsWindow, KittyTab, KittyWindowInfo, list_os_windows};

/// Flag (plus its separating space) that precedes a session id on the
/// agent's command line.
pub const RESUME_FLAG: &str = "--resume ";

/// Program name looked for on a window's command line.
pub const AGENT_PROGRAM: &str = "claude";

/// Session id following the first [`RESUME_FLAG`] in `command_line`.
///
/// Reads the maximal run of hex digits and hyphens; `None` when the flag is
/// absent or nothing id-shaped follows it. Works for direct argv and for a
/// flag buried inside a `zsh -c '...'` string.
pub fn extract_resume_id(command_line: &str) -> Option<&str> {
    let (_, rest) = command_line.split_once(RESUME_FLAG)?;
    let end = rest
        .find(|c: char| !(c.is_ascii_hexdigit() || c == '-'))
        .unwrap_or(rest.len());
    Some(&rest[..end]).filter(|id| !id.is_empty())
}

/// Whether the window hosts the agent program. Plain shells sitting in a
/// project directory are not agent windows.
pub fn is_agent_window(tab: &KittyTab, window: &KittyWindowInfo, command_line: &str) -> bool {
    command_line.contains(AGENT_PROGRAM)
        || has_indicator(&tab.title)
        || has_indicator(&window.title)
}

/// Flatten OS windows → tabs → windows, keeping agent windows only, in
/// listing order.
pub fn to_window_snapshots(os_windows: &[KittyOsWindow]) -> Vec<WindowSnapshot> {
    let mut out = Vec::new();
    for tab in os_windows.iter().flat_map(|o| &o.tabs) {
        for window in &tab.windows {
            let command_line = window.command_line();
            if !is_agent_window(tab, window, &command_line) {
                continue;
            }
            let Some(window_id) = WindowId::new(window.id) else {
                tracing::debug!(raw_id = window.id, "skipping window with invalid id");
                continue;
            };
            let title = if window.title.is_empty() {
                tab.title.clone()
            } else {
                window.title.clone()
            };
            out.push(WindowSnapshot {
                window_id,
                busy: is_busy(&title),
                title,
                explicit_session_id: extract_resume_id(&command_line).map(str::to_string),
                working_directory: window.cwd.clone(),
                command_line,
            });
        }
    }
    out
}

/// [`WindowSnapshotProvider`] backed by `kitty @ ls`.
#[derive(Debug, Clone)]
pub struct KittyWindowSource<R> {
    runner: R,
}

impl<R: KittyCommandRunner> KittyWindowSource<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: KittyCommandRunner> WindowSnapshotProvider for KittyWindowSource<R> {
    fn list_windows(&self) -> Result<Vec<WindowSnapshot>, SnapshotError> {
        let os_windows = list_os_windows(&self.runner)?;
        let windows = to_window_snapshots(&os_windows);
        tracing::trace!(count = windows.len(), "agent windows listed");
        Ok(windows)
    }
}
