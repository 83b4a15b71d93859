//! Opening, focusing and closing session windows.

use tabdeck_core::WindowId;

use crate::error::KittyError;
use crate::executor::{HostCommandRunner, KittyCommandRunner};
use crate::snapshot::{AGENT_PROGRAM, RESUME_FLAG};
use crate::terminal::Terminal;

/// Window operations the runtime needs. Calls block on subprocesses.
pub trait WindowController: Send + Sync {
    /// Focus `existing` if it is still open, otherwise open a new tab resuming
    /// `session_id`. Returns the window id when the terminal reports one.
    fn open_session(
        &self,
        project_path: &str,
        session_id: &str,
        existing: Option<WindowId>,
        title: Option<&str>,
    ) -> Result<Option<WindowId>, KittyError>;

    /// Open a new tab running a fresh agent in `project_path`.
    fn new_session(
        &self,
        project_path: &str,
        title: Option<&str>,
    ) -> Result<Option<WindowId>, KittyError>;

    fn focus(&self, window: WindowId) -> Result<(), KittyError>;

    fn close(&self, window: WindowId) -> Result<(), KittyError>;

    /// Set the tab title of the tab containing `window`. Empty titles are ignored.
    fn set_title(&self, window: WindowId, title: &str) -> Result<(), KittyError>;
}

/// Shell command resuming a session inside its project directory.
pub fn resume_command(project_path: &str, session_id: &str) -> String {
    format!(
        "cd {} && {AGENT_PROGRAM} {RESUME_FLAG}{session_id}",
        shell_quote(project_path)
    )
}

pub fn new_command(project_path: &str) -> String {
    format!("cd {} && {AGENT_PROGRAM}", shell_quote(project_path))
}

/// Double-quote for POSIX shells.
fn shell_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Quote a string literal for AppleScript.
fn applescript_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn match_arg(window: WindowId) -> String {
    format!("id:{window}")
}

/// Opens windows in the configured terminal; focus/close/title go through
/// kitty remote control since only kitty windows carry ids.
#[derive(Debug, Clone)]
pub struct TerminalController<R> {
    runner: R,
    terminal: Terminal,
}

impl<R: KittyCommandRunner + HostCommandRunner> TerminalController<R> {
    /// `preferred` is resolved once here; `Auto` triggers detection.
    pub fn new(runner: R, preferred: Terminal) -> Self {
        let terminal = preferred.effective(&runner);
        Self { runner, terminal }
    }

    pub fn terminal(&self) -> Terminal {
        self.terminal
    }

    fn launch(
        &self,
        command: &str,
        project_path: &str,
        title: Option<&str>,
    ) -> Result<Option<WindowId>, KittyError> {
        match self.terminal {
            Terminal::Kitty => match self.launch_kitty(command, project_path, title) {
                Ok(window) => Ok(Some(window)),
                Err(e) => {
                    tracing::warn!(error = %e, "kitty @ launch failed, falling back to AppleScript");
                    self.paste_into_new_tab("kitty", &format!("{command}; exec zsh"))?;
                    Ok(None)
                }
            },
            Terminal::ITerm2 => {
                self.run_applescript(&iterm_script(command))?;
                Ok(None)
            }
            Terminal::Ghostty => {
                self.paste_into_new_tab("Ghostty", command)?;
                Ok(None)
            }
            Terminal::Apple | Terminal::Auto => {
                self.run_applescript(&apple_terminal_script(command))?;
                Ok(None)
            }
        }
    }

    fn launch_kitty(
        &self,
        command: &str,
        project_path: &str,
        title: Option<&str>,
    ) -> Result<WindowId, KittyError> {
        let wrapped = format!("{command}; exec zsh");
        let mut args = vec!["launch", "--type=tab", "--cwd", project_path];
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            args.extend(["--tab-title", title]);
        }
        args.extend(["zsh", "-i", "-c", wrapped.as_str()]);

        let output = KittyCommandRunner::run(&self.runner, &args)?;
        output
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(WindowId::new)
            .ok_or_else(|| KittyError::UnexpectedOutput {
                command: "kitty @ launch".to_string(),
                output: output.clone(),
            })
    }

    /// Keystroke automation for terminals without a scripting API for tabs:
    /// put the command on the clipboard, open a tab, paste, press return.
    fn paste_into_new_tab(&self, app: &str, command: &str) -> Result<(), KittyError> {
        self.runner.run_with_stdin("pbcopy", &[], command)?;
        self.run_applescript(&paste_script(app))
    }

    fn run_applescript(&self, script: &str) -> Result<(), KittyError> {
        self.runner.run_program("osascript", &["-e", script])?;
        Ok(())
    }
}

impl<R: KittyCommandRunner + HostCommandRunner> WindowController for TerminalController<R> {
    fn open_session(
        &self,
        project_path: &str,
        session_id: &str,
        existing: Option<WindowId>,
        title: Option<&str>,
    ) -> Result<Option<WindowId>, KittyError> {
        if let Some(window) = existing.filter(|_| self.terminal == Terminal::Kitty) {
            match self.focus(window) {
                Ok(()) => return Ok(Some(window)),
                Err(e) => tracing::debug!(%window, error = %e, "focus failed, opening new tab"),
            }
        }
        self.launch(&resume_command(project_path, session_id), project_path, title)
    }

    fn new_session(
        &self,
        project_path: &str,
        title: Option<&str>,
    ) -> Result<Option<WindowId>, KittyError> {
        self.launch(&new_command(project_path), project_path, title)
    }

    fn focus(&self, window: WindowId) -> Result<(), KittyError> {
        KittyCommandRunner::run(&self.runner, &["focus-window", "--match", &match_arg(window)])?;
        Ok(())
    }

    fn close(&self, window: WindowId) -> Result<(), KittyError> {
        KittyCommandRunner::run(&self.runner, &["close-window", "--match", &match_arg(window)])?;
        Ok(())
    }

    fn set_title(&self, window: WindowId, title: &str) -> Result<(), KittyError> {
        if title.is_empty() {
            return Ok(());
        }
        KittyCommandRunner::run(
            &self.runner,
            &["set-tab-title", "--match", &match_arg(window), title],
        )?;
        Ok(())
    }
}

// ─── AppleScript ──────────────────────────────────────────────────

fn iterm_script(command: &str) -> String {
    format!(
        r#"tell application "iTerm"
    activate
    tell current window
        create tab with default profile
        tell current session
            write text {}
        end tell
    end tell
end tell"#,
        applescript_quote(command)
    )
}

fn apple_terminal_script(command: &str) -> String {
    format!(
        r#"tell application "Terminal"
    activate
    tell application "System Events"
        keystroke "t" using command down
    end tell
    delay 0.2
    do script {} in front window
end tell"#,
        applescript_quote(command)
    )
}

fn paste_script(app: &str) -> String {
    let app = applescript_quote(app);
    format!(
        r#"tell application {app}
    activate
end tell
delay 0.1
tell application "System Events"
    tell process {app}
        keystroke "t" using command down
        delay 0.3
        keystroke "v" using command down
        delay 0.1
        keystroke return
    end tell
end tell"#
    )
}
