//! Command runner traits and the subprocess executor behind them.
//!
//! Everything that talks to the terminal goes through these traits so tests
//! can inject canned output.

use std::process::{Command, Output};

use crate::error::KittyError;

/// Runs `kitty @ <args>` (remote control) and returns stdout.
pub trait KittyCommandRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> Result<String, KittyError>;
}

impl<T: KittyCommandRunner + ?Sized> KittyCommandRunner for &T {
    fn run(&self, args: &[&str]) -> Result<String, KittyError> {
        (**self).run(args)
    }
}

/// Runs an arbitrary host program (`osascript`, `pgrep`, `pbcopy`).
pub trait HostCommandRunner: Send + Sync {
    fn run_program(&self, program: &str, args: &[&str]) -> Result<String, KittyError>;

    /// Like [`run_program`](Self::run_program) but feeds `input` on stdin.
    fn run_with_stdin(&self, program: &str, args: &[&str], input: &str)
    -> Result<String, KittyError>;
}

impl<T: HostCommandRunner + ?Sized> HostCommandRunner for &T {
    fn run_program(&self, program: &str, args: &[&str]) -> Result<String, KittyError> {
        (**self).run_program(program, args)
    }

    fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<String, KittyError> {
        (**self).run_with_stdin(program, args, input)
    }
}

/// Real executor using `std::process::Command`.
#[derive(Debug, Clone)]
pub struct KittyExecutor {
    kitty_bin: String,
    listen_on: Option<String>,
}

impl KittyExecutor {
    pub fn new(kitty_bin: impl Into<String>) -> Self {
        Self {
            kitty_bin: kitty_bin.into(),
            listen_on: None,
        }
    }

    /// Address of a kitty remote-control socket (`unix:/tmp/kitty-1234`).
    /// Without it kitty falls back to the controlling terminal.
    #[must_use]
    pub fn with_listen_on(mut self, address: impl Into<String>) -> Self {
        let address = address.into();
        self.listen_on = (!address.is_empty()).then_some(address);
        self
    }

    pub fn kitty_bin(&self) -> &str {
        &self.kitty_bin
    }
}

impl Default for KittyExecutor {
    fn default() -> Self {
        Self::new("kitty")
    }
}

impl KittyCommandRunner for KittyExecutor {
    fn run(&self, args: &[&str]) -> Result<String, KittyError> {
        let mut cmd = Command::new(&self.kitty_bin);
        cmd.arg("@");
        if let Some(ref address) = self.listen_on {
            cmd.args(["--to", address]);
        }
        cmd.args(args);
        tracing::trace!(bin = %self.kitty_bin, ?args, "kitty @");
        let output = cmd.output()?;
        stdout_or_error(&self.kitty_bin, output)
    }
}

impl HostCommandRunner for KittyExecutor {
    fn run_program(&self, program: &str, args: &[&str]) -> Result<String, KittyError> {
        let output = Command::new(program).args(args).output()?;
        stdout_or_error(program, output)
    }

    fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<String, KittyError> {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        stdout_or_error(program, output)
    }
}

fn stdout_or_error(program: &str, output: Output) -> Result<String, KittyError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KittyError::CommandFailed {
            program: program.to_string(),
            detail: format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
