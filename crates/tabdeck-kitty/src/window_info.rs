//! `kitty @ ls` JSON model and parser.

use serde::{Deserialize, Serialize};

use crate::error::KittyError;
use crate::executor::KittyCommandRunner;

/// One top-level OS window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KittyOsWindow {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub tabs: Vec<KittyTab>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KittyTab {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub windows: Vec<KittyWindowInfo>,
}

/// A single kitty window (what the rest of the system calls a window).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KittyWindowInfo {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    /// argv the window was launched with.
    #[serde(default)]
    pub cmdline: Vec<String>,
    #[serde(default)]
    pub cwd: String,
}

impl KittyWindowInfo {
    pub fn command_line(&self) -> String {
        self.cmdline.join(" ")
    }
}

/// Execute `kitty @ ls` and parse the output.
pub fn list_os_windows(runner: &impl KittyCommandRunner) -> Result<Vec<KittyOsWindow>, KittyError> {
    let output = runner.run(&["ls"])?;
    parse_ls_output(&output)
}

/// Parse the raw JSON printed by `kitty @ ls`. Blank output means no windows.
pub fn parse_ls_output(output: &str) -> Result<Vec<KittyOsWindow>, KittyError> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::FakeRunner;

    const LS_SAMPLE: &str = r#"[
      {
        "id": 1,
        "is_focused": true,
        "tabs": [
          {
            "id": 1,
            "title": "⠂ fixing tests",
            "layout": "stack",
            "windows": [
              {
                "id": 3,
                "title": "⠂ fixing tests",
                "pid": 4242,
                "cwd": "/Users/me/src/app",
                "cmdline": [
                  "zsh", "-i", "-c",
                  "cd \"/Users/me/src/app\" && claude --resume 0b8e7f3c-1d2a-4c5b-9e6f-7a8b9c0d1e2f; exec zsh"
                ],
                "env": {"TERM": "xterm-kitty"},
                "foreground_processes": []
              },
              {
                "id": 4,
                "title": "zsh",
                "cwd": "/tmp",
                "cmdline": ["/bin/zsh", "-l"]
              }
            ]
          }
        ]
      }
    ]"#;

    #[test]
    fn parse_nested_listing() {
        let os_windows = parse_ls_output(LS_SAMPLE).expect("parse");
        assert_eq!(os_windows.len(), 1);
        let tab = &os_windows[0].tabs[0];
        assert_eq!(tab.title, "⠂ fixing tests");
        assert_eq!(tab.windows.len(), 2);

        let w = &tab.windows[0];
        assert_eq!(w.id, 3);
        assert_eq!(w.cwd, "/Users/me/src/app");
        assert!(w.command_line().starts_with("zsh -i -c cd "));
        assert!(w.command_line().contains("--resume 0b8e7f3c"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let os_windows = parse_ls_output(r#"[{"tabs":[{"windows":[{"id":9}]}]}]"#).expect("parse");
        let w = &os_windows[0].tabs[0].windows[0];
        assert_eq!(w.id, 9);
        assert!(w.title.is_empty());
        assert!(w.cmdline.is_empty());
        assert_eq!(w.command_line(), "");
    }

    #[test]
    fn blank_output_is_empty() {
        assert!(parse_ls_output("").expect("parse").is_empty());
        assert!(parse_ls_output("  \n").expect("parse").is_empty());
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            parse_ls_output("Error: remote control disabled"),
            Err(KittyError::Parse(_))
        ));
    }

    #[test]
    fn list_uses_ls_subcommand() {
        let fake = FakeRunner::with_responses([Ok(LS_SAMPLE.to_string())]);
        let os_windows = list_os_windows(&fake).expect("list");
        assert_eq!(os_windows[0].tabs[0].windows.len(), 2);
        assert_eq!(fake.calls(), vec!["@ ls"]);
    }
}
