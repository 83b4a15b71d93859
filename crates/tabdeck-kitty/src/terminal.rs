//! Terminal emulator preference and detection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::executor::HostCommandRunner;

/// Terminal used to open session windows. Only kitty yields window ids.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Terminal {
    /// Detect at startup.
    #[default]
    Auto,
    ITerm2,
    Ghostty,
    Kitty,
    /// Apple's Terminal.app.
    Apple,
}

impl Terminal {
    pub const ALL: [Self; 5] = [
        Self::Auto,
        Self::ITerm2,
        Self::Ghostty,
        Self::Kitty,
        Self::Apple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::ITerm2 => "iTerm2",
            Self::Ghostty => "Ghostty",
            Self::Kitty => "Kitty",
            Self::Apple => "Terminal",
        }
    }

    /// Case-insensitive; anything unrecognised is [`Terminal::Auto`].
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or_default()
    }

    /// Detect the running terminal from `TERM_PROGRAM`, then by probing for
    /// running apps. Falls back to Apple Terminal.
    pub fn detect_with(term_program: Option<&str>, is_running: impl Fn(&str) -> bool) -> Self {
        let from_env = match term_program.map(str::to_ascii_lowercase).as_deref() {
            Some("iterm.app") => Some(Self::ITerm2),
            Some("ghostty") => Some(Self::Ghostty),
            Some("apple_terminal") => Some(Self::Apple),
            Some("kitty") => Some(Self::Kitty),
            _ => None,
        };
        if let Some(t) = from_env {
            return t;
        }
        [
            ("iTerm", Self::ITerm2),
            ("Ghostty", Self::Ghostty),
            ("kitty", Self::Kitty),
        ]
        .into_iter()
        .find(|(app, _)| is_running(app))
        .map_or(Self::Apple, |(_, t)| t)
    }

    pub fn detect(host: &impl HostCommandRunner) -> Self {
        let term_program = std::env::var("TERM_PROGRAM").ok();
        let detected = Self::detect_with(term_program.as_deref(), |app| {
            host.run_program("pgrep", &["-x", app]).is_ok()
        });
        tracing::debug!(terminal = %detected, ?term_program, "terminal detected");
        detected
    }

    /// Resolve [`Terminal::Auto`] to a concrete terminal.
    pub fn effective(self, host: &impl HostCommandRunner) -> Self {
        match self {
            Self::Auto => Self::detect(host),
            other => other,
        }
    }

    pub fn yields_window_ids(self) -> bool {
        self == Self::Kitty
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Terminal {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for Terminal {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Terminal> for String {
    fn from(t: Terminal) -> Self {
        t.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::FakeRunner;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Terminal::parse("iterm2"), Terminal::ITerm2);
        assert_eq!(Terminal::parse("KITTY"), Terminal::Kitty);
        assert_eq!(Terminal::parse("terminal"), Terminal::Apple);
        assert_eq!(Terminal::parse(" Ghostty "), Terminal::Ghostty);
    }

    #[test]
    fn unknown_parses_to_auto() {
        assert_eq!(Terminal::parse("alacritty"), Terminal::Auto);
        assert_eq!(Terminal::parse(""), Terminal::Auto);
    }

    #[test]
    fn display_round_trips() {
        for t in Terminal::ALL {
            assert_eq!(Terminal::parse(&t.to_string()), t);
        }
    }

    #[test]
    fn serde_uses_display_names() {
        assert_eq!(
            serde_json::to_string(&Terminal::ITerm2).expect("ser"),
            "\"iTerm2\""
        );
        let t: Terminal = serde_json::from_str("\"wezterm\"").expect("de");
        assert_eq!(t, Terminal::Auto);
    }

    #[test]
    fn env_wins_over_running_apps() {
        let t = Terminal::detect_with(Some("Apple_Terminal"), |_| true);
        assert_eq!(t, Terminal::Apple);
        assert_eq!(Terminal::detect_with(Some("kitty"), |_| false), Terminal::Kitty);
    }

    #[test]
    fn running_app_probe_order() {
        assert_eq!(
            Terminal::detect_with(None, |app| app == "kitty" || app == "Ghostty"),
            Terminal::Ghostty
        );
        assert_eq!(Terminal::detect_with(Some("tmux"), |app| app == "kitty"), Terminal::Kitty);
        assert_eq!(Terminal::detect_with(None, |_| false), Terminal::Apple);
    }

    #[test]
    fn effective_keeps_explicit_choice() {
        let fake = FakeRunner::default();
        assert_eq!(Terminal::Ghostty.effective(&fake), Terminal::Ghostty);
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn only_kitty_yields_window_ids() {
        assert!(Terminal::Kitty.yields_window_ids());
        assert!(!Terminal::ITerm2.yields_window_ids());
    }
}
