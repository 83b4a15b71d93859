//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tabdeck", about = "Session deck for AI coding agents in kitty tabs")]
pub struct Cli {
    /// Directory holding sessions.json (default: ~/.claude-sessions)
    #[arg(long, global = true, env = "TABDECK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Agent transcript root (default: ~/.claude/projects)
    #[arg(long, global = true, env = "TABDECK_PROJECTS_DIR")]
    pub projects_dir: Option<PathBuf>,

    /// kitty executable used for remote control
    #[arg(long, global = true, default_value = "kitty")]
    pub kitty_bin: String,

    /// kitty remote-control address, e.g. unix:/tmp/kitty-1234
    #[arg(long, global = true, env = "KITTY_LISTEN_ON")]
    pub kitty_socket: Option<String>,

    /// Terminal used to open sessions; overrides the saved preference
    #[arg(long, global = true, env = "TABDECK_TERMINAL")]
    pub terminal: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List sessions with their live status (default)
    Ls(LsOpts),
    /// Live-refresh the session list
    Watch(WatchOpts),
    /// Focus a session's window, or resume it in a new tab
    Open(QueryOpts),
    /// Start a fresh agent in a new tab
    New(NewOpts),
    /// Close a session's window
    Close(QueryOpts),
    /// Rename a session; the name is kept from then on
    Rename(RenameOpts),
    /// Pin a session, or unpin it if already pinned
    Pin(QueryOpts),
    /// Forget a session record (the transcript stays)
    Rm(QueryOpts),
    /// Show or set the preferred terminal
    Terminal(TerminalOpts),
}

#[derive(clap::Args, Default)]
pub struct LsOpts {
    /// Print records as JSON
    #[arg(long)]
    pub json: bool,

    /// Color output: auto, always, never
    #[arg(long, default_value = "auto")]
    pub color: String,
}

#[derive(clap::Args)]
pub struct WatchOpts {
    /// Refresh interval in seconds
    #[arg(long, default_value = "2")]
    pub interval: u64,

    /// Color output: auto, always, never
    #[arg(long, default_value = "auto")]
    pub color: String,
}

#[derive(clap::Args)]
pub struct QueryOpts {
    /// Deck id, session id, name, or a unique prefix of one
    pub query: String,
}

#[derive(clap::Args)]
pub struct NewOpts {
    /// Project directory
    pub path: PathBuf,

    /// Session name and tab title
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(clap::Args)]
pub struct RenameOpts {
    pub query: String,
    pub name: String,
}

#[derive(clap::Args)]
pub struct TerminalOpts {
    /// Auto, iTerm2, Ghostty, Kitty or Terminal
    pub name: Option<String>,
}
