//! tabdeck-kitty: terminal IO boundary.
//! Lists kitty windows over remote control, converts them into window
//! snapshots, and opens/focuses/closes session tabs. No matching logic.

pub mod controller;
pub mod error;
pub mod executor;
pub mod snapshot;
pub mod terminal;
pub mod window_info;

pub use controller::{TerminalController, WindowController, new_command, resume_command};
pub use error::KittyError;
pub use executor::{HostCommandRunner, KittyCommandRunner, KittyExecutor};
pub use snapshot::{
    AGENT_PROGRAM, KittyWindowSource, RESUME_FLAG, extract_resume_id, is_agent_window,
    to_window_snapshots,
};
pub use terminal::Terminal;
pub use window_info::{KittyOsWindow, KittyTab, KittyWindowInfo, list_os_windows, parse_ls_output};
