//! tabdeck-store: persistence and discovery.
//!
//! Owns `sessions.json`, finds the agent's transcripts on disk, merges the
//! two, and supplies transcript mtimes as the reconciler's recency signal.

pub mod activity;
pub mod discovery;
pub mod error;
pub mod merge;
pub mod paths;
pub mod storage;

pub use activity::TranscriptActivity;
pub use discovery::{
    TranscriptInfo, deck_id, default_session_name, discover_sessions, is_session_uuid,
    read_transcript_info, session_from_transcript,
};
pub use error::StoreError;
pub use merge::{MergeOutcome, merge_sessions};
pub use paths::{default_data_dir, default_projects_dir, encode_path, home_dir};
pub use storage::{STORAGE_FILE, SessionStore, Settings, StorageData};
