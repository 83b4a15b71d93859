//! Recency signal from transcript modification times.

use chrono::{DateTime, Utc};
use tabdeck_core::{ActivitySource, Session};

use crate::discovery::modified_at;

/// Last activity = mtime of the session's transcript. Placeholders and
/// sessions whose transcript vanished have no signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TranscriptActivity;

impl ActivitySource for TranscriptActivity {
    fn last_active(&self, session: &Session) -> Option<DateTime<Utc>> {
        session.transcript_path.as_deref().and_then(modified_at)
    }
}
