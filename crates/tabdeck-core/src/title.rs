//! Title indicator parsing.
//!
//! The agent program prefixes its terminal title with one status glyph:
//! a braille spinner frame while it is producing output, or `✳` while a
//! turn has unsaved changes. Only the first code point is inspected.

/// Leading glyph shown while a turn has unsaved changes.
pub const UNSAVED_MARKER: char = '\u{2733}';

/// Spinner frames are drawn from the Braille Patterns block.
pub const SPINNER_RANGE: std::ops::RangeInclusive<char> = '\u{2800}'..='\u{28FF}';

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TitleIndicator {
    #[default]
    None,
    Unsaved,
    Busy,
}

impl TitleIndicator {
    fn of(c: char) -> Self {
        if c == UNSAVED_MARKER {
            Self::Unsaved
        } else if SPINNER_RANGE.contains(&c) {
            Self::Busy
        } else {
            Self::None
        }
    }
}

/// Classify the first code point of `title`.
pub fn classify_indicator(title: &str) -> TitleIndicator {
    title
        .chars()
        .next()
        .map_or(TitleIndicator::None, TitleIndicator::of)
}

pub fn has_indicator(title: &str) -> bool {
    classify_indicator(title) != TitleIndicator::None
}

pub fn is_busy(title: &str) -> bool {
    classify_indicator(title) == TitleIndicator::Busy
}

/// Strip the status glyph and surrounding whitespace, leaving the display name.
///
/// Repeats until the remainder no longer starts with a glyph, so the result
/// is a fixed point: `strip_indicator(strip_indicator(t)) == strip_indicator(t)`.
pub fn strip_indicator(title: &str) -> &str {
    let mut rest = title.trim();
    loop {
        let mut chars = rest.chars();
        match chars.next().map(TitleIndicator::of) {
            Some(TitleIndicator::Unsaved | TitleIndicator::Busy) => rest = chars.as_str().trim(),
            _ => return rest,
        }
    }
}
