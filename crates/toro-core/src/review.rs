//! Manual-review flagging
//!
//! The extraction service marks results it is unsure about. Those drafts get
//! a warning line at the top of the notes and `requiresReview` set, so the
//! operator checks the figures before submitting.

use serde::Serialize;

use crate::extraction::RawExtractionResult;
use crate::normalize::{truncate_chars, NOTES_MAX_CHARS};

/// Reason used when the service flags a result without saying why
pub const DEFAULT_REVIEW_REASON: &str = "Datos dudosos";

/// Low-confidence marker for one extraction result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewFlag {
    pub reason: String,
}

impl ReviewFlag {
    /// Line prepended to the notes
    pub fn warning_line(&self) -> String {
        format!("⚠️ REVISAR: {} \n", self.reason)
    }
}

/// Review flag for a raw result; an absent flag means no review
pub fn review_flag(raw: &RawExtractionResult) -> Option<ReviewFlag> {
    if raw.requires_manual_review != Some(true) {
        return None;
    }
    let reason = raw
        .manual_review_reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REVIEW_REASON);
    Some(ReviewFlag {
        reason: reason.to_string(),
    })
}

/// Final notes: warning (if any) ahead of the normalized notes, capped
pub fn annotate_notes(flag: Option<&ReviewFlag>, notes: &str) -> String {
    match flag {
        Some(flag) => truncate_chars(&format!("{}{}", flag.warning_line(), notes), NOTES_MAX_CHARS),
        None => truncate_chars(notes, NOTES_MAX_CHARS),
    }
}
