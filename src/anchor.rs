//! Three-fragment text anchors: re-locate a stored span by its start, end,
//! and display fragments in possibly edited text.
//!
//! Matching is exact and first-occurrence. Repeated text can anchor to an
//! earlier copy than the one originally selected.

use crate::parser;
use crate::types::SpanAnchor;

/// Stage at which anchor resolution failed. First failure wins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    /// The display fragment is not inside the span.
    #[error("display text `{fragment}` not found in span")]
    DisplayNotFound {
        /// The missing display fragment.
        fragment: String,
    },

    /// The end fragment does not occur at or after the start position.
    #[error("end text `{fragment}` not found after start")]
    EndNotFound {
        /// The missing end fragment.
        fragment: String,
    },

    /// The end position lies before the start position.
    #[error("end position {end} precedes start position {start}")]
    OrderInverted {
        /// Byte offset of the end fragment.
        end: usize,
        /// Byte offset of the start fragment.
        start: usize,
    },

    /// The start fragment does not occur in the text.
    #[error("start text `{fragment}` not found")]
    StartNotFound {
        /// The missing start fragment.
        fragment: String,
    },
}

impl AnchorError {
    /// Short stage name shown next to a stale annotation.
    pub const fn stage_message(&self) -> &'static str {
        return match self {
            AnchorError::DisplayNotFound { .. } => "Display text not found",
            AnchorError::EndNotFound { .. } => "Text End not found",
            AnchorError::OrderInverted { .. } => "Text End precedes Text Start",
            AnchorError::StartNotFound { .. } => "Text Start not found",
        };
    }
}

/// A successfully re-located span. Offsets are byte offsets into the searched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSpan {
    /// Offset of the display fragment relative to `start`.
    pub display_offset: usize,
    /// Absolute offset one past the end fragment.
    pub end: usize,
    /// `text[start..end]`.
    pub range_text: String,
    /// Absolute offset of the start fragment.
    pub start: usize,
}

/// Find `start`, then `end` at or after it, then `display` inside the span between them.
///
/// # Errors
///
/// Returns the `AnchorError` for the first stage that fails.
pub fn locate(text: &str, start: &str, end: &str, display: &str) -> Result<LocatedSpan, AnchorError> {
    let start_at = text.find(start).ok_or_else(|| return AnchorError::StartNotFound {
        fragment: start.to_string(),
    })?;

    let end_at = text
        .get(start_at..)
        .and_then(|rest| return rest.find(end))
        .map(|rel| return start_at.saturating_add(rel))
        .ok_or_else(|| return AnchorError::EndNotFound {
            fragment: end.to_string(),
        })?;

    return resolve_span(text, start_at, end_at, end, display);
}

/// Steps after the fragment search, for callers that already hold offsets.
///
/// # Errors
///
/// Returns `AnchorError::OrderInverted` if `end_at < start_at`,
/// `AnchorError::EndNotFound` if the offsets do not cut `text` on character
/// boundaries, or `AnchorError::DisplayNotFound` if `display` is not in the span.
pub fn resolve_span(
    text: &str,
    start_at: usize,
    end_at: usize,
    end: &str,
    display: &str,
) -> Result<LocatedSpan, AnchorError> {
    if end_at < start_at {
        return Err(AnchorError::OrderInverted {
            end: end_at,
            start: start_at,
        });
    }

    let span_end = end_at.saturating_add(end.len());
    let range_text = text.get(start_at..span_end).ok_or_else(|| return AnchorError::EndNotFound {
        fragment: end.to_string(),
    })?;

    let display_offset = range_text.find(display).ok_or_else(|| return AnchorError::DisplayNotFound {
        fragment: display.to_string(),
    })?;

    return Ok(LocatedSpan {
        display_offset,
        end: span_end,
        range_text: range_text.to_string(),
        start: start_at,
    });
}

/// Locate a selection and record it as a complete anchor, including the word
/// ranges the parser and word indexer assign to it. An empty `display`
/// selects the whole span.
///
/// # Errors
///
/// Returns the `AnchorError` from `locate`.
pub fn anchor_span(text: &str, start: &str, end: &str, display: &str) -> Result<SpanAnchor, AnchorError> {
    let located = locate(text, start, end, display)?;
    let display = if display.is_empty() { located.range_text.as_str() } else { display };

    let display_start = located.start.saturating_add(located.display_offset);
    let display_end = display_start.saturating_add(display.len());

    return Ok(SpanAnchor {
        display: display.to_string(),
        display_range: parser::word_indices_in_span(text, display_start..display_end),
        end: end.to_string(),
        range: parser::word_indices_in_span(text, located.start..located.end),
        start: start.to_string(),
        text: located.range_text.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "The quick brown fox jumps over the lazy dog.";

    #[test]
    fn locates_span_and_display() {
        let span = locate(DOC, "quick", "jumps", "brown fox").unwrap();
        assert_eq!(&DOC[span.start..span.end], span.range_text);
        assert_eq!(span.range_text, "quick brown fox jumps");
        let d = span.display_offset;
        assert_eq!(&span.range_text[d..d + "brown fox".len()], "brown fox");
    }

    #[test]
    fn display_may_equal_whole_span() {
        let span = locate(DOC, "lazy", "dog.", "lazy dog.").unwrap();
        assert_eq!(span.display_offset, 0);
        assert_eq!(span.end, DOC.len());
    }

    #[test]
    fn missing_start_wins_over_everything() {
        let err = locate(DOC, "slow", "nowhere", "nothing").unwrap_err();
        assert_eq!(err, AnchorError::StartNotFound { fragment: "slow".to_string() });
    }

    #[test]
    fn end_only_before_start_is_not_found() {
        let err = locate(DOC, "lazy", "quick", "lazy").unwrap_err();
        assert!(matches!(err, AnchorError::EndNotFound { .. }));
        assert_eq!(err.stage_message(), "Text End not found");
    }

    #[test]
    fn display_outside_span() {
        let err = locate(DOC, "quick", "fox", "lazy").unwrap_err();
        assert!(matches!(err, AnchorError::DisplayNotFound { .. }));
    }

    #[test]
    fn end_search_starts_at_start_position() {
        let text = "end start middle end";
        let span = locate(text, "start", "end", "middle").unwrap();
        assert_eq!(span.range_text, "start middle end");
    }

    #[test]
    fn precomputed_offsets_can_be_inverted() {
        let err = resolve_span(DOC, 10, 4, "quick", "").unwrap_err();
        assert_eq!(err, AnchorError::OrderInverted { end: 4, start: 10 });
        assert_eq!(err.stage_message(), "Text End precedes Text Start");
    }

    #[test]
    fn anchor_records_word_ranges() {
        let anchor = anchor_span(DOC, "quick", "jumps", "brown fox").unwrap();
        assert_eq!(anchor.text, "quick brown fox jumps");
        assert_eq!(anchor.range, vec![1, 2, 3, 4]);
        assert_eq!(anchor.display_range, vec![2, 3]);
        assert!(anchor.check_ranges().is_ok());
    }

    #[test]
    fn empty_display_selects_whole_span() {
        let anchor = anchor_span(DOC, "over", "dog.", "").unwrap();
        assert_eq!(anchor.display, "over the lazy dog.");
        assert_eq!(anchor.display_range, anchor.range);
    }
}
