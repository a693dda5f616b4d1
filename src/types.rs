/// Core domain types for annotations, anchors, parsed comments, and word spans.
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which map of the annotations file a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnnotationKind {
    /// A comment on a span of the source document.
    Comment,
    /// A note linking a span of the source document to a target article.
    Note,
}

impl AnnotationKind {
    /// Lowercase label used in CLI output.
    pub const fn label(self) -> &'static str {
        return match self {
            AnnotationKind::Comment => "comment",
            AnnotationKind::Note => "note",
        };
    }
}

/// Three-fragment anchor plus the word ranges it covered when it was created.
/// `display` sits inside the span bounded by `start` and `end`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanAnchor {
    /// Fragment shown to the user as the annotated text.
    #[serde(default)]
    pub display: String,
    /// Word indices covered by `display`; contiguous.
    #[serde(default)]
    pub display_range: Vec<usize>,
    /// Fragment closing the span.
    #[serde(default)]
    pub end: String,
    /// Word indices covered by the full span; non-decreasing.
    #[serde(default)]
    pub range: Vec<usize>,
    /// Fragment opening the span.
    #[serde(default)]
    pub start: String,
    /// Full span text from the start of `start` to the end of `end`.
    #[serde(default)]
    pub text: String,
}

impl SpanAnchor {
    /// Check the word-range invariants: `range` non-decreasing, `display_range`
    /// contiguous, contained in `range`, and not starting before it.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedRange` naming the first violated invariant.
    pub fn check_ranges(&self) -> Result<(), Error> {
        if self.range.windows(2).any(|w| return w.first() > w.get(1)) {
            return Err(Error::MalformedRange {
                reason: format!("range is not ordered: {:?}", self.range),
            });
        }

        let contiguous = self
            .display_range
            .windows(2)
            .all(|w| return matches!((w.first(), w.get(1)), (Some(a), Some(b)) if a.checked_add(1) == Some(*b)));
        if !contiguous {
            return Err(Error::MalformedRange {
                reason: format!("display range is not contiguous: {:?}", self.display_range),
            });
        }

        if self.range.is_empty() {
            return Ok(());
        }

        if let Some(missing) = self.display_range.iter().find(|i| return !self.range.contains(*i)) {
            return Err(Error::MalformedRange {
                reason: format!("display word {missing} lies outside the span range"),
            });
        }

        if let (Some(first), Some(display_first)) = (self.range.first(), self.display_range.first())
            && display_first < first
        {
            return Err(Error::MalformedRange {
                reason: format!("display starts at word {display_first}, before span start {first}"),
            });
        }

        return Ok(());
    }

    /// True when no fragment has been recorded.
    pub fn is_empty(&self) -> bool {
        return self.start.is_empty() && self.end.is_empty() && self.display.is_empty();
    }
}

/// One stored comment or note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationData {
    /// Stable identifier; also the key in the annotations file map.
    pub id: String,
    /// Last known validation outcome. Absent until the first validation pass.
    #[serde(rename = "isValid", default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    /// Comment or note.
    pub kind: AnnotationKind,
    /// Document the annotation lives in.
    pub src: PathBuf,
    /// Anchor inside the source document.
    pub src_anchor: SpanAnchor,
    /// Identifier of the referenced article.
    pub target: String,
    /// Anchor inside the target article; empty when the selection came from the source only.
    #[serde(default)]
    pub target_anchor: SpanAnchor,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// A comment recognized in free text by the comment syntax parser.
/// Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedComment {
    /// Body sentence, ending in `:`.
    pub body: String,
    /// Absolute word indices of the title and body words, in order.
    pub indices: Vec<usize>,
    /// Title sentence, ending in `.`.
    pub title: String,
}

/// Address of one indexed word in a rendered article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedWordSpan {
    /// Article the word was rendered for.
    pub article_id: String,
    /// `"{article_id}-{word_index}"`.
    pub dom_id: String,
    /// Zero-based index, scoped to one rendering pass.
    pub word_index: usize,
}

impl TrackedWordSpan {
    /// Build the span address for a word, deriving its DOM id.
    pub fn new(article_id: &str, word_index: usize) -> Self {
        return Self {
            article_id: article_id.to_string(),
            dom_id: format!("{article_id}-{word_index}"),
            word_index,
        };
    }
}

/// Outcome of re-checking one stored annotation against its current source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationStatus {
    /// Whether every stage of the check passed.
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    /// Human-readable name of the failed stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationStatus {
    /// A failed check with the given stage message.
    pub fn invalid(message: &str) -> Self {
        return Self {
            is_valid: false,
            message: Some(message.to_string()),
        };
    }

    /// A passed check.
    pub const fn valid() -> Self {
        return Self {
            is_valid: true,
            message: None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(range: Vec<usize>, display_range: Vec<usize>) -> SpanAnchor {
        SpanAnchor {
            range,
            display_range,
            ..SpanAnchor::default()
        }
    }

    #[test]
    fn accepts_display_inside_range() {
        assert!(anchor(vec![3, 4, 5, 6], vec![4, 5]).check_ranges().is_ok());
    }

    #[test]
    fn accepts_empty_ranges() {
        assert!(SpanAnchor::default().check_ranges().is_ok());
    }

    #[test]
    fn rejects_unordered_range() {
        let err = anchor(vec![5, 4], vec![]).check_ranges().unwrap_err();
        assert!(matches!(err, Error::MalformedRange { .. }));
    }

    #[test]
    fn rejects_gapped_display_range() {
        let err = anchor(vec![1, 2, 3], vec![1, 3]).check_ranges().unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn rejects_display_outside_range() {
        let err = anchor(vec![4, 5], vec![6]).check_ranges().unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn kind_serializes_uppercase() {
        let json = serde_json::to_string(&AnnotationKind::Note).unwrap();
        assert_eq!(json, "\"NOTE\"");
    }

    #[test]
    fn word_span_dom_id() {
        let span = TrackedWordSpan::new("article-7", 12);
        assert_eq!(span.dom_id, "article-7-12");
    }
}
