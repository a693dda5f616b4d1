//! Comment syntax parser: `Title sentence. Body sentence:` pairs in free text,
//! plus the word enumeration that anchors and the word indexer agree on.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{AnnotationData, ParsedComment};

/// Wiki links (`[[page]]`, `[[@article]]`, `[[page|alias]]`) and inline markdown links.
/// Both are rendered as anchors, so neither contributes words.
pub static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"\[\[[^\]\n]*\]\]|\[[^\]\n]*\]\([^)\n]*\)").expect("valid regex");
});

/// ATX heading marker at the start of a line.
static HEADING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| return Regex::new(r"^ {0,3}#{1,6}(?:[ \t]|$)").expect("valid regex"));

/// Leading block-quote and list markers, which the renderer does not emit as text.
static BLOCK_MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    return Regex::new(r"^[ \t]*(?:>[ \t]?)*(?:(?:[-*+]|\d{1,9}[.)])(?:[ \t]+|$))?").expect("valid regex");
});

/// A maximal run of whitespace or of non-whitespace characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// True for a word run, false for a whitespace run.
    pub is_word: bool,
    /// Byte range of the run in the split text.
    pub range: Range<usize>,
}

/// A word of a document together with its absolute index and its byte span
/// in the original (unstripped) text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedWord {
    /// Zero-based position among all words of the document.
    pub index: usize,
    /// Byte range in the original text.
    pub span: Range<usize>,
    /// Word text after link stripping.
    pub text: String,
}

/// One kept slice of an original line inside its stripped form.
struct Piece {
    /// Byte length of the slice.
    len: usize,
    /// Byte offset of the slice in the original document.
    original_at: usize,
    /// Byte offset of the slice in the stripped line.
    stripped_at: usize,
}

/// A content line with block markers and link markup removed.
struct StrippedLine {
    /// Kept slices, in order.
    pieces: Vec<Piece>,
    /// Concatenation of the kept slices.
    text: String,
}

impl StrippedLine {
    /// Build from one original line starting at byte `line_start` of the document.
    fn new(line: &str, line_start: usize) -> Self {
        let marker_len = BLOCK_MARKER_PATTERN.find(line).map_or(0, |m| return m.end());
        let content = line.get(marker_len..).unwrap_or("");
        let content_start = line_start.saturating_add(marker_len);

        let mut stripped = Self {
            pieces: Vec::new(),
            text: String::with_capacity(content.len()),
        };
        let mut cursor = 0_usize;
        for link in LINK_PATTERN.find_iter(content) {
            stripped.keep(content, cursor..link.start(), content_start);
            cursor = link.end();
        }
        stripped.keep(content, cursor..content.len(), content_start);
        return stripped;
    }

    /// Append `content[range]` as a kept slice.
    fn keep(&mut self, content: &str, range: Range<usize>, content_start: usize) {
        let Some(slice) = content.get(range.clone()) else {
            return;
        };
        if slice.is_empty() {
            return;
        }
        self.pieces.push(Piece {
            len: slice.len(),
            original_at: content_start.saturating_add(range.start),
            stripped_at: self.text.len(),
        });
        self.text.push_str(slice);
    }

    /// Map a stripped offset that starts a word back to the original text.
    fn original_start(&self, pos: usize) -> usize {
        for piece in &self.pieces {
            let end = piece.stripped_at.saturating_add(piece.len);
            if pos >= piece.stripped_at && pos < end {
                return piece.original_at.saturating_add(pos.saturating_sub(piece.stripped_at));
            }
        }
        return self.original_end(pos);
    }

    /// Map a stripped offset that ends a word back to the original text.
    fn original_end(&self, pos: usize) -> usize {
        for piece in &self.pieces {
            let end = piece.stripped_at.saturating_add(piece.len);
            if pos > piece.stripped_at && pos <= end {
                return piece.original_at.saturating_add(pos.saturating_sub(piece.stripped_at));
            }
        }
        return self.pieces.first().map_or(0, |p| return p.original_at);
    }

    /// Word runs of the stripped text.
    fn word_ranges(&self) -> Vec<Range<usize>> {
        return split_runs(&self.text)
            .into_iter()
            .filter(|run| return run.is_word)
            .map(|run| return run.range)
            .collect();
    }
}

/// A terminated sentence inside one line: positions into the line's word list.
struct Sentence {
    /// Position of the first word in the line's word list.
    first: usize,
    /// Position of the last word, whose final character is the terminator.
    last: usize,
    /// `.` for a title candidate, `:` for a body candidate.
    terminator: char,
}

/// Split text into alternating whitespace and word runs. Concatenating the
/// runs in order reproduces the input exactly.
pub fn split_runs(text: &str) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for (at, ch) in text.char_indices() {
        let is_word = !ch.is_whitespace();
        let next = at.saturating_add(ch.len_utf8());
        if let Some(run) = runs.last_mut()
            && run.is_word == is_word
        {
            run.range.end = next;
            continue;
        }
        runs.push(Run { is_word, range: at..next });
    }
    return runs;
}

/// Lines that carry indexable prose, with headings and fenced code removed.
fn content_lines(text: &str) -> Vec<StrippedLine> {
    let mut lines = Vec::new();
    let mut in_fence = false;
    let mut line_start = 0_usize;

    for raw in text.split_inclusive('\n') {
        let start = line_start;
        line_start = line_start.saturating_add(raw.len());
        let line = raw.trim_end_matches(['\n', '\r']);

        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || HEADING_PATTERN.is_match(line) {
            continue;
        }

        lines.push(StrippedLine::new(line, start));
    }

    return lines;
}

/// Enumerate every word of a document in the order the word indexer numbers them,
/// with byte spans in the original text.
pub fn words(text: &str) -> Vec<IndexedWord> {
    let mut out = Vec::new();
    for line in content_lines(text) {
        for range in line.word_ranges() {
            let Some(word) = line.text.get(range.clone()) else {
                continue;
            };
            out.push(IndexedWord {
                index: out.len(),
                span: line.original_start(range.start)..line.original_end(range.end),
                text: word.to_string(),
            });
        }
    }
    return out;
}

/// Indices of the words overlapping a byte span of the original text.
pub fn word_indices_in_span(text: &str, span: Range<usize>) -> Vec<usize> {
    return words(text)
        .into_iter()
        .filter(|w| return w.span.start < span.end && w.span.end > span.start)
        .map(|w| return w.index)
        .collect();
}

/// Find every `Title. Body:` comment in the text, in document order.
///
/// Never fails: malformed input yields an empty list.
pub fn parse(text: &str) -> Vec<ParsedComment> {
    let mut comments = Vec::new();
    let mut next_index = 0_usize;

    for line in content_lines(text) {
        let ranges = line.word_ranges();
        collect_comments_in_line(&line.text, &ranges, next_index, &mut comments);
        next_index = next_index.saturating_add(ranges.len());
    }

    return comments;
}

/// Pair each `.`-terminated sentence with an immediately following
/// `:`-terminated one, separated by exactly one space.
fn collect_comments_in_line(
    text: &str,
    ranges: &[Range<usize>],
    base_index: usize,
    comments: &mut Vec<ParsedComment>,
) {
    let sentences = split_sentences(text, ranges);
    let mut i = 0_usize;
    while let (Some(title), Some(body)) = (sentences.get(i), sentences.get(i.saturating_add(1))) {
        if title.terminator == '.'
            && body.terminator == ':'
            && let Some(comment) = comment_from_pair(text, ranges, base_index, title, body)
        {
            comments.push(comment);
            i = i.saturating_add(2);
            continue;
        }
        i = i.saturating_add(1);
    }
}

/// Build a parsed comment from an adjacent title/body sentence pair.
/// Returns `None` unless the two are separated by exactly one space.
fn comment_from_pair(
    text: &str,
    ranges: &[Range<usize>],
    base_index: usize,
    title: &Sentence,
    body: &Sentence,
) -> Option<ParsedComment> {
    let title_start = ranges.get(title.first)?.start;
    let title_end = ranges.get(title.last)?.end;
    let body_start = ranges.get(body.first)?.start;
    let body_end = ranges.get(body.last)?.end;

    if text.get(title_end..body_start)? != " " {
        return None;
    }

    let indices = (title.first..=body.last)
        .map(|pos| return base_index.saturating_add(pos))
        .collect();

    return Some(ParsedComment {
        body: text.get(body_start..body_end)?.to_string(),
        indices,
        title: text.get(title_start..title_end)?.to_string(),
    });
}

/// Group a line's words into sentences ending in `.` or `:`.
/// Trailing words without a terminator do not form a sentence.
fn split_sentences(text: &str, ranges: &[Range<usize>]) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut first = 0_usize;

    for (pos, range) in ranges.iter().enumerate() {
        let Some(word) = text.get(range.clone()) else {
            continue;
        };
        let Some(terminator) = word.chars().last().filter(|c| return matches!(*c, '.' | ':')) else {
            continue;
        };
        sentences.push(Sentence { first, last: pos, terminator });
        first = pos.saturating_add(1);
    }

    return sentences;
}

/// Present a stored annotation in the same shape as a freshly parsed comment.
pub fn annotation_to_comment(annotation: &AnnotationData) -> ParsedComment {
    return ParsedComment {
        body: annotation.src_anchor.text.clone(),
        indices: annotation.src_anchor.range.clone(),
        title: annotation.src_anchor.display.clone(),
    };
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::types::{AnnotationKind, SpanAnchor};

    #[test]
    fn single_comment() {
        let comments = parse("Title. Body:");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].title, "Title.");
        assert_eq!(comments[0].body, "Body:");
        assert_eq!(comments[0].indices, vec![0, 1]);
    }

    #[test]
    fn title_without_body_is_ignored() {
        assert!(parse("No colon here.").is_empty());
    }

    #[test]
    fn body_without_title_is_ignored() {
        assert!(parse("No period here:").is_empty());
    }

    #[test]
    fn wiki_link_removed_without_space() {
        let comments = parse("A [[x]] title. Body:");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].title, "A  title.");
        assert_eq!(comments[0].indices, vec![0, 1, 2]);
    }

    #[test]
    fn article_reference_removed() {
        let comments = parse("See [[@abc123]] here. Why it matters:");
        assert_eq!(comments[0].title, "See  here.");
        assert_eq!(comments[0].body, "Why it matters:");
    }

    #[test]
    fn requires_exactly_one_space() {
        assert!(parse("Title.  Body:").is_empty());
        assert!(parse("Title.\nBody:").is_empty());
    }

    #[test]
    fn title_is_the_sentence_before_the_body() {
        let comments = parse("Some prose first. Real title here. The body:");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].title, "Real title here.");
        assert_eq!(comments[0].indices, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn indices_count_prose_on_earlier_lines() {
        let text = "one two three\n\nFour. Five six:\nseven. eight:";
        let comments = parse(text);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].indices, vec![3, 4, 5]);
        assert_eq!(comments[1].indices, vec![6, 7]);
    }

    #[test]
    fn headings_and_code_fences_are_skipped() {
        let text = "# Heading. Not body:\n```\ncode. inside:\n```\nTitle. Body:";
        let comments = parse(text);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].indices, vec![0, 1]);
    }

    #[test]
    fn hashtag_line_is_not_a_heading() {
        let comments = parse("#tag title. Body:");
        assert_eq!(comments[0].title, "#tag title.");
    }

    #[test]
    fn list_markers_are_not_words() {
        let comments = parse("- Item title. Item body:\n1. Second. Body:");
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].title, "Item title.");
        assert_eq!(comments[1].title, "Second.");
        assert_eq!(comments[1].indices, vec![4, 5]);
    }

    #[test]
    fn multiple_comments_on_one_line() {
        let comments = parse("First. One: Second. Two:");
        let titles: Vec<&str> = comments.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["First.", "Second."]);
    }

    #[test]
    fn empty_input() {
        assert!(parse("").is_empty());
        assert!(words("").is_empty());
    }

    #[test]
    fn split_runs_reconstructs_text() {
        let text = "  Hello \t wörld\n";
        let runs = split_runs(text);
        let rebuilt: String = runs.iter().map(|r| &text[r.range.clone()]).collect();
        assert_eq!(rebuilt, text);
        assert_eq!(runs.iter().filter(|r| r.is_word).count(), 2);
    }

    #[test]
    fn words_map_to_original_offsets() {
        let text = "> quoted [[link]] words";
        let found = words(text);
        assert_eq!(found.len(), 2);
        assert_eq!(&text[found[0].span.clone()], "quoted");
        assert_eq!(&text[found[1].span.clone()], "words");
    }

    #[test]
    fn span_word_indices() {
        let text = "alpha beta gamma delta";
        assert_eq!(word_indices_in_span(text, 6..16), vec![1, 2]);
        assert_eq!(word_indices_in_span(text, 7..8), vec![1]);
    }

    #[test]
    fn annotation_maps_back_to_comment() {
        let annotation = AnnotationData {
            id: "a1".to_string(),
            is_valid: None,
            kind: AnnotationKind::Comment,
            src: PathBuf::from("doc.md"),
            src_anchor: SpanAnchor {
                display: "Title.".to_string(),
                display_range: vec![0],
                end: "Body:".to_string(),
                range: vec![0, 1],
                start: "Title.".to_string(),
                text: "Title. Body:".to_string(),
            },
            target: "article".to_string(),
            target_anchor: SpanAnchor::default(),
            timestamp: chrono::Utc::now(),
        };
        let comment = annotation_to_comment(&annotation);
        assert_eq!(comment.title, "Title.");
        assert_eq!(comment.body, "Title. Body:");
        assert_eq!(comment.indices, vec![0, 1]);
    }
}
