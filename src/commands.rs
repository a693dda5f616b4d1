//! CLI commands for annoref: comment, note, delete, list, check, parse, render, info.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::debug;

use crate::anchor;
use crate::config::Config;
use crate::error::Error;
use crate::indexer;
use crate::markdown;
use crate::parser;
use crate::scanner;
use crate::service::{AnnotationService, CommentFields, NoteFields, ValidationReport};
use crate::store::{AnnotationsFile, FsStore, SourceText as _};
use crate::types::{AnnotationData, AnnotationKind, SpanAnchor};

/// Annotation counts across one `check` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CheckSummary {
    /// Annotations that failed validation.
    stale: usize,
    /// Annotations validated.
    total: usize,
}

/// Start, end, and display fragments as typed on the command line.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    /// Display fragment; empty selects the whole span.
    pub display: String,
    /// Fragment closing the span.
    pub end: String,
    /// Fragment opening the span.
    pub start: String,
}

/// How the source span of a new comment is chosen.
#[derive(Debug, Clone)]
pub enum SourceSpan {
    /// Locate explicit fragments in the current text.
    Fragments(Fragments),
    /// Promote the parsed comment at this index.
    Parsed(usize),
}

/// Workspace root and its loaded configuration.
pub struct Workspace {
    /// Loaded `.annoref.toml`, or the defaults.
    pub config: Config,
    /// Directory all relative paths resolve against.
    pub root: PathBuf,
}

impl Workspace {
    /// A workspace rooted at `root`.
    pub const fn new(root: PathBuf, config: Config) -> Self {
        return Self { config, root };
    }

    /// Service over the filesystem store.
    fn service(&self) -> AnnotationService<FsStore> {
        return AnnotationService::new(FsStore::new(self.root.clone()), self.config.annotations_dir.clone());
    }

    /// Current text of a document under the root.
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceNotFound` or `Error::SourceUnreadable`.
    fn source_text(&self, doc: &Path) -> Result<String, Error> {
        return FsStore::new(self.root.clone()).current_text(doc);
    }
}

/// Validate every annotation of the given documents, or of every scanned
/// document with an annotations file when none are given.
/// Exits 0 when everything is valid, 1 when anything is stale.
pub fn check(ws: &Workspace, docs: &[PathBuf]) -> ExitCode {
    let summary = validate_documents(ws, docs);

    if summary.stale > 0 {
        println!();
        println!("{} of {} annotations stale", summary.stale, summary.total);
        eprintln!();
        eprintln!("hint: edit the fragments back, or delete stale annotations:");
        eprintln!("  annoref delete <doc> <id> --kind comment|note");
        return ExitCode::from(1);
    }

    println!("All {} annotations valid", summary.total);
    return ExitCode::SUCCESS;
}

/// Create a comment on `doc` and print its id.
///
/// # Errors
///
/// Returns errors from reading the source or target, locating fragments,
/// parsing, or saving.
pub fn comment(
    ws: &Workspace,
    doc: &Path,
    target: &str,
    source: &SourceSpan,
    target_fragments: Option<&Fragments>,
) -> Result<(), Error> {
    let mut service = ws.service();

    let id = match source {
        SourceSpan::Parsed(index) => service.promote_parsed_comment(doc, *index, target)?,
        SourceSpan::Fragments(fragments) => {
            let text = ws.source_text(doc)?;
            let src_anchor = locate_fragments(doc, &text, fragments)?;
            let target_anchor = match target_fragments {
                None => SpanAnchor::default(),
                Some(f) => target_anchor(ws, target, f)?,
            };
            service.save_comment(CommentFields {
                src: doc.to_path_buf(),
                src_anchor,
                target: target.to_string(),
                target_anchor,
            })?
        },
    };

    println!("{id}");
    eprintln!("Saved comment {id} on {}", doc.display());
    return Ok(());
}

/// Delete one annotation. Exits 1 if it did not exist.
///
/// # Errors
///
/// Returns `Error::PersistenceFailure` if the updated file cannot be written.
pub fn delete(ws: &Workspace, doc: &Path, id: &str, kind: AnnotationKind) -> Result<ExitCode, Error> {
    if ws.service().delete_annotation(doc, id, kind)? {
        eprintln!("Deleted {} {id} from {}", kind.label(), doc.display());
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("No {} {id} in {}", kind.label(), doc.display());
    return Ok(ExitCode::from(1));
}

/// Output the annoref reference document.
pub fn info(json: bool) {
    return crate::info::run(json);
}

/// Print the annotations of `doc`, as markdown or as the stored JSON.
///
/// # Errors
///
/// Returns `Error::Json` if JSON output cannot be serialized.
pub fn list(ws: &Workspace, doc: &Path, json: bool) -> Result<(), Error> {
    let file = ws.service().load_annotations(doc);
    if json {
        print!("{}", file.serialize()?);
        return Ok(());
    }

    print!("{}", render_listing(doc, &file));
    return Ok(());
}

/// Locate typed fragments in `text`, naming `doc` on failure.
///
/// # Errors
///
/// Returns `Error::Anchor` if a fragment cannot be located.
fn locate_fragments(doc: &Path, text: &str, fragments: &Fragments) -> Result<SpanAnchor, Error> {
    return anchor::anchor_span(text, &fragments.start, &fragments.end, &fragments.display).map_err(|source| {
        return Error::Anchor {
            path: doc.to_path_buf(),
            source,
        };
    });
}

/// Create a note on `doc` and print its id.
///
/// # Errors
///
/// Returns errors from reading the source, locating fragments, or saving.
pub fn note(ws: &Workspace, doc: &Path, target: &str, fragments: Fragments) -> Result<(), Error> {
    let id = ws.service().save_note(NoteFields {
        display: fragments.display,
        end: fragments.end,
        src: doc.to_path_buf(),
        start: fragments.start,
        target: target.to_string(),
    })?;

    println!("{id}");
    eprintln!("Saved note {id} on {}", doc.display());
    return Ok(());
}

/// Print the `Title. Body:` comments found in `doc` with their word indices.
///
/// # Errors
///
/// Returns errors from reading the source or serializing JSON.
pub fn parse(ws: &Workspace, doc: &Path, json: bool) -> Result<(), Error> {
    let text = ws.source_text(doc)?;
    let comments = parser::parse(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&comments)?);
        return Ok(());
    }

    if comments.is_empty() {
        eprintln!("No comments found in {}", doc.display());
        return Ok(());
    }

    for (i, c) in comments.iter().enumerate() {
        let first = c.indices.first().copied().unwrap_or(0);
        let last = c.indices.last().copied().unwrap_or(0);
        println!("{i}. {} {}  (words {first}..={last})", c.title, c.body);
    }
    return Ok(());
}

/// Print one document's validation results.
fn print_report(report: &ValidationReport) {
    if report.all_valid() {
        debug!(doc = %report.doc.display(), count = report.entries.len(), "all annotations valid");
    }
    for entry in report.stale() {
        let message = entry.status.message.as_deref().unwrap_or("invalid");
        println!(
            "STALE   {}#{} ({}: {message})",
            report.doc.display(),
            entry.id,
            entry.kind.label(),
        );
    }
    if let Some(reason) = &report.persist_error {
        eprintln!("warning: results for {} not saved: {reason}", report.doc.display());
    }
}

/// Render `doc` to word-indexed HTML on stdout. Word ids use `article`,
/// defaulting to the document stem.
///
/// # Errors
///
/// Returns errors from reading or parsing the source.
pub fn render(ws: &Workspace, doc: &Path, article: Option<&str>) -> Result<(), Error> {
    let text = ws.source_text(doc)?;
    let article_id = article.map_or_else(|| return stem(doc), str::to_string);

    let mut root = markdown::render(&text)?;
    let spans = indexer::index_words(&mut root, &article_id);
    debug!(doc = %doc.display(), words = spans.len(), "indexed words");

    print!("{}", root.to_html());
    return Ok(());
}

/// Markdown listing of an annotations file.
fn render_listing(doc: &Path, file: &AnnotationsFile) -> String {
    let mut out = format!("# Annotations: {}\n", doc.display());
    for kind in [AnnotationKind::Comment, AnnotationKind::Note] {
        let map = file.map(kind);
        let heading = match kind {
            AnnotationKind::Comment => "Comments",
            AnnotationKind::Note => "Notes",
        };
        let _ = write!(out, "\n## {heading} ({})\n\n", map.len());
        for annotation in map.values() {
            let _ = writeln!(out, "{}", render_listing_line(annotation));
        }
    }
    return out;
}

/// One listing line: id, validity, display text, target.
fn render_listing_line(annotation: &AnnotationData) -> String {
    let state = match annotation.is_valid {
        None => "unchecked",
        Some(false) => "stale",
        Some(true) => "valid",
    };
    let shown = parser::annotation_to_comment(annotation);
    let mut line = format!("- `{}` [{state}] \"{}\" -> {}", annotation.id, shown.title, annotation.target);
    if !annotation.target_anchor.is_empty() {
        let _ = write!(line, " \"{}\"", annotation.target_anchor.display);
    }
    let _ = write!(line, " ({})", annotation.timestamp.format("%Y-%m-%d %H:%M"));
    return line;
}

/// File stem of `doc`, or `untitled`.
fn stem(doc: &Path) -> String {
    return doc
        .file_stem()
        .map_or_else(|| return "untitled".to_string(), |s| return s.to_string_lossy().into_owned());
}

/// Anchor in the target. When the target names a readable file, fragments
/// are located in it; otherwise only the fragments are recorded.
///
/// # Errors
///
/// Returns `Error::Anchor` if the target file exists but the fragments are not in it.
fn target_anchor(ws: &Workspace, target: &str, fragments: &Fragments) -> Result<SpanAnchor, Error> {
    let path = Path::new(target);
    if let Ok(text) = ws.source_text(path) {
        return locate_fragments(path, &text, fragments);
    }

    return Ok(SpanAnchor {
        display: fragments.display.clone(),
        end: fragments.end.clone(),
        start: fragments.start.clone(),
        ..SpanAnchor::default()
    });
}

/// Validate each document and print its stale entries.
fn validate_documents(ws: &Workspace, docs: &[PathBuf]) -> CheckSummary {
    let targets = if docs.is_empty() {
        scanner::scan_annotated(&ws.root, &ws.config)
    } else {
        docs.to_vec()
    };

    let mut service = ws.service();
    let mut summary = CheckSummary { stale: 0, total: 0 };
    for doc in &targets {
        let report = service.validate_all_annotations(doc);
        summary.total = summary.total.saturating_add(report.entries.len());
        summary.stale = summary.stale.saturating_add(report.stale().count());
        print_report(&report);
    }
    return summary;
}
