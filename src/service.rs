//! Annotation service: create, validate, and delete the comments and notes
//! of one document, persisting through a [`DocumentStore`].
//!
//! Every mutating call is a full read-modify-write of the document's
//! annotations file. User-actionable failures are returned before anything
//! is written.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::anchor;
use crate::error::Error;
use crate::ids;
use crate::parser;
use crate::store::{AnnotationsFile, DocumentStore, SourceText, annotations_path};
use crate::types::{AnnotationData, AnnotationKind, SpanAnchor, ValidationStatus};

/// Message for a note whose `[[@target]]` link is gone from the source.
const TARGET_MISSING: &str = "Target reference not found";

/// Inputs for a new comment. Anchors are already resolved by the caller.
#[derive(Debug, Clone, Default)]
pub struct CommentFields {
    /// Document the comment lives in.
    pub src: PathBuf,
    /// Anchor in the source document.
    pub src_anchor: SpanAnchor,
    /// Referenced article or document.
    pub target: String,
    /// Anchor in the target, possibly empty.
    pub target_anchor: SpanAnchor,
}

/// Inputs for a new note. Fragments are located in the current source text.
#[derive(Debug, Clone, Default)]
pub struct NoteFields {
    /// Display fragment; empty selects the whole span.
    pub display: String,
    /// Fragment closing the span.
    pub end: String,
    /// Document the note lives in.
    pub src: PathBuf,
    /// Fragment opening the span.
    pub start: String,
    /// Referenced article.
    pub target: String,
}

/// Outcome of validating one stored annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationEntry {
    /// Annotation id.
    pub id: String,
    /// Which map the annotation lives in.
    pub kind: AnnotationKind,
    /// Validation result.
    pub status: ValidationStatus,
}

/// Result of validating every annotation of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// The validated document.
    pub doc: PathBuf,
    /// One entry per annotation, comments first, each map in id order.
    pub entries: Vec<ValidationEntry>,
    /// Set when the updated flags could not be written back.
    pub persist_error: Option<String>,
}

impl ValidationReport {
    /// Whether every annotation validated.
    pub fn all_valid(&self) -> bool {
        return self.entries.iter().all(|e| return e.status.is_valid);
    }

    /// The annotations that failed validation.
    pub fn stale(&self) -> impl Iterator<Item = &ValidationEntry> {
        return self.entries.iter().filter(|e| return !e.status.is_valid);
    }
}

/// Annotation operations over a store and the documents it can read.
pub struct AnnotationService<S> {
    /// Folder holding annotations files, as the store resolves paths.
    annotations_dir: PathBuf,
    /// Persistence and source access.
    store: S,
}

impl<S: DocumentStore + SourceText> AnnotationService<S> {
    /// Delete one comment or note. Returns `false` without writing when `doc`
    /// or `id` is empty or no such entry exists.
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistenceFailure` if the updated file cannot be written.
    pub fn delete_annotation(&mut self, doc: &Path, id: &str, kind: AnnotationKind) -> Result<bool, Error> {
        if doc.as_os_str().is_empty() || id.is_empty() {
            return Ok(false);
        }

        let mut file = self.load_annotations(doc);
        if file.map_mut(kind).remove(id).is_none() {
            debug!(doc = %doc.display(), id, kind = kind.label(), "no such annotation");
            return Ok(false);
        }

        self.persist(doc, &file)?;
        info!(doc = %doc.display(), id, kind = kind.label(), "deleted annotation");
        return Ok(true);
    }

    /// Load the annotations of `doc`. A missing file, an unreadable file, or
    /// corrupt content all yield an empty set; the latter two are logged.
    pub fn load_annotations(&self, doc: &Path) -> AnnotationsFile {
        let path = annotations_path(&self.annotations_dir, doc);
        if !self.store.exists(&path) {
            debug!(path = %path.display(), "no annotations file");
            return AnnotationsFile::default();
        }

        let content = match self.store.read(&path) {
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read annotations, starting empty");
                return AnnotationsFile::default();
            },
            Ok(content) => content,
        };

        return match AnnotationsFile::parse(&content, &path) {
            Err(e) => {
                warn!(error = %e, "corrupt annotations file, starting empty");
                AnnotationsFile::default()
            },
            Ok(file) => {
                debug!(path = %path.display(), count = file.len(), "loaded annotations");
                file
            },
        };
    }

    /// A service persisting under `annotations_dir`.
    pub const fn new(store: S, annotations_dir: PathBuf) -> Self {
        return Self { annotations_dir, store };
    }

    /// Write the whole annotations file of `doc`, creating the folder first.
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistenceFailure` if the folder or file cannot be written.
    pub fn persist(&mut self, doc: &Path, file: &AnnotationsFile) -> Result<(), Error> {
        let path = annotations_path(&self.annotations_dir, doc);
        let failure = |reason: String| {
            error!(path = %path.display(), reason = %reason, "could not persist annotations");
            return Error::PersistenceFailure {
                path: path.clone(),
                reason,
            };
        };

        if !self.store.exists(&self.annotations_dir) {
            self.store
                .create_folder(&self.annotations_dir)
                .map_err(|e| return failure(e.to_string()))?;
        }

        let content = file.serialize().map_err(|e| return failure(e.to_string()))?;
        self.store.write(&path, &content).map_err(|e| return failure(e.to_string()))?;
        debug!(path = %path.display(), count = file.len(), "wrote annotations");
        return Ok(());
    }

    /// Store the `index`-th parsed comment of `doc` as a comment on `target`.
    /// The title becomes the display text and start fragment, the body the end
    /// fragment. Both are taken from the source as written, link markup included,
    /// so the stored fragments can be located again.
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceNotFound`/`SourceUnreadable` if the document
    /// cannot be read, `Error::ParsedCommentNotFound` if there is no such
    /// comment, and any error from [`Self::save_comment`].
    pub fn promote_parsed_comment(&mut self, doc: &Path, index: usize, target: &str) -> Result<String, Error> {
        let text = self.store.current_text(doc)?;
        let comments = parser::parse(&text);
        let Some(parsed) = comments.get(index) else {
            return Err(Error::ParsedCommentNotFound {
                count: comments.len(),
                index,
                path: doc.to_path_buf(),
            });
        };

        let title_words = parsed.title.split_whitespace().count();
        let (title_indices, body_indices) = parsed.indices.split_at(title_words.min(parsed.indices.len()));
        let words = parser::words(&text);
        let title = original_slice(&text, &words, title_indices).unwrap_or(parsed.title.as_str()).to_string();
        let body = original_slice(&text, &words, body_indices).unwrap_or(parsed.body.as_str()).to_string();

        let src_anchor = SpanAnchor {
            display: title.clone(),
            display_range: title_indices.to_vec(),
            end: body.clone(),
            range: parsed.indices.clone(),
            start: title,
            text: body,
        };

        return self.save_comment(CommentFields {
            src: doc.to_path_buf(),
            src_anchor,
            target: target.to_string(),
            target_anchor: SpanAnchor::default(),
        });
    }

    /// Create a comment and return its id.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingRequiredField` if the target or source is empty,
    /// `Error::MalformedRange` if either anchor breaks the range invariants,
    /// or `Error::PersistenceFailure` if the file cannot be written.
    pub fn save_comment(&mut self, fields: CommentFields) -> Result<String, Error> {
        require(&fields.target, &fields.src)?;
        fields.src_anchor.check_ranges()?;
        fields.target_anchor.check_ranges()?;

        let annotation = AnnotationData {
            id: String::new(),
            is_valid: None,
            kind: AnnotationKind::Comment,
            src: fields.src,
            src_anchor: fields.src_anchor,
            target: fields.target,
            target_anchor: fields.target_anchor,
            timestamp: Utc::now(),
        };
        return self.insert(annotation);
    }

    /// Create a note by locating its fragments in the current source text,
    /// and return its id.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingRequiredField` if the target or source is empty,
    /// `Error::SourceNotFound`/`SourceUnreadable` if the source cannot be read,
    /// `Error::Anchor` if the fragments cannot be located,
    /// or `Error::PersistenceFailure` if the file cannot be written.
    pub fn save_note(&mut self, fields: NoteFields) -> Result<String, Error> {
        require(&fields.target, &fields.src)?;

        let text = self.store.current_text(&fields.src)?;
        let src_anchor =
            anchor::anchor_span(&text, &fields.start, &fields.end, &fields.display).map_err(|source| {
                return Error::Anchor {
                    path: fields.src.clone(),
                    source,
                };
            })?;

        let annotation = AnnotationData {
            id: String::new(),
            is_valid: None,
            kind: AnnotationKind::Note,
            src: fields.src,
            src_anchor,
            target: fields.target,
            target_anchor: SpanAnchor::default(),
            timestamp: Utc::now(),
        };
        return self.insert(annotation);
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        return &self.store;
    }

    /// Validate every comment and note of `doc`, record each outcome in its
    /// `isValid` flag, and persist. Never fails: a write failure is logged and
    /// carried in the report.
    pub fn validate_all_annotations(&mut self, doc: &Path) -> ValidationReport {
        let mut file = self.load_annotations(doc);
        let mut entries = Vec::with_capacity(file.len());

        for kind in [AnnotationKind::Comment, AnnotationKind::Note] {
            for annotation in file.map_mut(kind).values_mut() {
                let status = match kind {
                    AnnotationKind::Comment => self.validate_comment(annotation, doc),
                    AnnotationKind::Note => self.validate_note(annotation, doc),
                };
                if let Some(message) = &status.message {
                    warn!(doc = %doc.display(), id = %annotation.id, kind = kind.label(), reason = %message, "stale annotation");
                }
                annotation.is_valid = Some(status.is_valid);
                entries.push(ValidationEntry {
                    id: annotation.id.clone(),
                    kind,
                    status,
                });
            }
        }

        let persist_error = if entries.is_empty() {
            None
        } else {
            self.persist(doc, &file).err().map(|e| return e.to_string())
        };

        return ValidationReport {
            doc: doc.to_path_buf(),
            entries,
            persist_error,
        };
    }

    /// Re-locate a comment's source fragments in the current text of `doc`.
    pub fn validate_comment(&self, annotation: &AnnotationData, doc: &Path) -> ValidationStatus {
        return match self.store.current_text(doc) {
            Err(e) => source_failure(&e),
            Ok(text) => check_fragments(&text, &annotation.src_anchor),
        };
    }

    /// Like [`Self::validate_comment`], and additionally require the
    /// `[[@target]]` link (optionally with an `|alias`) in the source.
    pub fn validate_note(&self, annotation: &AnnotationData, doc: &Path) -> ValidationStatus {
        let text = match self.store.current_text(doc) {
            Err(e) => return source_failure(&e),
            Ok(text) => text,
        };

        let status = check_fragments(&text, &annotation.src_anchor);
        if !status.is_valid {
            return status;
        }

        if !has_target_marker(&text, &annotation.target) {
            return ValidationStatus::invalid(TARGET_MISSING);
        }
        return status;
    }

    /// Assign a fresh id, merge into the document's file, and persist.
    ///
    /// # Errors
    ///
    /// Returns `Error::PersistenceFailure` if the file cannot be written.
    fn insert(&mut self, mut annotation: AnnotationData) -> Result<String, Error> {
        let doc = annotation.src.clone();
        let mut file = self.load_annotations(&doc);

        annotation.id = ids::fresh_id(
            &file,
            annotation.kind,
            &doc.to_string_lossy(),
            &annotation.target,
            &annotation.src_anchor,
            annotation.timestamp,
        );
        let id = annotation.id.clone();
        let kind = annotation.kind;
        file.map_mut(kind).insert(id.clone(), annotation);

        self.persist(&doc, &file)?;
        info!(doc = %doc.display(), id = %id, kind = kind.label(), "saved annotation");
        return Ok(id);
    }
}

/// Run the anchor validator against stored fragments.
fn check_fragments(text: &str, anchor: &SpanAnchor) -> ValidationStatus {
    return match anchor::locate(text, &anchor.start, &anchor.end, &anchor.display) {
        Err(e) => ValidationStatus::invalid(e.stage_message()),
        Ok(_) => ValidationStatus::valid(),
    };
}

/// Source text from the first to the last of `indices`, as written.
fn original_slice<'t>(text: &'t str, words: &[parser::IndexedWord], indices: &[usize]) -> Option<&'t str> {
    let first = words.get(*indices.first()?)?;
    let last = words.get(*indices.last()?)?;
    return text.get(first.span.start..last.span.end);
}

/// Whether `text` still links to `target` as `[[@target]]` or `[[@target|alias]]`.
fn has_target_marker(text: &str, target: &str) -> bool {
    return text.contains(&format!("[[@{target}]]")) || text.contains(&format!("[[@{target}|"));
}

/// Reject an annotation without a target or source.
///
/// # Errors
///
/// Returns `Error::MissingRequiredField` naming the empty field.
fn require(target: &str, src: &Path) -> Result<(), Error> {
    if target.trim().is_empty() {
        return Err(Error::MissingRequiredField { field: "target" });
    }
    if src.as_os_str().is_empty() {
        return Err(Error::MissingRequiredField { field: "source path" });
    }
    return Ok(());
}

/// Status for a source document that could not be read.
fn source_failure(e: &Error) -> ValidationStatus {
    return match e {
        Error::SourceNotFound { .. } => ValidationStatus::invalid("Source document not found"),
        _ => ValidationStatus::invalid("Source document could not be read"),
    };
}
