/// Crate-level error types for annoref diagnostics.
use std::path::PathBuf;

use crate::anchor::AnchorError;

/// All errors in annoref carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the document, field, or reason for failure.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Stored fragments could not be re-located in the source document.
    #[error("could not locate text boundaries in {}: {source}", path.display())]
    Anchor {
        /// Document that was searched.
        path: PathBuf,
        /// Which stage of anchor resolution failed.
        #[source]
        source: AnchorError,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization of an annotations file failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped serde_json error.
        #[from]
        serde_json::Error,
    ),

    /// A word range violates the ordering invariants of a span anchor.
    #[error("malformed range: {reason}")]
    MalformedRange {
        /// Description of the violated invariant.
        reason: String,
    },

    /// A field required to create an annotation was empty.
    #[error("{field} is required")]
    MissingRequiredField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// A stored annotations file or markdown document could not be parsed.
    #[error("parse failed: {}: {reason}", path.display())]
    ParseFailure {
        /// File that failed to parse.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The requested parsed comment does not exist in the document.
    #[error("no parsed comment #{index} in {} ({count} found)", path.display())]
    ParsedCommentNotFound {
        /// Number of comments the parser found.
        count: usize,
        /// Zero-based index that was requested.
        index: usize,
        /// Document that was parsed.
        path: PathBuf,
    },

    /// Writing the annotations file (or creating its folder) failed.
    #[error("could not persist annotations to {}: {reason}", path.display())]
    PersistenceFailure {
        /// Annotations file or folder being written.
        path: PathBuf,
        /// Description of the I/O failure.
        reason: String,
    },

    /// The annotated source document does not exist.
    #[error("source document not found: {}", path.display())]
    SourceNotFound {
        /// Path to the missing document.
        path: PathBuf,
    },

    /// The annotated source document exists but reading it failed.
    #[error("could not read source file {}: {reason}", path.display())]
    SourceUnreadable {
        /// Path to the unreadable document.
        path: PathBuf,
        /// Description of the read failure.
        reason: String,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The filesystem watcher could not be set up.
    #[error("watch failed: {reason}")]
    Watch {
        /// Description of the watcher failure.
        reason: String,
    },
}
