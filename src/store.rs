//! Annotations file persistence: path scheme, JSON codec, and the storage
//! collaborators the service reads and writes through.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{AnnotationData, AnnotationKind};

/// Extension of every annotations file.
pub const ANNOTATIONS_EXTENSION: &str = "annotations";

/// File stem used when the source path is empty or has no stem.
const UNTITLED_STEM: &str = "untitled";

/// Directory and file operations the service persists through.
pub trait DocumentStore {
    /// Create a folder and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the folder cannot be created.
    fn create_folder(&mut self, path: &Path) -> Result<(), Error>;

    /// Whether a file or folder exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Read a whole file as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file is absent or unreadable.
    fn read(&self, path: &Path) -> Result<String, Error>;

    /// Replace a whole file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be written.
    fn write(&mut self, path: &Path, content: &str) -> Result<(), Error>;
}

/// Access to the current text of a source document. An editor host would
/// return unsaved buffer contents here; the filesystem store returns disk state.
pub trait SourceText {
    /// Current full text of the document.
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceNotFound` if the document does not exist,
    /// or `Error::SourceUnreadable` if it cannot be read.
    fn current_text(&self, doc: &Path) -> Result<String, Error>;
}

/// All comments and notes of one source document. Maps are keyed by id and
/// ordered, so serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationsFile {
    /// Comments by id.
    #[serde(default)]
    pub comments: BTreeMap<String, AnnotationData>,
    /// Notes by id.
    #[serde(default)]
    pub notes: BTreeMap<String, AnnotationData>,
}

impl AnnotationsFile {
    /// Whether any map already uses `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        return self.comments.contains_key(id) || self.notes.contains_key(id);
    }

    /// Total number of comments and notes.
    pub fn len(&self) -> usize {
        return self.comments.len().saturating_add(self.notes.len());
    }

    /// The map holding annotations of `kind`.
    pub fn map(&self, kind: AnnotationKind) -> &BTreeMap<String, AnnotationData> {
        return match kind {
            AnnotationKind::Comment => &self.comments,
            AnnotationKind::Note => &self.notes,
        };
    }

    /// The mutable map holding annotations of `kind`.
    pub fn map_mut(&mut self, kind: AnnotationKind) -> &mut BTreeMap<String, AnnotationData> {
        return match kind {
            AnnotationKind::Comment => &mut self.comments,
            AnnotationKind::Note => &mut self.notes,
        };
    }

    /// Parse an annotations file from JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailure` naming `path` if the content is not a valid annotations file.
    pub fn parse(content: &str, path: &Path) -> Result<Self, Error> {
        return serde_json::from_str(content).map_err(|e| return Error::ParseFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        });
    }

    /// Serialize to pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn serialize(&self) -> Result<String, Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        return Ok(out);
    }
}

/// Where the annotations for `doc` live: `{dir}/{stem}.annotations`.
/// Documents with the same stem in different folders share a file.
pub fn annotations_path(dir: &Path, doc: &Path) -> PathBuf {
    let stem = doc
        .file_stem()
        .map(|s| return s.to_string_lossy().into_owned())
        .filter(|s| return !s.is_empty())
        .unwrap_or_else(|| return UNTITLED_STEM.to_string());
    return dir.join(format!("{stem}.{ANNOTATIONS_EXTENSION}"));
}

/// Filesystem store rooted at a workspace directory. Relative paths resolve
/// against the root.
pub struct FsStore {
    /// Workspace root.
    root: PathBuf,
}

impl FsStore {
    /// A store resolving paths against `root`.
    pub const fn new(root: PathBuf) -> Self {
        return Self { root };
    }

    /// Absolute (or root-relative) location of `path`.
    fn resolve(&self, path: &Path) -> PathBuf {
        return self.root.join(path);
    }
}

impl DocumentStore for FsStore {
    fn create_folder(&mut self, path: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(self.resolve(path))?;
        return Ok(());
    }

    fn exists(&self, path: &Path) -> bool {
        return self.resolve(path).exists();
    }

    fn read(&self, path: &Path) -> Result<String, Error> {
        return Ok(std::fs::read_to_string(self.resolve(path))?);
    }

    fn write(&mut self, path: &Path, content: &str) -> Result<(), Error> {
        std::fs::write(self.resolve(path), content)?;
        return Ok(());
    }
}

impl SourceText for FsStore {
    fn current_text(&self, doc: &Path) -> Result<String, Error> {
        return match std::fs::read_to_string(self.resolve(doc)) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::SourceNotFound {
                path: doc.to_path_buf(),
            }),
            Err(e) => Err(Error::SourceUnreadable {
                path: doc.to_path_buf(),
                reason: e.to_string(),
            }),
            Ok(text) => Ok(text),
        };
    }
}

/// In-memory store for service tests. Counts writes so tests can assert
/// that rejected operations touch nothing.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// File contents by path.
    pub files: BTreeMap<PathBuf, String>,
    /// Folders created so far.
    pub folders: Vec<PathBuf>,
    /// Paths whose reads fail with an I/O error.
    pub unreadable: Vec<PathBuf>,
    /// Make every `create_folder` and `write` fail.
    pub unwritable: bool,
    /// Number of successful `write` calls.
    pub writes: usize,
}

#[cfg(test)]
impl MemoryStore {
    /// Builder-style file insertion.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(PathBuf::from(path), content.to_string());
        self
    }
}

#[cfg(test)]
impl DocumentStore for MemoryStore {
    fn create_folder(&mut self, path: &Path) -> Result<(), Error> {
        if self.unwritable {
            return Err(Error::Io(std::io::Error::other("read-only file system")));
        }
        self.folders.push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.folders.iter().any(|f| f == path)
    }

    fn read(&self, path: &Path) -> Result<String, Error> {
        if self.unreadable.iter().any(|p| p == path) {
            return Err(Error::Io(std::io::Error::other("permission denied")));
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound)))
    }

    fn write(&mut self, path: &Path, content: &str) -> Result<(), Error> {
        if self.unwritable {
            return Err(Error::Io(std::io::Error::other("read-only file system")));
        }
        self.files.insert(path.to_path_buf(), content.to_string());
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
impl SourceText for MemoryStore {
    fn current_text(&self, doc: &Path) -> Result<String, Error> {
        if !self.files.contains_key(doc) {
            return Err(Error::SourceNotFound { path: doc.to_path_buf() });
        }
        self.read(doc).map_err(|e| Error::SourceUnreadable {
            path: doc.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpanAnchor;

    fn sample() -> AnnotationsFile {
        let mut file = AnnotationsFile::default();
        let comment = AnnotationData {
            id: "c1".to_string(),
            is_valid: Some(true),
            kind: AnnotationKind::Comment,
            src: PathBuf::from("notes/reading.md"),
            src_anchor: SpanAnchor {
                display: "brown fox".to_string(),
                display_range: vec![2, 3],
                end: "jumps".to_string(),
                range: vec![1, 2, 3, 4],
                start: "quick".to_string(),
                text: "quick brown fox jumps".to_string(),
            },
            target: "article-9".to_string(),
            target_anchor: SpanAnchor::default(),
            timestamp: chrono::Utc::now(),
        };
        let mut note = comment.clone();
        note.id = "n1".to_string();
        note.kind = AnnotationKind::Note;
        note.is_valid = None;
        file.comments.insert(comment.id.clone(), comment);
        file.notes.insert(note.id.clone(), note);
        file
    }

    #[test]
    fn path_uses_document_stem() {
        let path = annotations_path(Path::new(".annotations"), Path::new("notes/reading.md"));
        assert_eq!(path, PathBuf::from(".annotations/reading.annotations"));
    }

    #[test]
    fn empty_source_maps_to_sentinel() {
        let path = annotations_path(Path::new(".annotations"), Path::new(""));
        assert_eq!(path, PathBuf::from(".annotations/untitled.annotations"));
    }

    #[test]
    fn json_round_trip() {
        let file = sample();
        let json = file.serialize().unwrap();
        let parsed = AnnotationsFile::parse(&json, Path::new("x")).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn json_shape() {
        let json = sample().serialize().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["comments"]["c1"]["kind"], "COMMENT");
        assert_eq!(value["comments"]["c1"]["isValid"], true);
        assert!(value["notes"]["n1"].get("isValid").is_none());
        assert_eq!(value["notes"]["n1"]["src_anchor"]["range"], serde_json::json!([1, 2, 3, 4]));
    }

    #[test]
    fn empty_object_parses_as_empty_file() {
        let parsed = AnnotationsFile::parse("{}", Path::new("x")).unwrap();
        assert_eq!(parsed, AnnotationsFile::default());
    }

    #[test]
    fn corrupt_content_names_the_file() {
        let err = AnnotationsFile::parse("{not json", Path::new("a.annotations")).unwrap_err();
        assert!(matches!(err, Error::ParseFailure { ref path, .. } if path == Path::new("a.annotations")));
    }

    #[test]
    fn fs_store_reports_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().to_path_buf());
        let err = store.current_text(Path::new("missing.md")).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn fs_store_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsStore::new(dir.path().to_path_buf());
        store.create_folder(Path::new(".annotations")).unwrap();
        store.write(Path::new(".annotations/a.annotations"), "{}").unwrap();
        assert!(store.exists(Path::new(".annotations/a.annotations")));
        assert_eq!(store.read(Path::new(".annotations/a.annotations")).unwrap(), "{}");
    }
}
