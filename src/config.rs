use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::logging;

/// Config file name, looked up in the workspace root.
pub const CONFIG_FILE: &str = ".annoref.toml";

/// Default folder holding annotations files.
const DEFAULT_ANNOTATIONS_DIR: &str = ".annotations";

/// Project configuration loaded from `.annoref.toml`.
/// Include/exclude patterns are path prefixes applied to markdown source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Folder holding annotations files, relative to the workspace root.
    pub annotations_dir: PathBuf,
    /// Path prefixes never scanned.
    exclude: Vec<String>,
    /// Path prefixes scanned; empty means everything.
    include: Vec<String>,
    /// Lines kept in the recent-log buffer.
    pub log_capacity: usize,
}

/// Raw TOML structure for `.annoref.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct AnnorefTomlConfig {
    /// See [`Config::annotations_dir`].
    annotations_dir: Option<PathBuf>,
    /// See [`Config::exclude`].
    #[serde(default)]
    exclude: Vec<String>,
    /// See [`Config::include`].
    #[serde(default)]
    include: Vec<String>,
    /// See [`Config::log_capacity`].
    log_capacity: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            annotations_dir: PathBuf::from(DEFAULT_ANNOTATIONS_DIR),
            exclude: Vec::new(),
            include: Vec::new(),
            log_capacity: logging::DEFAULT_CAPACITY,
        };
    }
}

impl Config {
    /// Load config from `.annoref.toml` in the given root directory.
    /// Returns the defaults if the file doesn't exist. A file that exists but
    /// is malformed is an error, never a silent fallback.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        let raw: AnnorefTomlConfig = toml::from_str(&content)?;
        let defaults = Self::default();
        return Ok(Self {
            annotations_dir: raw.annotations_dir.unwrap_or(defaults.annotations_dir),
            exclude: raw.exclude,
            include: raw.include,
            log_capacity: raw.log_capacity.unwrap_or(defaults.log_capacity),
        });
    }

    /// Check whether a markdown file path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    /// Anything under the annotations folder is never scanned.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        if Path::new(relative_path).starts_with(&self.annotations_dir) {
            return false;
        }

        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.annotations_dir, PathBuf::from(".annotations"));
        assert_eq!(config.log_capacity, 200);
    }

    #[test]
    fn reads_every_field() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "annotations_dir = \"meta/notes\"\ninclude = [\"docs/\"]\nexclude = [\"docs/archive/\"]\nlog_capacity = 5\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.annotations_dir, PathBuf::from("meta/notes"));
        assert_eq!(config.log_capacity, 5);
        assert!(config.should_scan("docs/guide.md"));
        assert!(!config.should_scan("docs/archive/old.md"));
        assert!(!config.should_scan("README.md"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "include = \"not a list\"\n").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }

    #[test]
    fn annotations_folder_is_never_scanned() {
        let config = Config::default();
        assert!(!config.should_scan(".annotations/readme.md"));
        assert!(config.should_scan("notes/readme.md"));
    }
}
