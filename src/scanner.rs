use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;
use crate::store::annotations_path;

/// Find all markdown files under `root` that the config's include/exclude
/// filters allow. Paths are relative to `root`, sorted, and skip hidden
/// directories.
pub fn scan(root: &Path, config: &Config) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| return e.depth() == 0 || !is_hidden(e.file_name()))
        .filter_map(Result::ok)
        .filter(|e| return e.file_type().is_file() && is_markdown(e.path()))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).unwrap_or(e.path()).to_path_buf();
            return config.should_scan(&relative.to_string_lossy()).then_some(relative);
        })
        .collect();

    found.sort();
    return found;
}

/// The scanned markdown files that already have an annotations file.
pub fn scan_annotated(root: &Path, config: &Config) -> Vec<PathBuf> {
    return scan(root, config)
        .into_iter()
        .filter(|doc| return root.join(annotations_path(&config.annotations_dir, doc)).exists())
        .collect();
}

/// Dot-prefixed names (`.git`, `.annotations`) are never descended into.
fn is_hidden(name: &std::ffi::OsStr) -> bool {
    return name.to_string_lossy().starts_with('.');
}

/// `.md` or `.markdown`, any case.
fn is_markdown(path: &Path) -> bool {
    return path
        .extension()
        .is_some_and(|ext| return ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "text").unwrap();
    }

    #[test]
    fn finds_markdown_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.md");
        touch(dir.path(), "docs/a.MD");
        touch(dir.path(), "docs/notes.txt");
        touch(dir.path(), ".git/HEAD.md");

        let found = scan(dir.path(), &Config::default());
        assert_eq!(found, vec![PathBuf::from("b.md"), PathBuf::from("docs/a.MD")]);
    }

    #[test]
    fn only_annotated_documents() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.md");
        touch(dir.path(), "b.md");
        touch(dir.path(), ".annotations/b.annotations");

        let found = scan_annotated(dir.path(), &Config::default());
        assert_eq!(found, vec![PathBuf::from("b.md")]);
    }
}
