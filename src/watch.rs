//! File watcher: runs `check` on startup, then re-runs on markdown changes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};
use tracing::{debug, warn};

use crate::commands::{self, Workspace};
use crate::error;

/// Debounce delay between filesystem events and re-check.
const DEBOUNCE_MS: u64 = 100;

/// Directories to watch and how: the parents of the given documents, or the
/// whole workspace recursively when none are given.
fn collect_watch_dirs(root: &Path, docs: &[PathBuf]) -> (BTreeSet<PathBuf>, RecursiveMode) {
    if docs.is_empty() {
        return (BTreeSet::from([root.to_path_buf()]), RecursiveMode::Recursive);
    }

    let dirs = docs
        .iter()
        .map(|doc| return root.join(doc.parent().unwrap_or(Path::new(""))))
        .collect();
    return (dirs, RecursiveMode::NonRecursive);
}

/// Create a filesystem watcher that signals the channel on markdown changes.
/// Annotations files are written by `check` itself and never trigger a re-check.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(tx: crossbeam_channel::Sender<()>) -> Result<notify::RecommendedWatcher, error::Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
            )
            && event.paths.iter().any(|p| return is_markdown(p))
        {
            let _ = tx.send(());
        }
    })
    .map_err(|e| {
        return error::Error::Watch {
            reason: format!("watcher setup failed: {e}"),
        };
    });
}

/// `.md` or `.markdown` file.
fn is_markdown(path: &Path) -> bool {
    return path
        .extension()
        .is_some_and(|ext| return ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"));
}

/// Entry point for the watch command.
///
/// Runs an initial check, then watches the documents and re-checks on changes.
/// Returns the exit code of the last check once the event channel closes.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be set up.
pub fn run(ws: &Workspace, docs: &[PathBuf]) -> Result<ExitCode, error::Error> {
    eprintln!("watch: initial check");
    let mut last_code = commands::check(ws, docs);

    let (watch_dirs, mode) = collect_watch_dirs(&ws.root, docs);
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;

    for dir in &watch_dirs {
        if !dir.exists() {
            continue;
        }
        if let Err(e) = watcher.watch(dir, mode) {
            warn!(dir = %dir.display(), error = %e, "cannot watch directory");
        }
    }

    let dir_count = watch_dirs.len();
    eprintln!("watch: monitoring {dir_count} directories, press Ctrl+C to stop");

    while rx.recv().is_ok() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while rx.recv_timeout(debounce).is_ok() {}
        debug!("change detected");
        eprintln!("watch: change detected, re-checking...");
        last_code = commands::check(ws, docs);
    }

    return Ok(last_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_documents_watches_the_root_recursively() {
        let (dirs, mode) = collect_watch_dirs(Path::new("."), &[]);
        assert_eq!(dirs, BTreeSet::from([PathBuf::from(".")]));
        assert_eq!(mode, RecursiveMode::Recursive);
    }

    #[test]
    fn documents_share_parent_directories() {
        let docs = [PathBuf::from("notes/a.md"), PathBuf::from("notes/b.md"), PathBuf::from("c.md")];
        let (dirs, mode) = collect_watch_dirs(Path::new("/w"), &docs);
        assert_eq!(dirs.len(), 2);
        assert!(dirs.contains(Path::new("/w/notes")));
        assert_eq!(mode, RecursiveMode::NonRecursive);
    }

    #[test]
    fn only_markdown_triggers() {
        assert!(is_markdown(Path::new("a/b.md")));
        assert!(!is_markdown(Path::new(".annotations/b.annotations")));
    }
}
