use std::fmt::Write as _;
use std::path::Path;

use crate::anchor::AnchorError;
use crate::error::Error;
use crate::logging::RecentLogs;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Log lines shown under an error.
const LOG_TAIL: usize = 10;

/// Render an error as valid markdown with bold headings and print it to
/// stderr, followed by the most recent log lines.
pub fn print_error(e: &Error, logs: &RecentLogs) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }

    let tail = render_log_tail(&logs.snapshot());
    if !tail.is_empty() {
        eprintln!();
        for line in tail.lines() {
            if line.starts_with('#') {
                eprintln!("{BOLD}{line}{RESET}");
            } else {
                eprintln!("{line}");
            }
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where the user can
/// act on it, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::Anchor { path, source } => render_anchor(path, source),
        Error::MalformedRange { reason } => format!("\
# Error: Malformed Range

{reason}

## Fix

Word ranges must be ordered, and the display range must be a contiguous
part of the span range.
"),
        Error::MissingRequiredField { field } => format!("\
# Error: Missing Field

The {field} is required.

## Fix

Pass a non-empty value, for example:

    annoref note notes/reading.md --target article-id --start \"first words\" --end \"last words\"
"),
        Error::ParsedCommentNotFound { count, index, path } => format!("\
# Error: Parsed Comment Not Found

`{}` has {count} parsed comments; index {index} does not exist.

## Fix

List the comments and their indices:

    annoref parse {}
", path.display(), path.display()),
        Error::PersistenceFailure { path, reason } => format!("\
# Error: Could Not Save Annotations

Writing `{}` failed: {reason}

## Fix

Check that the annotations folder is writable.
", path.display()),
        Error::SourceNotFound { path } => format!("\
# Error: Source Not Found

`{}` does not exist.
", path.display()),
        _ => render_generic(e),
    };
}

/// Errors without a specific fix.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        Error::ParseFailure { path, reason } => format!("\
# Error: Parse Failed

Could not parse `{}`: {reason}
", path.display()),
        Error::SourceUnreadable { path, reason } => format!("\
# Error: Source Unreadable

Could not read source file `{}`: {reason}
", path.display()),
        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

{e}

## Fix

Correct `.annoref.toml`, or delete it to use the defaults.
"),
        _ => format!("\
# Error

{e}
"),
    };
}

/// Anchor failures name the fragment that was searched for.
fn render_anchor(path: &Path, source: &AnchorError) -> String {
    let mut out = format!("\
# Error: Could Not Locate Text Boundaries

{} in `{}`.
", source.stage_message(), path.display());

    match source {
        AnchorError::DisplayNotFound { fragment } => {
            let _ = write!(out, "\nThe display text `{fragment}` is not between the start and end fragments.\n");
        },
        AnchorError::EndNotFound { fragment } => {
            let _ = write!(out, "\n`{fragment}` does not occur after the start fragment.\n");
        },
        AnchorError::OrderInverted { .. } => {},
        AnchorError::StartNotFound { fragment } => {
            let _ = write!(out, "\n`{fragment}` does not occur in the document.\n");
        },
    }

    out.push_str("\
\n## Fix

Fragments must match the document text exactly, including punctuation.
The first occurrence of the start fragment is used.
");
    return out;
}

/// The last few log lines as a markdown section, or nothing if there are none.
fn render_log_tail(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }

    let mut out = String::from("## Recent log\n\n");
    let skip = lines.len().saturating_sub(LOG_TAIL);
    for line in lines.iter().skip(skip) {
        let _ = writeln!(out, "    {line}");
    }
    return out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn anchor_error_names_stage_and_fragment() {
        let err = Error::Anchor {
            path: PathBuf::from("a.md"),
            source: AnchorError::StartNotFound {
                fragment: "quick".to_string(),
            },
        };
        let md = render_error(&err);
        assert!(md.starts_with("# Error: Could Not Locate Text Boundaries"));
        assert!(md.contains("Text Start not found in `a.md`"));
        assert!(md.contains("`quick`"));
        assert!(md.contains("## Fix"));
    }

    #[test]
    fn missing_field_suggests_a_command() {
        let md = render_error(&Error::MissingRequiredField { field: "target" });
        assert!(md.contains("The target is required."));
        assert!(md.contains("annoref note"));
    }

    #[test]
    fn log_tail_keeps_the_last_lines() {
        let lines: Vec<String> = (0..15).map(|i| format!("event {i}")).collect();
        let tail = render_log_tail(&lines);
        assert!(tail.starts_with("## Recent log"));
        assert!(!tail.contains("event 4\n"));
        assert!(tail.contains("event 5\n"));
        assert!(tail.contains("event 14\n"));
        assert!(render_log_tail(&[]).is_empty());
    }
}
