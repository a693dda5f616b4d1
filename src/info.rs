use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{CONFIG_FILE, Config};
use crate::scanner;

/// Output the comprehensive annoref reference document.
pub fn run(json: bool) {
    let root = PathBuf::from(".");
    let state = gather_state(&root);

    if json {
        print_json(&state);
    } else {
        print_markdown(&state);
    }
}

// ── State gathering ───────────────────────────────────────────────────

/// Workspace facts shown under "Current State".
struct CurrentState {
    /// Documents with an annotations file.
    annotated_documents: usize,
    /// Folder holding annotations files.
    annotations_dir: PathBuf,
    /// Whether `.annoref.toml` loaded successfully.
    config_found: bool,
    /// Markdown documents the scanner sees.
    markdown_documents: usize,
}

/// Inspect the workspace. A missing or malformed config falls back to defaults here.
fn gather_state(root: &Path) -> CurrentState {
    let loaded = Config::load(root).ok().filter(|_| return root.join(CONFIG_FILE).exists());
    let config_found = loaded.is_some();
    let config = loaded.unwrap_or_default();

    return CurrentState {
        annotated_documents: scanner::scan_annotated(root, &config).len(),
        annotations_dir: config.annotations_dir.clone(),
        config_found,
        markdown_documents: scanner::scan(root, &config).len(),
    };
}

// ── Markdown output ───────────────────────────────────────────────────

/// Full reference document as markdown.
fn print_markdown(state: &CurrentState) {
    let version = env!("CARGO_PKG_VERSION");
    print_markdown_header(version);
    print_markdown_state(state);
    println!();
    print_markdown_exit_codes();
}

/// Everything above the current state.
fn print_markdown_header(version: &str) {
    print!(
        "\
# annoref {version}

Text-anchored comments and notes for markdown. An annotation stores three
fragments of the document: where its span starts, where it ends, and the
text it displays. `check` re-locates every fragment in the current text and
flags annotations whose text was edited away.

## Comment Syntax

    Title sentence. Body sentence:       parsed as one comment
    [[@article-id]]                      link a note's target article
    [[@article-id|label]]                same, with a display label

## Workflow

    annoref comment <doc> --target <id> --start <s> --end <e> [--display <d>]
    annoref comment <doc> --target <id> --parsed <n>    store a parsed comment
    annoref note <doc> --target <id> --start <s> --end <e> [--display <d>]
    annoref list <doc> [--json]          show stored annotations
    annoref check [doc...]               re-validate every annotation (exit 0/1)
    annoref delete <doc> <id> --kind comment|note
    annoref parse <doc> [--json]         show parsed comments with word indices
    annoref render <doc> [--article <id>]  word-indexed HTML on stdout
    annoref watch [doc...]               re-check on every markdown change

## Configuration (.annoref.toml)

    annotations_dir = \".annotations\"    # where {{stem}}.annotations files live
    include = [\"docs/\"]                 # only scan these paths
    exclude = [\"docs/archive/\"]         # skip these paths
    log_capacity = 200                  # log lines kept for error reports

## Current State

"
    );
}

/// The gathered workspace facts.
fn print_markdown_state(state: &CurrentState) {
    if state.config_found {
        println!("Config:      {CONFIG_FILE} (found)");
    } else {
        println!("Config:      {CONFIG_FILE} (not found, using defaults)");
    }
    println!("Annotations: {}", state.annotations_dir.display());
    println!(
        "Documents:   {} markdown, {} annotated",
        state.markdown_documents, state.annotated_documents,
    );
}

/// Exit code table.
fn print_markdown_exit_codes() {
    print!(
        "\
## Exit Codes

| Code | Meaning |
|------|---------|
| 0    | Success / all annotations valid |
| 1    | Stale annotations found, or nothing to delete |
| 2    | Runtime error |
"
    );
}

// ── JSON output ───────────────────────────────────────────────────────

/// Top-level JSON document.
#[derive(Serialize)]
struct InfoJson {
    /// Commands and their synopsis.
    commands: Vec<CommandInfo>,
    /// Current workspace facts.
    current_state: StateJson,
    /// Exit code table.
    exit_codes: Vec<ExitCodeInfo>,
    /// Crate version.
    version: String,
}

/// One CLI command.
#[derive(Serialize)]
struct CommandInfo {
    /// Subcommand name.
    name: &'static str,
    /// Argument synopsis.
    usage: &'static str,
}

/// One exit code.
#[derive(Serialize)]
struct ExitCodeInfo {
    /// Process exit code.
    code: u8,
    /// What it means.
    meaning: &'static str,
}

/// JSON view of [`CurrentState`].
#[derive(Serialize)]
struct StateJson {
    /// Documents with an annotations file.
    annotated_documents: usize,
    /// Folder holding annotations files.
    annotations_dir: String,
    /// Whether `.annoref.toml` loaded successfully.
    config_found: bool,
    /// Markdown documents the scanner sees.
    markdown_documents: usize,
}

/// Full reference document as JSON.
fn print_json(state: &CurrentState) {
    let command = |name, usage| return CommandInfo { name, usage };
    let info = InfoJson {
        commands: vec![
            command("check", "[doc...]"),
            command("comment", "<doc> --target <id> (--start <s> --end <e> [--display <d>] | --parsed <n>)"),
            command("delete", "<doc> <id> --kind comment|note"),
            command("info", "[--json]"),
            command("list", "<doc> [--json]"),
            command("note", "<doc> --target <id> --start <s> --end <e> [--display <d>]"),
            command("parse", "<doc> [--json]"),
            command("render", "<doc> [--article <id>]"),
            command("watch", "[doc...]"),
        ],
        current_state: StateJson {
            annotated_documents: state.annotated_documents,
            annotations_dir: state.annotations_dir.display().to_string(),
            config_found: state.config_found,
            markdown_documents: state.markdown_documents,
        },
        exit_codes: vec![
            ExitCodeInfo { code: 0, meaning: "Success / all annotations valid" },
            ExitCodeInfo { code: 1, meaning: "Stale annotations found, or nothing to delete" },
            ExitCodeInfo { code: 2, meaning: "Runtime error" },
        ],
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    // serde_json::to_string_pretty won't fail on this structure.
    let json = serde_json::to_string_pretty(&info).unwrap_or_default();
    println!("{json}");
}
