mod anchor;
mod commands;
mod config;
mod diagnostics;
mod dom;
mod error;
mod ids;
mod indexer;
mod info;
mod logging;
mod markdown;
mod parser;
mod scanner;
mod service;
mod store;
mod types;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::{Fragments, SourceSpan, Workspace};
use crate::config::Config;
use crate::types::AnnotationKind;

#[derive(Parser)]
#[command(name = "annoref", version, about = "Text-anchored comments and notes for markdown")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every annotation; exits 1 if any is stale
    Check {
        /// Documents to check (default: every document with annotations)
        docs: Vec<PathBuf>,
    },
    /// Attach a comment to a span of a document
    Comment {
        /// Document to annotate
        doc: PathBuf,
        /// Display text inside the span (default: the whole span)
        #[arg(long, requires = "start")]
        display: Option<String>,
        /// Fragment closing the span
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Store the N-th parsed `Title. Body:` comment instead of fragments
        #[arg(long, conflicts_with_all = ["start", "end", "display"])]
        parsed: Option<usize>,
        /// Fragment opening the span
        #[arg(long, requires = "end", required_unless_present = "parsed")]
        start: Option<String>,
        /// Referenced article or document
        #[arg(long)]
        target: String,
        /// Display text in the target span
        #[arg(long, requires = "target_start")]
        target_display: Option<String>,
        /// Fragment closing the target span
        #[arg(long, requires = "target_start")]
        target_end: Option<String>,
        /// Fragment opening the target span
        #[arg(long, requires = "target_end")]
        target_start: Option<String>,
    },
    /// Delete a comment or note by id
    Delete {
        /// Document the annotation belongs to
        doc: PathBuf,
        /// Annotation id
        id: String,
        /// Which map to delete from
        #[arg(long, value_enum)]
        kind: AnnotationKind,
    },
    /// Print the reference document and current state
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the stored annotations of a document
    List {
        /// Document whose annotations to list
        doc: PathBuf,
        /// Print the stored JSON
        #[arg(long)]
        json: bool,
    },
    /// Attach a note linking a span to a target article
    Note {
        /// Document to annotate
        doc: PathBuf,
        /// Display text inside the span (default: the whole span)
        #[arg(long)]
        display: Option<String>,
        /// Fragment closing the span
        #[arg(long)]
        end: String,
        /// Fragment opening the span
        #[arg(long)]
        start: String,
        /// Referenced article
        #[arg(long)]
        target: String,
    },
    /// Show the `Title. Body:` comments found in a document
    Parse {
        /// Document to parse
        doc: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render a document to word-indexed HTML
    Render {
        /// Document to render
        doc: PathBuf,
        /// Article id used in word ids (default: document stem)
        #[arg(long)]
        article: Option<String>,
    },
    /// Check, then re-check whenever a markdown file changes
    Watch {
        /// Documents to watch (default: every document with annotations)
        docs: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let root = PathBuf::from(".");

    if let Commands::Info { json } = cli.command {
        commands::info(json);
        return ExitCode::SUCCESS;
    }

    let loaded = Config::load(&root);
    let capacity = loaded.as_ref().map_or(logging::DEFAULT_CAPACITY, |c| return c.log_capacity);
    let logs = logging::init(cli.verbose, capacity);

    let result = loaded.and_then(|config| return run(cli.command, &Workspace::new(root, config)));
    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e, &logs);
            ExitCode::from(2)
        },
    };
}

/// Dispatch one subcommand.
///
/// # Errors
///
/// Returns the command's error for `main` to render as a diagnostic.
fn run(command: Commands, ws: &Workspace) -> Result<ExitCode, error::Error> {
    match command {
        Commands::Check { docs } => return Ok(commands::check(ws, &docs)),
        Commands::Comment {
            doc,
            display,
            end,
            parsed,
            start,
            target,
            target_display,
            target_end,
            target_start,
        } => {
            let source = match (parsed, start, end) {
                (Some(index), _, _) => SourceSpan::Parsed(index),
                (None, start, end) => SourceSpan::Fragments(Fragments {
                    display: display.unwrap_or_default(),
                    end: end.unwrap_or_default(),
                    start: start.unwrap_or_default(),
                }),
            };
            let target_fragments = target_start.map(|start| {
                return Fragments {
                    display: target_display.unwrap_or_default(),
                    end: target_end.unwrap_or_default(),
                    start,
                };
            });
            commands::comment(ws, &doc, &target, &source, target_fragments.as_ref())?;
        },
        Commands::Delete { doc, id, kind } => return commands::delete(ws, &doc, &id, kind),
        Commands::Info { json } => commands::info(json),
        Commands::List { doc, json } => commands::list(ws, &doc, json)?,
        Commands::Note {
            doc,
            display,
            end,
            start,
            target,
        } => {
            let fragments = Fragments {
                display: display.unwrap_or_default(),
                end,
                start,
            };
            commands::note(ws, &doc, &target, fragments)?;
        },
        Commands::Parse { doc, json } => commands::parse(ws, &doc, json)?,
        Commands::Render { doc, article } => commands::render(ws, &doc, article.as_deref())?,
        Commands::Watch { docs } => return watch::run(ws, &docs),
    }
    return Ok(ExitCode::SUCCESS);
}
