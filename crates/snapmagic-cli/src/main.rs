use std::collections::HashMap;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use snapmagic_contracts::batch::BatchContext;
use snapmagic_contracts::events::EventWriter;
use snapmagic_contracts::photos::{PhotoRegistry, PhotoSource};
use snapmagic_contracts::runs::summary::{write_summary, BatchSummary, PhotoOutcome};
use snapmagic_contracts::session::{parse_command, SessionCommand, SESSION_HELP_COMMANDS};
use snapmagic_contracts::tools::{SelectionError, Tool, ToolSelection, TOOL_SPECS};
use snapmagic_engine::codec::dimensions;
use snapmagic_engine::download::{download_all, DownloadedPhoto};
use snapmagic_engine::{
    default_editor_registry, BatchOrchestrator, BatchReport, GeminiEditor, ImageEditor, Settlement,
};

#[derive(Debug, Parser)]
#[command(name = "snapmagic", version, about = "Batch AI photo enhancement")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Edit a set of photos with one tool and save the results.
    Edit(EditArgs),
    /// List the available tools.
    Tools,
    /// Interactive session: add, remove, run and download photos.
    Session(SessionArgs),
}

#[derive(Debug, Parser)]
struct EngineArgs {
    #[arg(long, default_value = "gemini")]
    provider: String,
    #[arg(long)]
    model: Option<String>,
    /// Maximum simultaneous edit calls; 0 sends every photo at once.
    #[arg(long, default_value_t = 0)]
    max_in_flight: usize,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(long, default_value = "one-tap")]
    tool: String,
    /// Instruction for `remove-object` and `custom`.
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    engine: EngineArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("snapmagic error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Edit(args) => run_edit(args),
        Command::Tools => {
            print_tools();
            Ok(0)
        }
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
    }
}

fn build_orchestrator(args: &EngineArgs, out_dir: &Path) -> Result<BatchOrchestrator> {
    let editor: Arc<dyn ImageEditor> = match (args.provider.trim(), args.model.as_deref()) {
        ("gemini", Some(model)) => Arc::new(GeminiEditor::from_env().with_model(model)),
        (name, Some(_)) => bail!("--model only applies to --provider gemini (got '{name}')"),
        (name, None) => {
            let editors = default_editor_registry();
            editors.get(name).ok_or_else(|| {
                anyhow!(
                    "unknown provider '{name}' (available: {})",
                    editors.names().join(", ")
                )
            })?
        }
    };
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| out_dir.join("events.jsonl"));
    Ok(BatchOrchestrator::new(editor)
        .with_events(EventWriter::new(events_path))
        .with_max_in_flight(args.max_in_flight))
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let tool: Tool = args.tool.parse()?;
    let selection = ToolSelection::new(tool, args.text.as_deref())?;
    let orchestrator = build_orchestrator(&args.engine, &args.out)?;

    let mut registry = PhotoRegistry::new();
    let requested = args.files.len();
    let ids = registry.add(args.files.iter().map(PhotoSource::from_path));
    if ids.len() < requested {
        println!("Skipped {} non-image file(s).", requested - ids.len());
    }
    if ids.is_empty() {
        println!("No image files to edit.");
        return Ok(1);
    }

    let mut ctx = BatchContext::new(selection);
    println!(
        "Editing {} photo(s) with {} via {}...",
        ids.len(),
        ctx.selection.tool().display_name(),
        orchestrator.editor_name()
    );
    let report = run_batch_verbose(&orchestrator, &mut ctx, &mut registry);
    let saved = download_all(&registry, &args.out)?;
    let summary = build_summary(&report, &registry, &ctx, &orchestrator, &saved);
    write_summary(&args.out.join("summary.json"), &summary)
        .context("failed to write batch summary")?;

    println!(
        "Edited {}/{}; saved {} file(s) to {}",
        summary.done,
        summary.total,
        saved.len(),
        args.out.display()
    );
    Ok(if summary.all_done() { 0 } else { 2 })
}

fn run_batch_verbose(
    orchestrator: &BatchOrchestrator,
    ctx: &mut BatchContext,
    registry: &mut PhotoRegistry,
) -> BatchReport {
    let names: HashMap<String, String> = registry
        .iter()
        .map(|photo| (photo.id.clone(), photo.name().to_string()))
        .collect();
    let Some(mut run) = orchestrator.start(ctx, registry) else {
        println!("No pending photos.");
        return BatchReport::default();
    };
    while let Some(settlement) = run.next_settlement(ctx, registry) {
        print_settlement(&settlement, &names, registry);
    }
    run.finish(ctx, registry)
}

fn print_settlement(
    settlement: &Settlement,
    names: &HashMap<String, String>,
    registry: &PhotoRegistry,
) {
    let name = names
        .get(&settlement.photo_id)
        .map(String::as_str)
        .unwrap_or(settlement.photo_id.as_str());
    let detail = match (&settlement.message, settlement.applied) {
        (_, false) => " (removed, result discarded)".to_string(),
        (Some(message), true) => format!(": {message}"),
        (None, true) => registry
            .get(&settlement.photo_id)
            .and_then(|photo| photo.edited.as_ref())
            .and_then(dimensions)
            .map(|(width, height)| format!(" ({width}x{height})"))
            .unwrap_or_default(),
    };
    println!(
        "[{:>3}%] {name} {}{detail}",
        settlement.progress, settlement.status
    );
}

fn build_summary(
    report: &BatchReport,
    registry: &PhotoRegistry,
    ctx: &BatchContext,
    orchestrator: &BatchOrchestrator,
    saved: &[DownloadedPhoto],
) -> BatchSummary {
    let photos: Vec<PhotoOutcome> = report
        .settlements
        .iter()
        .map(|settlement| PhotoOutcome {
            photo_id: settlement.photo_id.clone(),
            name: registry
                .get(&settlement.photo_id)
                .map(|photo| photo.name().to_string())
                .unwrap_or_default(),
            status: settlement.status,
            failure: settlement.failure,
            output: saved
                .iter()
                .find(|item| item.photo_id == settlement.photo_id)
                .map(|item| item.path.to_string_lossy().to_string()),
        })
        .collect();
    BatchSummary {
        batch_id: report.batch_id.clone().unwrap_or_default(),
        started_at: report.started_at.clone().unwrap_or_default(),
        finished_at: report.finished_at.clone().unwrap_or_default(),
        tool: ctx.selection.tool().id().to_string(),
        provider: orchestrator.editor_name().to_string(),
        total: report.total as u64,
        done: report.done_count() as u64,
        failed: report.failed_count() as u64,
        photos,
    }
}

fn print_tools() {
    for spec in TOOL_SPECS {
        let marker = if spec.requires_text {
            " (requires text)"
        } else {
            ""
        };
        println!("{:<14} {}{marker}", spec.id, spec.name);
    }
}

fn run_session(args: SessionArgs) -> Result<()> {
    let orchestrator = build_orchestrator(&args.engine, &args.out)?;
    let mut registry = PhotoRegistry::new();
    let mut ctx = BatchContext::default();

    let stdin = io::stdin();
    let mut line = String::new();

    println!("SnapMagic session started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let command = parse_command(line.trim_end_matches(['\n', '\r']));
        match command.action.as_str() {
            "noop" => {}
            "help" => println!("Commands: {}", SESSION_HELP_COMMANDS.join(" ")),
            "quit" => break,
            "list_tools" => print_tools(),
            "add_photos" => {
                session_add(&command, &mut registry);
            }
            "remove_photo" => match command.arg_str("id") {
                Some(id) if registry.remove(id).is_some() => println!("Removed {id}"),
                Some(id) => println!("No photo with id {id}"),
                None => println!("Usage: /remove <photo id>"),
            },
            "reset_photo" => match command.arg_str("id") {
                Some(id) if registry.reset(id) => println!("{id} is pending again"),
                Some(id) => println!("Only finished photos can be retried ({id})"),
                None => println!("Usage: /retry <photo id>"),
            },
            "select_tool" => {
                session_select_tool(&command, &mut ctx);
            }
            "run_batch" => {
                if !registry.has_pending() {
                    println!("No pending photos.");
                    continue;
                }
                let report = run_batch_verbose(&orchestrator, &mut ctx, &mut registry);
                println!(
                    "Batch finished: {} done, {} failed.",
                    report.done_count(),
                    report.failed_count()
                );
            }
            "list_photos" => {
                if registry.is_empty() {
                    println!("No photos.");
                }
                for photo in registry.iter() {
                    let failure = photo
                        .failure
                        .map(|kind| format!(" [{kind}]"))
                        .unwrap_or_default();
                    let edited = if photo.edited.is_some() { " +edited" } else { "" };
                    println!("{} {}{edited}{failure}", photo.id, photo.status);
                }
            }
            "download_all" => {
                let out = command
                    .arg_str("path")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| args.out.clone());
                match download_all(&registry, &out) {
                    Ok(saved) if saved.is_empty() => println!("Nothing to download yet."),
                    Ok(saved) => println!("Saved {} file(s) to {}", saved.len(), out.display()),
                    Err(err) => println!("Download failed: {err:#}"),
                }
            }
            _ => println!(
                "Unknown command /{}. Type /help for commands.",
                command.arg_str("command").unwrap_or_default()
            ),
        }
    }
    Ok(())
}

/// Returns the ids of the photos that were added.
fn session_add(command: &SessionCommand, registry: &mut PhotoRegistry) -> Vec<String> {
    let paths = command.arg_list("paths");
    if paths.is_empty() {
        println!("Usage: /add <image> [image ...]");
        return Vec::new();
    }
    let (present, missing): (Vec<PathBuf>, Vec<PathBuf>) = paths
        .into_iter()
        .map(PathBuf::from)
        .partition(|path| path.is_file());
    for path in &missing {
        println!("File not found: {}", path.display());
    }
    let offered = present.len();
    let ids = registry.add(present.into_iter().map(PhotoSource::from_path));
    if ids.len() < offered {
        println!("Skipped {} non-image file(s).", offered - ids.len());
    }
    for id in &ids {
        println!("Added {id}");
    }
    ids
}

/// `true` when the selection changed; a rejected selection keeps the old one.
fn session_select_tool(command: &SessionCommand, ctx: &mut BatchContext) -> bool {
    let Some(raw_tool) = command.arg_str("tool") else {
        println!(
            "Current tool: {}. Usage: /tool <id> [text]",
            ctx.selection.tool()
        );
        return false;
    };
    let selection = raw_tool
        .parse::<Tool>()
        .and_then(|tool| ToolSelection::new(tool, command.arg_str("text")));
    match selection {
        Ok(selection) => {
            println!("Tool set to {}", selection.tool().display_name());
            ctx.select(selection);
            true
        }
        Err(SelectionError::MissingText(tool)) => {
            println!("{} needs a description; add it after the tool id.", tool.display_name());
            false
        }
        Err(err) => {
            println!("{err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use clap::Parser;
    use snapmagic_contracts::batch::BatchContext;
    use snapmagic_contracts::photos::{EditFailureKind, PhotoRegistry, PhotoSource, PhotoStatus};
    use snapmagic_contracts::session::parse_command;
    use snapmagic_contracts::tools::{Tool, ToolSelection};
    use snapmagic_engine::download::DownloadedPhoto;
    use snapmagic_engine::{BatchOrchestrator, BatchReport, DryrunEditor, Settlement};

    use super::{
        build_orchestrator, build_summary, run_batch_verbose, session_add, session_select_tool,
        Cli, Command,
    };

    fn vintage() -> BatchContext {
        BatchContext::new(ToolSelection::new(Tool::Vintage, None).unwrap())
    }

    #[test]
    fn tool_without_required_text_keeps_previous_selection() {
        let mut ctx = vintage();
        let before = ctx.clone();

        assert!(!session_select_tool(&parse_command("/tool custom"), &mut ctx));
        assert!(!session_select_tool(&parse_command("/tool remove-object   "), &mut ctx));
        assert!(!session_select_tool(&parse_command("/tool sepia"), &mut ctx));
        assert_eq!(ctx, before);

        assert!(session_select_tool(&parse_command("/tool remove-object the lamp post"), &mut ctx));
        assert_eq!(ctx.selection.tool(), Tool::RemoveObject);
        assert_eq!(ctx.selection.text(), Some("the lamp post"));
    }

    #[test]
    fn plain_text_line_selects_custom_edit() {
        let mut ctx = vintage();
        assert!(session_select_tool(&parse_command("make the sky purple"), &mut ctx));
        assert_eq!(ctx.selection.tool(), Tool::Custom);
        assert_eq!(ctx.selection.text(), Some("make the sky purple"));
    }

    #[test]
    fn add_skips_missing_and_non_image_files() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let photo = temp.path().join("beach.jpg");
        let notes = temp.path().join("notes.txt");
        std::fs::write(&photo, b"jpg")?;
        std::fs::write(&notes, b"txt")?;
        let missing = temp.path().join("gone.png");
        let line = format!(
            "/add \"{}\" \"{}\" \"{}\"",
            photo.display(),
            missing.display(),
            notes.display()
        );

        let mut registry = PhotoRegistry::new();
        let ids = session_add(&parse_command(&line), &mut registry);

        assert_eq!(ids.len(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&ids[0]).map(|p| p.name()), Some("beach.jpg"));
        assert!(session_add(&parse_command("/add"), &mut registry).is_empty());
        Ok(())
    }

    #[test]
    fn model_flag_is_rejected_for_other_providers() {
        let cli = Cli::try_parse_from([
            "snapmagic", "edit", "a.jpg", "--out", "out", "--provider", "dryrun", "--model", "x",
        ])
        .unwrap();
        let Command::Edit(args) = cli.command else {
            panic!("expected edit command");
        };
        let err = build_orchestrator(&args.engine, &args.out).err().unwrap();
        assert!(err.to_string().contains("--model"));
    }

    #[test]
    fn nothing_pending_yields_empty_report_without_touching_context() {
        let cli = Cli::try_parse_from(["snapmagic", "edit", "a.jpg", "--out", "out", "--provider", "dryrun"])
            .unwrap();
        let Command::Edit(args) = cli.command else {
            panic!("expected edit command");
        };
        let orchestrator = build_orchestrator(&args.engine, &args.out).unwrap();
        let mut ctx = vintage();
        let mut registry = PhotoRegistry::new();

        let report = run_batch_verbose(&orchestrator, &mut ctx, &mut registry);

        assert_eq!(report, BatchReport::default());
        assert!(report.is_noop());
        assert!(!ctx.is_processing);
    }

    #[test]
    fn edit_command_parses_tool_text_and_limits() {
        let cli = Cli::try_parse_from([
            "snapmagic",
            "edit",
            "a.jpg",
            "b.png",
            "--tool",
            "remove-object",
            "--text",
            "the red car",
            "--out",
            "out",
            "--provider",
            "dryrun",
            "--max-in-flight",
            "2",
        ])
        .unwrap();
        let Command::Edit(args) = cli.command else {
            panic!("expected edit command");
        };
        assert_eq!(args.files, vec![PathBuf::from("a.jpg"), PathBuf::from("b.png")]);
        assert_eq!(args.tool, "remove-object");
        assert_eq!(args.text.as_deref(), Some("the red car"));
        assert_eq!(args.engine.provider, "dryrun");
        assert_eq!(args.engine.max_in_flight, 2);
        assert!(args.engine.events.is_none());
    }

    #[test]
    fn edit_command_requires_files_and_out() {
        assert!(Cli::try_parse_from(["snapmagic", "edit", "--out", "out"]).is_err());
        assert!(Cli::try_parse_from(["snapmagic", "edit", "a.jpg"]).is_err());
    }

    #[test]
    fn summary_counts_outcomes_and_links_outputs() {
        let mut registry = PhotoRegistry::new();
        let ids = registry.add([
            PhotoSource::from_path("/tmp/one.jpg"),
            PhotoSource::from_path("/tmp/two.png"),
        ]);
        let report = BatchReport {
            batch_id: Some("batch-1".to_string()),
            prompt: Some("prompt".to_string()),
            total: 2,
            started_at: Some("2026-01-01T00:00:00Z".to_string()),
            finished_at: Some("2026-01-01T00:00:05Z".to_string()),
            settlements: vec![
                Settlement {
                    photo_id: ids[1].clone(),
                    status: PhotoStatus::Error,
                    failure: Some(EditFailureKind::Service),
                    message: Some("boom".to_string()),
                    applied: true,
                    progress: 50,
                },
                Settlement {
                    photo_id: ids[0].clone(),
                    status: PhotoStatus::Done,
                    failure: None,
                    message: None,
                    applied: true,
                    progress: 100,
                },
            ],
            progress_trail: vec![50, 100],
        };
        let ctx = BatchContext::new(ToolSelection::new(Tool::Vintage, None).unwrap());
        let orchestrator = BatchOrchestrator::new(Arc::new(DryrunEditor));
        let saved = vec![DownloadedPhoto {
            photo_id: ids[0].clone(),
            path: PathBuf::from("out/one-edited-0.jpg"),
        }];

        let summary = build_summary(&report, &registry, &ctx, &orchestrator, &saved);

        assert_eq!(summary.batch_id, "batch-1");
        assert_eq!(summary.tool, "vintage");
        assert_eq!(summary.provider, "dryrun");
        assert_eq!((summary.total, summary.done, summary.failed), (2, 1, 1));
        assert!(!summary.all_done());
        assert_eq!(summary.photos[0].name, "two.png");
        assert_eq!(summary.photos[0].failure, Some(EditFailureKind::Service));
        assert!(summary.photos[0].output.is_none());
        assert_eq!(
            summary.photos[1].output.as_deref(),
            Some("out/one-edited-0.jpg")
        );
    }
}
