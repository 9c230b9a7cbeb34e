use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use atlas_core::{load_style_config_from_env, Engine, EngineEvent, FocusMode, InputEvent, StyleConfig};
use atlas_schema::{CellKey, Document, SelectionKind};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay scripted sessions against the atlas engine", long_about = None)]
struct Args {
    /// Path to the atlas document JSON
    #[arg(long)]
    document: PathBuf,

    /// Session file with the steps to replay
    #[arg(long)]
    session: Option<PathBuf>,

    /// Style configuration override (defaults to ATLAS_STYLE_CONFIG_PATH or the builtin)
    #[arg(long)]
    config: Option<PathBuf>,

    /// What to print once the session has run
    #[arg(long, value_enum, default_value_t = Output::Snapshot)]
    output: Output,

    /// Cell for `--output detail`, in "panel:q,r" form
    #[arg(long)]
    cell: Option<CellKey>,

    /// Panel for `--output boundaries` and `--output census`
    #[arg(long, default_value_t = 0)]
    panel: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Output {
    Snapshot,
    Colors,
    Detail,
    Events,
    Boundaries,
    Census,
    Document,
}

#[derive(Debug, Deserialize)]
struct Session {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Step {
    Input(InputEvent),
    Command(Command),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Command {
    UseGroupMode,
    UseRouteMode,
    ArmConnect,
    CommitConnect,
    CancelConnect,
    SetCountryFocus { owner: Option<String> },
    SetFocusMode { mode: FocusMode },
    SetSyncCountryColors { sync: bool },
    SetPendingColor { color: String },
    ConfirmRecolor { color: Option<String> },
    CancelRecolor,
    SelectKeys { keys: Vec<CellKey>, kind: SelectionKind },
    RemoveSingle { cell: CellKey },
    RenamePanel { index: usize, name: String },
    DuplicatePanel { index: usize },
    DeletePanel { index: usize },
    SaveSelection,
    RequestSummary,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let document = Document::from_file(&args.document)
        .with_context(|| format!("Failed to load document {}", args.document.display()))?;
    let config = match &args.config {
        Some(path) => Arc::new(
            StyleConfig::from_file(path)
                .with_context(|| format!("Failed to load style config {}", path.display()))?,
        ),
        None => load_style_config_from_env(),
    };

    let mut engine = Engine::new(document, config);
    let events = engine.subscribe();
    let mut published: Vec<JsonValue> = Vec::new();

    if let Some(path) = &args.session {
        let session = read_session(path)?;
        for (index, step) in session.steps.into_iter().enumerate() {
            run_step(&mut engine, step).with_context(|| format!("Step {index} failed"))?;
            for event in events.try_iter() {
                published.push(event_json(&event)?);
            }
        }
    }

    let output = match args.output {
        Output::Snapshot => serde_json::to_value(engine.selection_snapshot())?,
        Output::Colors => serde_json::to_value(engine.color_maps())?,
        Output::Detail => {
            let cell = args
                .cell
                .ok_or_else(|| anyhow::anyhow!("--output detail requires --cell"))?;
            serde_json::to_value(engine.cell_detail(cell))?
        }
        Output::Events => JsonValue::Array(published),
        Output::Boundaries => {
            let edges: Vec<JsonValue> = engine
                .boundaries(args.panel)
                .into_iter()
                .map(|edge| {
                    serde_json::json!({
                        "cell": edge.cell,
                        "side": edge.side,
                        "a": [edge.a.0, edge.a.1],
                        "b": [edge.b.0, edge.b.1],
                        "dashed": edge.dashed,
                        "focus": edge.focus,
                        "opacity": edge.opacity,
                    })
                })
                .collect();
            JsonValue::Array(edges)
        }
        Output::Census => {
            let census = engine.census(args.panel);
            serde_json::json!({
                "conflict": census.conflict,
                "single": census.single,
                "unclaimed": census.unclaimed,
                "total": census.total(),
            })
        }
        Output::Document => serde_json::to_value(engine.document())?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_session(path: &Path) -> Result<Session> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse session JSON {}", path.display()))
}

fn run_step(engine: &mut Engine, step: Step) -> Result<()> {
    let command = match step {
        Step::Input(event) => {
            engine.handle(event);
            return Ok(());
        }
        Step::Command(command) => command,
    };
    match command {
        Command::UseGroupMode => engine.use_group_mode(),
        Command::UseRouteMode => engine.use_route_mode(),
        Command::ArmConnect => engine.arm_connect(),
        Command::CommitConnect => engine.commit_connect(),
        Command::CancelConnect => engine.cancel_connect(),
        Command::SetCountryFocus { owner } => engine.set_country_focus(owner.as_deref()),
        Command::SetFocusMode { mode } => engine.set_focus_mode(mode),
        Command::SetSyncCountryColors { sync } => engine.set_sync_country_colors(sync),
        Command::SetPendingColor { color } => {
            if !engine.set_pending_color(&color) {
                tracing::warn!(color = %color, "harness.pending_color_ignored");
            }
        }
        Command::ConfirmRecolor { color } => engine.confirm_recolor(color.as_deref())?,
        Command::CancelRecolor => {
            engine.cancel_recolor();
        }
        Command::SelectKeys { keys, kind } => engine.select_keys(keys, kind),
        Command::RemoveSingle { cell } => {
            engine.remove_single(cell);
        }
        Command::RenamePanel { index, name } => engine.rename_panel(index, &name)?,
        Command::DuplicatePanel { index } => {
            engine.duplicate_panel(index)?;
        }
        Command::DeletePanel { index } => engine.delete_panel(index)?,
        Command::SaveSelection => {
            engine.save_selection();
        }
        Command::RequestSummary => {
            engine.request_summary();
        }
    }
    Ok(())
}

fn event_json(event: &EngineEvent) -> Result<JsonValue> {
    serde_json::to_value(event).with_context(|| format!("Failed to encode {} event", event.name()))
}
