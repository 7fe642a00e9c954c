use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use annotrack::{FrameIndex, MemoryBackend, Session, SessionConfig, TypeDefinition};

#[derive(Parser, Debug)]
#[command(name = "annotrack", version)]
struct Cli {
    /// Session config JSON. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print types, counts, tracks, and track segments of a project.
    Summary(SummaryArgs),
    /// Print what is displayed on one frame and the ops that got there from frame 0.
    Frame(FrameArgs),
    /// Add marker types from a JSON list and write the project back.
    ImportTypes(ImportTypesArgs),
}

#[derive(Parser, Debug)]
struct SummaryArgs {
    /// Project dump JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Project dump JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,
}

#[derive(Parser, Debug)]
struct ImportTypesArgs {
    /// Project dump JSON. Created if it does not exist.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// JSON list of `{id, name, mode, color}` definitions.
    #[arg(long)]
    types: PathBuf,

    /// Output path. Defaults to overwriting the input.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "annotrack=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Summary(args) => cmd_summary(args, config),
        Command::Frame(args) => cmd_frame(args, config),
        Command::ImportTypes(args) => cmd_import_types(args, config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    SessionConfig::from_json_str(&raw).with_context(|| format!("parse config '{}'", path.display()))
}

fn open_project(path: &Path, config: SessionConfig) -> anyhow::Result<Session> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read project '{}'", path.display()))?;
    let backend = MemoryBackend::from_json_str(&raw)
        .with_context(|| format!("parse project '{}'", path.display()))?;
    let session = Session::open(config, Box::new(backend))
        .with_context(|| format!("open project '{}'", path.display()))?;
    Ok(session)
}

fn cmd_summary(args: SummaryArgs, config: SessionConfig) -> anyhow::Result<()> {
    let session = open_project(&args.in_path, config)?;
    let store = session.store();
    let tracks = session.tracks();

    let types: Vec<serde_json::Value> = store
        .types()
        .iter()
        .map(|t| {
            serde_json::json!({
                "id": t.id.0,
                "name": t.name,
                "mode": t.mode.as_str(),
                "color": t.color,
                "count": session.counter().get(t.id),
            })
        })
        .collect();

    let track_rows: Vec<serde_json::Value> = tracks
        .track_ids()
        .map(|id| {
            let frames = tracks.points(id);
            serde_json::json!({
                "id": id.0,
                "type": store.get(id).map(|t| t.type_id.0),
                "points": tracks.point_count(id),
                "first_frame": frames.and_then(|f| f.keys().next()).map(|f| f.0),
                "last_frame": frames.and_then(|f| f.keys().next_back()).map(|f| f.0),
                "segments": tracks.connectivity(id),
            })
        })
        .collect();

    let summary = serde_json::json!({
        "entities": store.len(),
        "types": types,
        "tracks": track_rows,
        "warnings": session.diagnostics().warnings(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_frame(args: FrameArgs, config: SessionConfig) -> anyhow::Result<()> {
    let mut session = open_project(&args.in_path, config)?;
    let update = session
        .set_frame(FrameIndex(args.frame))
        .with_context(|| format!("move to frame {}", args.frame))?;

    let display = session.display();
    let items: Vec<_> = display
        .displayed_ids()
        .into_iter()
        .filter_map(|id| display.item(id))
        .collect();
    let out = serde_json::json!({
        "frame": args.frame,
        "ops": update.display,
        "items": items,
        "warnings": session.diagnostics().warnings(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_import_types(args: ImportTypesArgs, config: SessionConfig) -> anyhow::Result<()> {
    let mut session = if args.in_path.exists() {
        open_project(&args.in_path, config)?
    } else {
        Session::new(config)?
    };

    let raw = std::fs::read_to_string(&args.types)
        .with_context(|| format!("read types '{}'", args.types.display()))?;
    let defs: Vec<TypeDefinition> = serde_json::from_str(&raw)
        .with_context(|| format!("parse types '{}'", args.types.display()))?;
    let created = session.define_types(&defs)?;
    let report = session.save()?;
    tracing::info!(created = created.len(), ?report, "types imported");

    let dump = MemoryBackend::snapshot_of(session.store().backend())?;
    let out = args.out.unwrap_or(args.in_path);
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&out, dump.to_json_string_pretty()?)
        .with_context(|| format!("write project '{}'", out.display()))?;

    eprintln!("imported {} new types into {}", created.len(), out.display());
    Ok(())
}
