use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "trackdeck", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a session file for structural problems.
    Validate(ValidateArgs),
    /// Print a per-track summary of a session file.
    Inspect(InspectArgs),
    /// Resolve the visual draw list at a point in time.
    Compose(ComposeArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input session JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input session JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Input session JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Timeline position in seconds.
    #[arg(long)]
    at: f64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Compose(args) => cmd_compose(args),
    }
}

fn read_session_json(path: &Path) -> anyhow::Result<trackdeck::Session> {
    let f = File::open(path).with_context(|| format!("open session '{}'", path.display()))?;
    let r = BufReader::new(f);
    let session: trackdeck::Session =
        serde_json::from_reader(r).with_context(|| "parse session JSON")?;
    Ok(session)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let session = read_session_json(&args.in_path)?;
    session.validate()?;
    eprintln!(
        "ok: {} tracks, timeline ends at {:.3}s",
        session.len(),
        session.timeline_end()
    );
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let session = read_session_json(&args.in_path)?;
    session.validate()?;

    println!(
        "playhead {:.3}s, transport {:?}, {} tracks",
        session.playhead,
        session.transport,
        session.len()
    );
    for track in session.tracks() {
        let mut flags = Vec::new();
        if track.locked() {
            flags.push("locked");
        }
        if track.hidden() {
            flags.push("hidden");
        }
        if track.muted() {
            flags.push("muted");
        }
        if track.solo() {
            flags.push("solo");
        }
        println!(
            "  {:<12} {:?} layer {} [{:.3}s..{:.3}s) '{}' {}",
            track.id(),
            track.kind(),
            track.layer(),
            track.start(),
            track.end(),
            track.name(),
            flags.join(",")
        );
    }
    Ok(())
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let session = read_session_json(&args.in_path)?;
    session.validate()?;

    let nodes = trackdeck::draw_list(&session, args.at);
    let json = serde_json::to_string_pretty(&nodes).with_context(|| "encode draw list")?;
    println!("{json}");
    Ok(())
}
