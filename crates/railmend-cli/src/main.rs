use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use railmend_core::migration::{Gate, MigrationPlan};
use railmend_core::version::{CURRENT_VERSION, SaveVersion, SnapshotHeader};
use railmend_core::after_load;
use railmend_data::{ProfileFile, SnapshotFile, load_fixture, load_profile, load_snapshot, render_sketch, save_snapshot};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bring old transport-tycoon snapshots up to the current format", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Migrate a snapshot and print the load report as JSON.
    Migrate {
        /// Snapshot image (.ron or .json), or a fixture with --fixture.
        input: PathBuf,

        /// Treat the input as a hand-written fixture with a map sketch.
        #[arg(long)]
        fixture: bool,

        /// Load profile file, or a directory holding profile.{ron,toml,json}.
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Write the migrated snapshot here (.ron or .json).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print the migrated map as a sketch.
        #[arg(long)]
        map: bool,
    },
    /// List the steps a snapshot of the given version goes through.
    Plan {
        /// Format version, `major` or `major.minor`.
        #[arg(value_parser = parse_version)]
        version: SaveVersion,
    },
}

fn parse_version(s: &str) -> Result<SaveVersion, String> {
    let (major, minor) = match s.split_once('.') {
        Some((major, minor)) => (major, minor),
        None => (s, "0"),
    };
    let major = major
        .parse::<u16>()
        .map_err(|e| format!("bad major version '{major}': {e}"))?;
    let minor = minor
        .parse::<u8>()
        .map_err(|e| format!("bad minor version '{minor}': {e}"))?;
    Ok(SaveVersion::new(major, minor))
}

fn describe_gate(gate: Gate) -> String {
    match gate {
        Gate::Always => "always".to_string(),
        Gate::Before(v) => format!("< {v}"),
        Gate::Between { from, before } => format!("{from} <= v < {before}"),
    }
}

fn migrate(
    input: PathBuf,
    fixture: bool,
    profile: Option<PathBuf>,
    out: Option<PathBuf>,
    map: bool,
) -> Result<()> {
    let snapshot = if fixture {
        load_fixture(&input)
    } else {
        load_snapshot(&input)
    }
    .with_context(|| format!("Failed to read {}", input.display()))?;

    let profile = match &profile {
        Some(path) => load_profile(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?,
        None => ProfileFile::default(),
    };
    let mut services = profile.services();

    let outcome = after_load(snapshot, &profile.context, &mut services)
        .with_context(|| format!("Failed to migrate {}", input.display()))?;

    if map {
        for row in render_sketch(&outcome.world.map) {
            println!("{row}");
        }
    }
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);

    if let Some(path) = out {
        let file = SnapshotFile {
            header: SnapshotHeader::native(CURRENT_VERSION),
            world: outcome.world,
        };
        save_snapshot(&path, &file).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(file = %path.display(), "wrote migrated snapshot");
    }
    Ok(())
}

fn plan(version: SaveVersion) -> Result<()> {
    if version.is_from_future() {
        bail!("version {version} is newer than the supported {CURRENT_VERSION}");
    }
    let plan = MigrationPlan::standard();
    for step in plan.applicable(version) {
        println!("{:<36} {}", step.name, describe_gate(step.gate));
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Migrate {
            input,
            fixture,
            profile,
            out,
            map,
        } => migrate(input, fixture, profile, out, map),
        Command::Plan { version } => plan(version),
    }
}
