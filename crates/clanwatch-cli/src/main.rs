mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, schedule::ScheduleSubcommand, snapshot::SnapshotSubcommand,
    track::TrackSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "clanwatch",
    about = "Clan roster tracker: scheduled point reports, leavers and new-member watchdog",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .clanwatch/)
    #[arg(long, global = true, env = "CLANWATCH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .clanwatch/ with a default config and an empty state store
    Init {
        /// Clan to watch (default: directory name)
        #[arg(long)]
        clan: Option<String>,
    },

    /// Run the scheduler until interrupted
    Run,

    /// Capture the roster now and report changes
    Stats {
        /// Act as the configured stats target at HH:MM (label and compare_to)
        #[arg(long)]
        target: Option<String>,
    },

    /// Run one watchdog pass over tracked members now
    Watchdog {
        /// Also send the daily officer digest if it has not gone out today
        #[arg(long)]
        digest: bool,
    },

    /// Diff two labeled captures
    Compare {
        /// Baseline label
        older: String,
        /// Label to measure against the baseline
        newer: String,
    },

    /// Manage tracked members
    Track {
        #[command(subcommand)]
        subcommand: TrackSubcommand,
    },

    /// Inspect stored captures
    Snapshot {
        #[command(subcommand)]
        subcommand: SnapshotSubcommand,
    },

    /// Inspect the job schedule
    Schedule {
        #[command(subcommand)]
        subcommand: ScheduleSubcommand,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { clan } => cmd::init::run(&root, clan.as_deref()),
        Commands::Run => cmd::run::run(&root),
        Commands::Stats { target } => cmd::stats::run(&root, target.as_deref(), cli.json),
        Commands::Watchdog { digest } => cmd::watchdog::run(&root, digest, cli.json),
        Commands::Compare { older, newer } => cmd::compare::run(&root, &older, &newer, cli.json),
        Commands::Track { subcommand } => cmd::track::run(&root, subcommand, cli.json),
        Commands::Snapshot { subcommand } => cmd::snapshot::run(&root, subcommand, cli.json),
        Commands::Schedule { subcommand } => cmd::schedule::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
