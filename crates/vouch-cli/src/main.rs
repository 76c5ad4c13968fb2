mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::VouchConfig;

#[derive(Parser)]
#[command(name = "vouch", version, about = "Peer-to-peer reputation network tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the REST API over a block database.
    Serve {
        /// Block database path (defaults to the configured one).
        #[arg(long)]
        db: Option<PathBuf>,
        /// Listen address, e.g. 127.0.0.1:8088.
        #[arg(long)]
        listen: Option<String>,
    },

    /// Measurements over a replayed network.
    #[command(subcommand)]
    Experiment(ExperimentAction),

    /// Print block-store statistics.
    Stats {
        #[arg(long)]
        db: PathBuf,
    },

    /// Check every agent's chain and report gaps.
    Scan {
        #[arg(long)]
        db: PathBuf,
    },

    /// Export the global interaction graph as Graphviz DOT.
    Graph {
        #[arg(long)]
        db: PathBuf,
        /// Output file.
        #[arg(long)]
        out: PathBuf,
    },

    /// Populate a database with a synthetic population.
    Seed {
        #[arg(long)]
        db: PathBuf,
        /// Number of identities to generate.
        #[arg(long, default_value_t = 20)]
        agents: usize,
        /// Number of bilateral records to generate.
        #[arg(long, default_value_t = 200)]
        blocks: usize,
        /// RNG seed, for reproducible populations.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Subcommand)]
pub enum ExperimentAction {
    /// Repeated audits from one agent, printing knowledge growth per round.
    AuditGrowth {
        #[arg(long)]
        db: PathBuf,
        /// Initiating agent, by partial hex or base64 identifier.
        #[arg(long)]
        agent: String,
        #[arg(long, default_value_t = 35)]
        rounds: usize,
    },

    /// Knowledge coverage before and after hop-limited chain pulls.
    DataCoverage {
        #[arg(long)]
        db: PathBuf,
        #[arg(long, default_value_t = 2)]
        hops: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = VouchConfig::load(&config::state_dir())?;
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { db, listen } => commands::serve::handle(db, listen, &config).await,
        Command::Experiment(action) => commands::experiment::handle(action, &config).await,
        Command::Stats { db } => commands::stats::handle(&db).await,
        Command::Scan { db } => commands::scan::handle(&db).await,
        Command::Graph { db, out } => commands::graph::handle(&db, &out).await,
        Command::Seed {
            db,
            agents,
            blocks,
            seed,
        } => commands::seed::handle(&db, agents, blocks, seed).await,
    }
}
