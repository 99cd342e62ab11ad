use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use incentives_node::{logging, IncentivesConfig, Simulation, SimulationReport};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "incentives")]
#[command(about = "Storage incentive economics: postage, pricing, staking and redistribution", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "INCENTIVES_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deterministic multi-round simulation
    Simulate {
        /// Number of rounds to play
        #[arg(short, long)]
        rounds: Option<u64>,

        /// Number of staked nodes
        #[arg(short, long)]
        nodes: Option<usize>,

        /// Seed for keys, stakes, nonces and chunk data
        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Output file for the configuration
        #[arg(short, long, default_value = "incentives.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority order: CLI args > ENV vars > config file > defaults
    let mut config = IncentivesConfig::load(cli.config.as_deref())?;
    config.apply_env_overrides();

    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        let level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(level))
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Simulate {
            rounds,
            nodes,
            seed,
            json,
        } => {
            if let Some(rounds) = rounds {
                config.simulation.rounds = rounds;
            }
            if let Some(nodes) = nodes {
                config.simulation.nodes = nodes;
            }
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }

            info!(
                rounds = config.simulation.rounds,
                nodes = config.simulation.nodes,
                seed = config.simulation.seed,
                "🚀 Starting simulation"
            );

            let report = Simulation::new(config)?.run().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists, pass --force to overwrite",
                    output.display()
                );
            }
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }

            IncentivesConfig::default().save_to_file(&output)?;
            info!(output = %output.display(), "⚙️ Configuration written");
            Ok(())
        }
    }
}

fn print_report(report: &SimulationReport) {
    println!();
    println!(
        "Rounds: {} played, {} claimed, {} skipped, {} rejected",
        report.rounds_played, report.rounds_claimed, report.rounds_skipped, report.claims_rejected
    );
    println!(
        "Paid out: {}   final price: {}   final block: {}",
        report.total_paid, report.final_price, report.final_block
    );
    println!();
    println!(
        "{:>4}  {:<16}  {:>12}  {:>7}  {:>6}  {:>7}  {}",
        "node", "overlay", "stake", "share", "wins", "won", "earned"
    );
    for node in &report.nodes {
        println!(
            "{:>4}  {:<16}  {:>12}  {:>6.1}%  {:>6}  {:>6.1}%  {}",
            node.index,
            node.overlay.short(),
            node.stake.units(),
            node.stake_share * 100.0,
            node.wins,
            node.win_share * 100.0,
            node.earned
        );
    }
}
