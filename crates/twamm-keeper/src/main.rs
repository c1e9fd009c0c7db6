use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use twamm_keeper::feed::{spawn_stdin_feed, ACTION_QUEUE_DEPTH};
use twamm_keeper::{create_example_config, scenario, Keeper, KeeperConfig, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "twamm-keeper")]
#[command(about = "Keeper and scenario simulator for TWAMM pairs")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the keeper loop against the wall clock
    Run {
        /// Path to keeper configuration file
        #[arg(short, long, default_value = "keeper.toml")]
        config: PathBuf,

        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,

        /// Apply JSON actions read from stdin, one per line
        #[arg(long)]
        stdin: bool,
    },
    /// Replay a scenario file and print the JSON report
    Simulate {
        #[arg(short, long)]
        scenario: PathBuf,
    },
    /// Validate a configuration and print pair health
    Check {
        #[arg(short, long, default_value = "keeper.toml")]
        config: PathBuf,
    },
    /// Write an example configuration file
    ExampleConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run {
            config,
            ticks,
            stdin,
        } => {
            let config = KeeperConfig::load(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            info!(
                pairs = config.pairs.len(),
                tick_interval_secs = config.tick_interval_secs,
                "starting TWAMM keeper"
            );
            let mut keeper = Keeper::new(config, Arc::new(SystemClock))?;
            let (sender, receiver) = mpsc::channel(ACTION_QUEUE_DEPTH);
            if stdin {
                let _feed = spawn_stdin_feed(sender);
            } else {
                drop(sender);
            }
            let summary = keeper.run(ticks, receiver).await?;
            info!(
                ticks = summary.ticks,
                actions_applied = summary.actions_applied,
                actions_failed = summary.actions_failed,
                "keeper stopped"
            );
        }
        Command::Simulate { scenario } => {
            let report = scenario::simulate_file(&scenario)
                .with_context(|| format!("failed to simulate {}", scenario.display()))?;
            println!("{}", report);
        }
        Command::Check { config } => {
            let config = KeeperConfig::load(&config)
                .with_context(|| format!("failed to load {}", config.display()))?;
            let keeper = Keeper::new(config, Arc::new(SystemClock))?;
            let health = keeper.health_check()?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Command::ExampleConfig { path } => {
            if path.exists() {
                warn!(path = %path.display(), "overwriting existing file");
            }
            create_example_config(&path)?;
            info!(path = %path.display(), "example configuration written");
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("twamm_keeper={},twamm_core={}", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
