use anyhow::Result;
use clap::{Parser, Subcommand};
use plotferry::config::Config;
use plotferry::coordinator::TransferCoordinator;
use plotferry::liveness::PingProbe;
use plotferry::oracle::{CapacityOracle, SftpSnapshotSource};
use plotferry::staging;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "plotferry",
    version,
    about = "Plot transfer coordinator: ships finished plots to the harvester with the most free capacity",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform one coordination pass (intended to be run from a scheduler)
    Run {
        /// Select a destination but move nothing
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },

    /// Show the transfer lock state and qualifying staged plots
    Status,

    /// Probe the configured harvesters and print the capacity ranking
    Harvesters,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = Config::from_file(&cli.config)?;

    match cli.command {
        Commands::Run { dry_run } => {
            tracing::info!(config = %cli.config.display(), "Starting coordination pass");
            run(config, dry_run).await?;
        }

        Commands::Status => {
            status(config)?;
        }

        Commands::Harvesters => {
            harvesters(config).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("plotferry=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("plotferry=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

async fn run(mut config: Config, dry_run: bool) -> Result<()> {
    if dry_run {
        config.transfer.dry_run = true;
    }

    let mut coordinator = TransferCoordinator::new(config)?;
    let outcome = coordinator.run_cycle().await?;
    tracing::info!(outcome = %outcome, "Coordination pass complete");
    println!("{outcome}");
    Ok(())
}

fn status(config: Config) -> Result<()> {
    let locked = config.transfer.local_marker.exists();
    println!(
        "transfer lock: {}",
        if locked { "HELD" } else { "free" }
    );

    let pattern = regex::Regex::new(&config.staging.pattern)?;
    let plots = staging::scan(
        &config.staging.dir,
        &pattern,
        config.staging.min_plot_bytes,
    )?;
    println!("qualifying plots in {}: {}", config.staging.dir.display(), plots.len());
    for plot in plots {
        println!("  {} ({} bytes)", plot.name, plot.bytes);
    }
    Ok(())
}

async fn harvesters(config: Config) -> Result<()> {
    let oracle = CapacityOracle::new(
        config.harvesters.hosts.clone(),
        Box::new(PingProbe::new(
            config.harvesters.probe_attempts,
            config.probe_timeout(),
        )),
        Box::new(SftpSnapshotSource::new(
            config.harvesters.export_dir.clone(),
            config.harvesters.remote_export_dir.clone(),
        )),
    );

    let live = oracle.live_hosts().await;
    if live.is_empty() {
        println!("no live harvesters out of {} configured", config.harvesters.hosts.len());
        return Ok(());
    }

    println!("{:<20} {:>18} {}", "host", "plots until full", "mount");
    for harvester in oracle.rank_harvesters(&live).await {
        println!(
            "{:<20} {:>18} {}",
            harvester.host, harvester.plots_until_full, harvester.mount
        );
    }
    Ok(())
}
