use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upcast::config::Config;
use upcast::content::{ContentGenerator, NoopGenerator};
use upcast::publish::{DryRunPublisher, MediaPublisher};
use upcast::scheduler::{ChannelScheduler, Coordinator, SchedulerState};

#[derive(Parser)]
#[command(
    name = "upcast",
    version,
    about = "Rate-limited media upload scheduler with quota-aware batch re-planning",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator loops until interrupted
    Run {
        /// Config file path (TOML); environment variables are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Publish every pending artifact of one channel immediately
    Flush {
        /// Channel name
        #[arg(short = 'n', long)]
        channel: String,

        /// Config file path (TOML); environment variables are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    tracing::info!("upcast upload scheduler starting");

    match cli.command {
        Commands::Run { config } => run(config).await?,
        Commands::Flush { channel, config } => flush(channel, config).await?,
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("upcast=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("upcast=info,warn")
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
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(&path)?,
        None => Config::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

async fn build_schedulers(
    config: &Config,
    state: &Arc<SchedulerState>,
    publisher: &Arc<dyn MediaPublisher>,
) -> Result<Vec<Arc<ChannelScheduler>>> {
    let mut schedulers = Vec::new();
    for channel in config.channel_models() {
        let scheduler = Arc::new(ChannelScheduler::new(
            channel,
            config.policy.clone(),
            Arc::clone(state),
            Arc::clone(publisher),
        ));
        scheduler.init().await?;
        schedulers.push(scheduler);
    }
    Ok(schedulers)
}

async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let state = Arc::new(SchedulerState::new());
    let publisher: Arc<dyn MediaPublisher> = Arc::new(DryRunPublisher);
    let generator: Arc<dyn ContentGenerator> = Arc::new(NoopGenerator);

    let schedulers = build_schedulers(&config, &state, &publisher).await?;

    tracing::info!(
        channels = schedulers.len(),
        root = %config.channels_root.display(),
        "Starting coordinator"
    );

    let coordinator = Coordinator::new(config.policy.clone(), state, schedulers, generator);
    let _handles = coordinator.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");

    Ok(())
}

async fn flush(channel_name: String, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let state = Arc::new(SchedulerState::new());
    let publisher: Arc<dyn MediaPublisher> = Arc::new(DryRunPublisher);

    let schedulers = build_schedulers(&config, &state, &publisher).await?;
    let scheduler = schedulers
        .iter()
        .find(|s| s.channel().name == channel_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown channel '{channel_name}'"))?;

    let flushed = scheduler.flush_all().await?;
    tracing::info!(
        channel = %channel_name,
        flushed = flushed,
        "Flush complete"
    );

    Ok(())
}
