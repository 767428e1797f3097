use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use beacon_cast::channels::SlackChannel;
use beacon_cast::devices::{CastDiscovery, Discovery};
use beacon_cast::dispatch::{DispatchError, dispatch};
use beacon_cast::{Config, Daemon, Relay};

/// beacon-cast - make Cast speakers say what is posted in Slack
#[derive(Parser)]
#[command(name = "beacon-cast", version, about)]
struct Cli {
    /// Speech language code (e.g. "ja", "en-US")
    #[arg(short, long, env = "BEACON_CAST_LANG")]
    lang: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Slack relay (default)
    Run,
    /// Discover Cast devices once and list them
    Discover,
    /// Speak text on every discovered device
    Say {
        /// Text to speak
        text: String,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` in the working directory feeds both clap and the config layer
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,beacon_cast=info",
        1 => "info,beacon_cast=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    if let Ok(path) = &dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Some(Command::Setup)) {
        return beacon_cast::setup::run_setup();
    }

    let mut config = Config::load(cli.lang.as_deref());
    let discovery = CastDiscovery::new(config.discovery_window, config.cast.clone())?;

    match cli.command {
        Some(Command::Discover) => cmd_discover(&discovery).await,
        Some(Command::Say { text }) => cmd_say(&discovery, &text, &config.language).await,
        Some(Command::Run | Command::Setup) | None => {
            let token = config.take_slack_token()?;

            tracing::info!(
                language = %config.language,
                discovery_ms = u64::try_from(config.discovery_window.as_millis()).unwrap_or(u64::MAX),
                "starting beacon-cast"
            );

            let (channel, events) = SlackChannel::with_receiver(token, config.slack);
            let relay = Relay::new(Arc::new(discovery), config.markers, config.language);
            Daemon::new(Box::new(channel), events, relay).run().await?;
            Ok(())
        }
    }
}

async fn cmd_discover(discovery: &CastDiscovery) -> anyhow::Result<()> {
    let fleet = discovery.discover().await?;

    if fleet.is_empty() {
        println!("No Cast devices found");
        return Ok(());
    }

    println!("Found {} device(s):", fleet.len());
    for device in fleet.iter() {
        println!("  {:<32} {}", device.name(), device.address());
    }
    Ok(())
}

async fn cmd_say(discovery: &CastDiscovery, text: &str, language: &str) -> anyhow::Result<()> {
    let fleet = discovery.discover().await?;
    if fleet.is_empty() {
        anyhow::bail!("no Cast devices found");
    }

    match dispatch(text, &fleet, language).await {
        Ok(report) => {
            for outcome in &report.outcomes {
                println!("  ok      {}@{}", outcome.device, outcome.address);
            }
            println!("Spoken on {} device(s)", report.attempted());
            Ok(())
        }
        Err(DispatchError::Failed { outcomes }) => {
            for outcome in &outcomes {
                match &outcome.error {
                    None => println!("  ok      {}@{}", outcome.device, outcome.address),
                    Some(e) => println!("  failed  {}@{}: {e}", outcome.device, outcome.address),
                }
            }
            Err(DispatchError::Failed { outcomes }.into())
        }
    }
}
